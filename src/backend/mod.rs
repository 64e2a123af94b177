// Backend of the module engine
//
// - `script`: the language module bodies are written in
// - `modules`: identifier normalization, repositories, caching and loading

pub mod modules;
pub mod script;

pub use modules::{
    normalize_module_id, LoaderConfig, Locator, ModuleError, ModuleErrorKind, ModuleId,
    ModuleLoader, RepositorySource, Resource,
};
pub use script::{RuntimeError, Scope, ScriptError, Value};
