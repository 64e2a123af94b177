/// scriptmods - Module Resolution and Loading Engine
///
/// This library turns textual module identifiers into executed, cached
/// module exports. Modules are small S-expression scripts stored in plain
/// directories or inside zip/jar archives; each module body runs once, in
/// its own scope, and may load further modules with `require`.
///
/// # Architecture
///
/// 1. **S-expression Parsing** (`sexpr` module)
///    - Tokenizes module text, tracking line and column
///    - Parses tokens into S-expressions
///    - Handles `;` comments and `'` quoting
///
/// 2. **Backend** (`backend` module)
///    - `script`: values, scopes, special forms and builtins of module bodies
///    - `modules`: identifier normalization, locators, the resolution chain,
///      the module cache and the loader itself
///
/// 3. **Console** (`repl` module)
///    - Line editor helper that keeps reading while parens are unbalanced
///
/// # Example
///
/// ```rust,no_run
/// use scriptmods::backend::{ModuleLoader, RepositorySource};
///
/// let loader = ModuleLoader::with_root("modules");
/// loader
///     .add_repository(RepositorySource::descriptor("jar:file:/opt/geo.jar!/lib"))
///     .unwrap();
///
/// let util = loader.load("text/util").unwrap();
/// println!("{}", util);
/// ```
///
/// # Module Bodies
///
/// - **Exports**: `(put exports "name" value)` fills the exports dict in place
/// - **Replacing exports**: `(put module "exports" value)`
/// - **Dependencies**: `(require "other/module")` returns that module's exports
/// - **Probing**: `(resolve "other/module")` returns its URI or `Nil`
pub mod backend;
pub mod repl;
pub mod sexpr;

pub use backend::{
    normalize_module_id, LoaderConfig, Locator, ModuleError, ModuleErrorKind, ModuleId,
    ModuleLoader, RepositorySource, Resource, RuntimeError, Scope, ScriptError, Value,
};
pub use sexpr::{parse_source, Lexer, Parser, SExpr, SyntaxError, Token};
