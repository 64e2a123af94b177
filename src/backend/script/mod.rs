//! Module script language.
//!
//! The language module bodies are written in: S-expressions with a handful
//! of special forms, shared mutable dicts and host-provided natives. The
//! module loader only relies on [`execute_module`] and on [`Scope`] to build
//! each module's isolated execution scope.

pub mod builtins;
mod error;
mod eval;
mod scope;
mod value;

pub use builtins::{install_builtins, BUILTIN_NAMES};
pub use error::{RuntimeError, ScriptError};
pub use eval::{compile, evaluate, execute_module, Evaluator, MAX_EVAL_DEPTH, SPECIAL_FORMS};
pub use scope::Scope;
pub use value::{Closure, Dict, Function, Native, NativeFn, Value};
