//! Interactive console support
//!
//! - Completeness checking so entries may span several lines
//! - Rustyline helper with completion of builtins and history hints
//! - History file configuration

pub mod completeness;
pub mod config;
pub mod helper;

pub use completeness::{check_completeness, CompletenessStatus};
pub use config::ReplConfig;
pub use helper::ScriptHelper;
