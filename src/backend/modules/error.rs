//! Errors raised by module resolution and loading.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::backend::script::RuntimeError;

pub type LoadResult<T> = Result<T, ModuleError>;

/// Errors that can occur while resolving or loading a module.
#[derive(Debug)]
pub enum ModuleError {
    /// The identifier is empty after normalization or cannot be turned into text.
    InvalidIdentifier { raw: String },
    /// A repository reference of a kind no locator supports.
    UnsupportedLocatorKind { source: String },
    /// No locator in the chain resolved the identifier.
    NotFound { id: String },
    /// The resource was resolved but its text could not be read.
    Read {
        id: String,
        uri: String,
        source: io::Error,
    },
    /// The module text could not be parsed. Nothing was executed.
    Syntax {
        id: String,
        uri: String,
        line: Option<usize>,
        message: String,
    },
    /// The module body failed while executing.
    Execution {
        id: String,
        uri: String,
        source: RuntimeError,
    },
    /// The module was required again while its own body was still running.
    CircularRequire { id: String },
    /// A configuration file could not be read or parsed.
    Config { path: PathBuf, message: String },
}

/// Stable classification of a [`ModuleError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleErrorKind {
    InvalidIdentifier,
    UnsupportedLocatorKind,
    NotFound,
    Read,
    Syntax,
    Execution,
    CircularRequire,
    Config,
}

impl ModuleError {
    pub fn kind(&self) -> ModuleErrorKind {
        match self {
            ModuleError::InvalidIdentifier { .. } => ModuleErrorKind::InvalidIdentifier,
            ModuleError::UnsupportedLocatorKind { .. } => ModuleErrorKind::UnsupportedLocatorKind,
            ModuleError::NotFound { .. } => ModuleErrorKind::NotFound,
            ModuleError::Read { .. } => ModuleErrorKind::Read,
            ModuleError::Syntax { .. } => ModuleErrorKind::Syntax,
            ModuleError::Execution { .. } => ModuleErrorKind::Execution,
            ModuleError::CircularRequire { .. } => ModuleErrorKind::CircularRequire,
            ModuleError::Config { .. } => ModuleErrorKind::Config,
        }
    }

    /// The normalized identifier the error refers to, when there is one.
    pub fn module_id(&self) -> Option<&str> {
        match self {
            ModuleError::NotFound { id }
            | ModuleError::Read { id, .. }
            | ModuleError::Syntax { id, .. }
            | ModuleError::Execution { id, .. }
            | ModuleError::CircularRequire { id } => Some(id),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleError::InvalidIdentifier { raw } => {
                write!(f, "Invalid module id '{}'", raw)
            }
            ModuleError::UnsupportedLocatorKind { source } => {
                write!(f, "Unsupported repository '{}'", source)
            }
            ModuleError::NotFound { id } => write!(f, "Module '{}' not found", id),
            ModuleError::Read { id, uri, .. } => {
                write!(f, "Failed to read module '{}' from '{}'", id, uri)
            }
            ModuleError::Syntax {
                id,
                uri,
                line,
                message,
            } => match line {
                Some(line) => write!(
                    f,
                    "Syntax error in module '{}' ({}) at line {}: {}",
                    id, uri, line, message
                ),
                None => write!(f, "Syntax error in module '{}' ({}): {}", id, uri, message),
            },
            ModuleError::Execution { id, uri, .. } => {
                write!(f, "Failed to execute module '{}' from '{}'", id, uri)
            }
            ModuleError::CircularRequire { id } => {
                write!(f, "Circular require detected: {}", id)
            }
            ModuleError::Config { path, message } => {
                write!(f, "Invalid configuration '{}': {}", path.display(), message)
            }
        }
    }
}

impl std::error::Error for ModuleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModuleError::Read { source, .. } => Some(source),
            ModuleError::Execution { source, .. } => Some(source),
            _ => None,
        }
    }
}
