//! Failures raised while running module scripts.

use std::fmt;

use crate::backend::modules::ModuleError;
use crate::sexpr::SyntaxError;

/// A failure raised by a running module body.
///
/// When the failure comes from a nested `require`, the nested
/// [`ModuleError`] is kept as the error source.
#[derive(Debug)]
pub struct RuntimeError {
    message: String,
    line: Option<usize>,
    source: Option<Box<ModuleError>>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            source: None,
        }
    }

    /// Wrap a failed nested load.
    pub fn from_module_error(err: ModuleError) -> Self {
        Self {
            message: "require failed".to_string(),
            line: None,
            source: Some(Box::new(err)),
        }
    }

    /// Attach a line number unless one is already recorded.
    pub fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// The nested module failure, if this error came from `require`.
    pub fn module_error(&self) -> Option<&ModuleError> {
        self.source.as_deref()
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {})", self.message, line),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Outcome of a failed module body execution.
#[derive(Debug)]
pub enum ScriptError {
    /// The source could not be parsed; nothing was executed.
    Syntax(SyntaxError),
    /// The body raised a failure while running.
    Runtime(RuntimeError),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Syntax(e) => write!(f, "Syntax error: {}", e),
            ScriptError::Runtime(e) => write!(f, "Runtime error: {}", e),
        }
    }
}

impl std::error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScriptError::Syntax(e) => Some(e),
            ScriptError::Runtime(e) => Some(e),
        }
    }
}

impl From<SyntaxError> for ScriptError {
    fn from(e: SyntaxError) -> Self {
        ScriptError::Syntax(e)
    }
}

impl From<RuntimeError> for ScriptError {
    fn from(e: RuntimeError) -> Self {
        ScriptError::Runtime(e)
    }
}
