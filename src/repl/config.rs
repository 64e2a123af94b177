//! REPL configuration
//!
//! Manages settings for:
//! - History file location
//! - History size

use std::path::PathBuf;

const DEFAULT_MAX_HISTORY: usize = 1000;

/// REPL configuration
#[derive(Debug, Clone)]
pub struct ReplConfig {
    /// Where console history is persisted, if anywhere
    pub history_path: Option<PathBuf>,
    /// Maximum number of history entries kept
    pub max_history: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            history_path: None,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }
}

impl ReplConfig {
    /// Load configuration from default locations
    pub fn load() -> Self {
        Self {
            history_path: dirs::data_local_dir()
                .map(|dir| dir.join("scriptmods").join("history.txt")),
            ..Self::default()
        }
    }
}
