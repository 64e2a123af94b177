//! Module System Infrastructure
//!
//! Resolution and loading of script modules:
//! - `ModuleId` - Normalized module identifier
//! - `Locator` - Directory or archive repository lookup
//! - `ResolutionChain` - Ordered repositories, first hit wins
//! - `ModuleCache` - Exports of already executed modules
//! - `ModuleLoader` - Resolve, read, execute and cache in one call
//! - `LoaderConfig` - `config.toml` settings for the loader

mod cache;
mod chain;
mod config;
mod error;
mod loader;
mod locator;
mod path;

pub use cache::ModuleCache;
pub use chain::ResolutionChain;
pub use config::{LoaderConfig, CONFIG_ENV_VAR};
pub use error::{LoadResult, ModuleError, ModuleErrorKind};
pub use loader::ModuleLoader;
pub use locator::{probe_with_extension, Locator, RepositorySource, Resource, DEFAULT_EXTENSION};
pub use path::{normalize_module_id, ModuleId};
