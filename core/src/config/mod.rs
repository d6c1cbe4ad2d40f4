//! Layered configuration:
//!
//! 1. Defaults (from code)
//! 2. Config file (`<workspace>/wskit.toml`, or an explicit path)
//! 3. Environment variables (`WSKIT_*`, `__` for nesting)
//!
//! ```no_run
//! use wskit_core::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .with_workspace("/path/to/workspace")
//!     .load()
//!     .expect("Failed to load config");
//! ```

pub mod error;
pub mod loader;

pub use error::ConfigError;
pub use error::Result;
pub use loader::AppConfig;
pub use loader::ArchiveConfig;
pub use loader::CONFIG_FILENAME;
pub use loader::ConfigLoader;
pub use loader::LoggingConfig;
pub use loader::TemplatesConfig;
