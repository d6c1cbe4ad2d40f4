//! Workspace archive and reset engine.
//!
//! Assistant workspaces accumulate mutable knowledge files (memory notes,
//! plans, reports). Resetting them is destructive, so every reset can first
//! snapshot the affected files into a self-describing archive under the
//! workspace's archives directory, and any archive can later be validated and
//! restored.
//!
//! The crate is layered leaves first:
//!
//! - [`category`] maps a [`ResetPolicy`] to the path groups it touches.
//! - [`metadata`] builds, validates and renders the archive descriptor.
//! - [`archive`] copies trees into and out of archives and checks structure.
//! - [`reset`] drives resets and restores on top of the other three.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod archive;
pub mod category;
pub mod config;
pub mod error;
pub mod metadata;
pub mod provenance;
pub mod reset;
pub mod templates;

pub use category::Category;
pub use category::DestructiveAction;
pub use category::ResetPolicy;
pub use error::Operation;
pub use error::ResetError;
pub use error::Result;
pub use metadata::ArchiveOperation;
pub use metadata::Metadata;
pub use reset::ResetOptions;
pub use reset::ResetOrchestrator;
pub use reset::RestoreOptions;

/// Crate version, recorded in archive metadata.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default archives directory, relative to the workspace root.
pub const DEFAULT_ARCHIVES_DIR: &str = ".archives";
