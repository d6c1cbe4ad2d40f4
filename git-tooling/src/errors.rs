use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors returned while querying a git repository.
#[derive(Debug, Error)]
pub enum GitToolingError {
    #[error("failed to spawn git {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("git {command} exited with {status}: {stderr}")]
    GitCommand {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("git {command} produced non UTF-8 output")]
    NonUtf8Output { command: String },

    #[error("git {command} produced no output")]
    EmptyOutput { command: String },

    #[error("{} is not a directory", .path.display())]
    NotADirectory { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, GitToolingError>;
