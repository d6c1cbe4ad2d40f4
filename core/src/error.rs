//! Error taxonomy for archive, reset and restore operations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::metadata::Violation;

pub type Result<T> = std::result::Result<T, ResetError>;

/// The public operation that was running when an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Resolve,
    GenerateMetadata,
    CreateArchive,
    ExtractArchive,
    ReadMetadata,
    Reset,
    Restore,
    ListArchives,
    EvictArchives,
    ClearArchives,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Resolve => "resolve",
            Operation::GenerateMetadata => "generate-metadata",
            Operation::CreateArchive => "create-archive",
            Operation::ExtractArchive => "extract-archive",
            Operation::ReadMetadata => "read-metadata",
            Operation::Reset => "reset",
            Operation::Restore => "restore",
            Operation::ListArchives => "list-archives",
            Operation::EvictArchives => "evict-archives",
            Operation::ClearArchives => "clear-archives",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ResetError {
    #[error("{operation}: invalid input: {reason}")]
    InvalidInput { operation: Operation, reason: String },

    #[error("archive '{name}' not found in {}", .archives_dir.display())]
    ArchiveNotFound { name: String, archives_dir: PathBuf },

    #[error("archive '{name}' is invalid: {}", .reasons.join("; "))]
    InvalidArchive { name: String, reasons: Vec<String> },

    #[error("{operation}: I/O failure on {}: {source}", .path.display())]
    Io {
        operation: Operation,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "{operation}: metadata failed validation ({} violation(s)): {}",
        .violations.len(),
        join_violations(.violations)
    )]
    MetadataValidation {
        operation: Operation,
        violations: Vec<Violation>,
    },
}

impl ResetError {
    pub(crate) fn invalid_input(operation: Operation, reason: impl Into<String>) -> Self {
        ResetError::InvalidInput {
            operation,
            reason: reason.into(),
        }
    }

    pub(crate) fn io(
        operation: Operation,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| ResetError::Io {
            operation,
            path,
            source,
        }
    }

    /// Operation tag for the failure.
    ///
    /// Archive lookups are only performed by restores, so the two archive
    /// variants report [`Operation::Restore`].
    pub fn operation(&self) -> Operation {
        match self {
            ResetError::InvalidInput { operation, .. }
            | ResetError::Io { operation, .. }
            | ResetError::MetadataValidation { operation, .. } => *operation,
            ResetError::ArchiveNotFound { .. } | ResetError::InvalidArchive { .. } => {
                Operation::Restore
            }
        }
    }

    /// Short hint telling the caller what to do next.
    pub fn remediation(&self) -> &'static str {
        match self {
            ResetError::InvalidInput { .. } => {
                "check the policy, archive name and paths; custom paths must be relative and stay inside the workspace"
            }
            ResetError::ArchiveNotFound { .. } => {
                "run `wskit list` to see the available archive names"
            }
            ResetError::InvalidArchive { .. } => {
                "the archive is incomplete or corrupted; pick another archive, live files were not modified"
            }
            ResetError::Io { source, .. } => match source.kind() {
                std::io::ErrorKind::PermissionDenied => {
                    "check file permissions on the workspace and archives directory"
                }
                std::io::ErrorKind::NotFound => "check that the workspace path exists",
                _ => "check free disk space and that no other process holds the files",
            },
            ResetError::MetadataValidation { .. } => {
                "the archive descriptor is malformed; this is a bug if it came from a fresh archive"
            }
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ViolationKind;

    #[test]
    fn io_error_carries_operation_and_path() {
        let err = ResetError::io(Operation::CreateArchive, "/tmp/x")(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        assert_eq!(err.operation(), Operation::CreateArchive);
        assert!(err.to_string().starts_with("create-archive: I/O failure on /tmp/x"));
        assert!(err.remediation().contains("permissions"));
    }

    #[test]
    fn metadata_validation_lists_every_violation() {
        let err = ResetError::MetadataValidation {
            operation: Operation::CreateArchive,
            violations: vec![
                Violation::new("version", ViolationKind::Missing),
                Violation::new("created", ViolationKind::InvalidTimestamp("x".into())),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("2 violation(s)"));
        assert!(message.contains("version"));
        assert!(message.contains("created"));
    }

    #[test]
    fn archive_errors_are_tagged_as_restore() {
        let err = ResetError::ArchiveNotFound {
            name: "light-x".into(),
            archives_dir: PathBuf::from(".archives"),
        };
        assert_eq!(err.operation(), Operation::Restore);
        assert!(err.remediation().contains("wskit list"));
    }
}
