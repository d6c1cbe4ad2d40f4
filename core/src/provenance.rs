//! Time source and version-control provenance.
//!
//! Both are injected so archive creation stays deterministic under test.

use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::metadata::SourceInfo;
use crate::metadata::UNKNOWN;

/// Clock abstraction for injectable time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (production use).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controlled timestamps.
///
/// Interior mutability lets a test advance a clock that is already shared
/// with an orchestrator.
#[derive(Debug)]
pub struct MockClock {
    current_time: Mutex<DateTime<Utc>>,
}

impl MockClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            current_time: Mutex::new(time),
        }
    }

    /// A mock clock at 2026-01-15 12:00:00 UTC.
    pub fn fixed() -> Self {
        let time = DateTime::from_timestamp(1_768_478_400, 0).unwrap_or(DateTime::UNIX_EPOCH);
        Self::new(time)
    }

    pub fn advance(&self, duration: Duration) {
        let mut time = self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *time += duration;
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = time;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self
            .current_time
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Source of revision and branch names for a workspace.
pub trait VcsProvider: Send + Sync {
    fn revision(&self, root: &Path) -> Option<String>;
    fn branch(&self, root: &Path) -> Option<String>;
}

/// Reads provenance from the `git` binary.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitVcs;

impl VcsProvider for GitVcs {
    fn revision(&self, root: &Path) -> Option<String> {
        match wskit_git_tooling::head_revision(root) {
            Ok(revision) => Some(revision),
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "vcs revision unavailable");
                None
            }
        }
    }

    fn branch(&self, root: &Path) -> Option<String> {
        match wskit_git_tooling::current_branch(root) {
            Ok(branch) => Some(branch),
            Err(err) => {
                tracing::warn!(root = %root.display(), error = %err, "vcs branch unavailable");
                None
            }
        }
    }
}

/// Provider for workspaces outside version control.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVcs;

impl VcsProvider for NoVcs {
    fn revision(&self, _root: &Path) -> Option<String> {
        None
    }

    fn branch(&self, _root: &Path) -> Option<String> {
        None
    }
}

/// Gather best-effort provenance. Only the workspace path is guaranteed.
pub fn collect_source(root: &Path, vcs: &dyn VcsProvider) -> SourceInfo {
    let or_unknown = |value: Option<String>| {
        value
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string())
    };
    SourceInfo {
        path: root.display().to_string(),
        vcs_revision: or_unknown(vcs.revision(root)),
        vcs_branch: or_unknown(vcs.branch(root)),
        user: or_unknown(current_user()),
        platform: platform(),
    }
}

fn current_user() -> Option<String> {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .or_else(|| {
            dirs::home_dir().and_then(|home| {
                home.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
        })
}

fn platform() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}
