//! Read-only git queries.
//!
//! Every function shells out to the `git` binary found on `PATH` and runs it
//! with the given directory as its working directory. Nothing here mutates the
//! repository; callers that only want best-effort provenance are expected to
//! turn errors into a placeholder value.

mod errors;

use std::path::Path;
use std::process::Command;

pub use errors::GitToolingError;
pub use errors::Result;

/// Full hash of the commit `HEAD` points at.
pub fn head_revision(repo: &Path) -> Result<String> {
    run_git(repo, &["rev-parse", "HEAD"])
}

/// Name of the checked out branch.
///
/// A detached `HEAD` is reported as the literal `HEAD`, which is what git
/// itself prints for `rev-parse --abbrev-ref`.
pub fn current_branch(repo: &Path) -> Result<String> {
    run_git(repo, &["rev-parse", "--abbrev-ref", "HEAD"])
}

fn run_git(dir: &Path, args: &[&str]) -> Result<String> {
    let command = args.join(" ");
    if !dir.is_dir() {
        return Err(GitToolingError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|source| GitToolingError::Spawn {
            command: command.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(%command, dir = %dir.display(), %stderr, "git query failed");
        return Err(GitToolingError::GitCommand {
            command,
            status: output.status,
            stderr,
        });
    }

    let stdout = String::from_utf8(output.stdout)
        .map_err(|_| GitToolingError::NonUtf8Output {
            command: command.clone(),
        })?;
    let value = stdout.trim();
    if value.is_empty() {
        return Err(GitToolingError::EmptyOutput { command });
    }
    Ok(value.to_string())
}
