//! Archive descriptor types.
//!
//! The descriptor is written as `archive-metadata.json` at the root of every
//! archive. Keys are camelCase on disk.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::category::ResetPolicy;
use crate::error::Operation;
use crate::error::ResetError;

/// Schema version written into new descriptors.
pub const SCHEMA_VERSION: &str = "1.0";

/// Descriptor file name at the archive root.
pub const METADATA_FILENAME: &str = "archive-metadata.json";

/// Value used when a provenance field cannot be determined.
pub const UNKNOWN: &str = "unknown";

/// Tool identifier recorded in `restoration.compatible`.
pub const TOOL_ID: &str = "wskit";

/// The archive descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Schema version (e.g. "1.0").
    pub version: String,
    /// Creation instant.
    pub created: DateTime<Utc>,
    /// Which reset (or safety snapshot) produced the archive.
    pub operation: ArchiveOperation,
    pub source: SourceInfo,
    pub contents: Contents,
    pub restoration: Restoration,
}

/// Where the archive came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Workspace root at archive time.
    pub path: String,
    pub vcs_revision: String,
    pub vcs_branch: String,
    pub user: String,
    /// `<os>-<arch>`, e.g. `linux-x86_64`.
    pub platform: String,
}

impl SourceInfo {
    /// Provenance with only the workspace path known.
    pub fn unknown(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            vcs_revision: UNKNOWN.to_string(),
            vcs_branch: UNKNOWN.to_string(),
            user: UNKNOWN.to_string(),
            platform: UNKNOWN.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contents {
    /// Archived category roots, workspace-relative with `/` separators.
    pub directories: Vec<String>,
    pub files: FileInventory,
    /// Sum of archived file sizes in bytes.
    pub total_size: u64,
}

/// Per-category file counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInventory {
    pub categories: BTreeMap<String, u64>,
    pub total: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restoration {
    /// Tools able to restore this archive.
    pub compatible: Vec<String>,
    /// Preconditions a restore must meet.
    pub requirements: Vec<String>,
}

impl Default for Restoration {
    fn default() -> Self {
        Self {
            compatible: vec![TOOL_ID.to_string()],
            requirements: vec![
                format!("metadata schema {SCHEMA_VERSION}"),
                "target workspace is writable".to_string(),
                "a pre-restore safety archive is taken before live files are overwritten"
                    .to_string(),
            ],
        }
    }
}

/// Operation recorded in `operation`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArchiveOperation {
    Light,
    Medium,
    Full,
    Custom,
    /// Safety snapshot taken before a restore overwrites live files.
    PreRestore,
}

impl ArchiveOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveOperation::Light => "light",
            ArchiveOperation::Medium => "medium",
            ArchiveOperation::Full => "full",
            ArchiveOperation::Custom => "custom",
            ArchiveOperation::PreRestore => "pre-restore",
        }
    }

    /// The reset policy this operation resolves categories from, if any.
    pub fn policy(&self) -> Option<ResetPolicy> {
        match self {
            ArchiveOperation::Light => Some(ResetPolicy::Light),
            ArchiveOperation::Medium => Some(ResetPolicy::Medium),
            ArchiveOperation::Full => Some(ResetPolicy::Full),
            ArchiveOperation::Custom => Some(ResetPolicy::Custom),
            ArchiveOperation::PreRestore => None,
        }
    }

    pub fn all() -> [Self; 5] {
        [
            ArchiveOperation::Light,
            ArchiveOperation::Medium,
            ArchiveOperation::Full,
            ArchiveOperation::Custom,
            ArchiveOperation::PreRestore,
        ]
    }
}

impl From<ResetPolicy> for ArchiveOperation {
    fn from(policy: ResetPolicy) -> Self {
        match policy {
            ResetPolicy::Light => ArchiveOperation::Light,
            ResetPolicy::Medium => ArchiveOperation::Medium,
            ResetPolicy::Full => ArchiveOperation::Full,
            ResetPolicy::Custom => ArchiveOperation::Custom,
        }
    }
}

impl fmt::Display for ArchiveOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveOperation {
    type Err = ResetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ArchiveOperation::all()
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                ResetError::invalid_input(
                    Operation::ReadMetadata,
                    format!("unknown archive operation '{s}'"),
                )
            })
    }
}
