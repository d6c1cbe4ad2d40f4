//! Archive listing, retention eviction and bulk clearing.

use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::ResetOrchestrator;
use crate::archive;
use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;
use crate::metadata::Metadata;

/// One entry of the archives directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveListing {
    pub id: String,
    pub path: PathBuf,
    pub valid: bool,
    /// Why the archive is invalid; empty when valid.
    pub problems: Vec<String>,
    /// Present whenever the descriptor could be parsed.
    pub metadata: Option<Metadata>,
}

impl ArchiveListing {
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref().map(|metadata| metadata.created)
    }
}

/// Valid archives newest first, then invalid ones by name.
fn listing_order(a: &ArchiveListing, b: &ArchiveListing) -> Ordering {
    match (a.valid, b.valid) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (true, true) => b
            .created()
            .cmp(&a.created())
            .then_with(|| b.id.cmp(&a.id)),
        (false, false) => a.id.cmp(&b.id),
    }
}

impl ResetOrchestrator {
    /// Every archive directory, including invalid ones.
    pub fn list_archives(&self) -> Result<Vec<ArchiveListing>> {
        const OP: Operation = Operation::ListArchives;
        let archives = self.archives_path();
        let entries = match std::fs::read_dir(&archives) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(ResetError::io(OP, &archives)(err)),
        };

        let mut listings = Vec::new();
        for entry in entries {
            let entry = entry.map_err(ResetError::io(OP, &archives))?;
            let file_type = entry.file_type().map_err(ResetError::io(OP, entry.path()))?;
            let id = entry.file_name().to_string_lossy().into_owned();
            if !file_type.is_dir() || id.starts_with('.') {
                continue;
            }

            let path = entry.path();
            let report = archive::inspect(&path);
            let valid = report.is_valid();
            if !valid {
                tracing::warn!(archive = %id, problems = ?report.problems, "invalid archive");
            }
            listings.push(ArchiveListing {
                id,
                path,
                valid,
                problems: report.problems,
                metadata: report.metadata,
            });
        }

        listings.sort_by(listing_order);
        Ok(listings)
    }

    /// Delete archives beyond the newest `limit`. Invalid archives go first,
    /// then the oldest valid ones. Returns the removed ids in removal order.
    pub fn evict_archives(&self, limit: usize) -> Result<Vec<String>> {
        const OP: Operation = Operation::EvictArchives;
        if limit == 0 {
            return Err(ResetError::invalid_input(
                OP,
                "retention limit must be at least 1",
            ));
        }

        let listings = self.list_archives()?;
        let mut evicted = Vec::new();
        for listing in listings.iter().skip(limit).rev() {
            std::fs::remove_dir_all(&listing.path).map_err(ResetError::io(OP, &listing.path))?;
            tracing::info!(archive = %listing.id, valid = listing.valid, "evicted archive");
            evicted.push(listing.id.clone());
        }
        Ok(evicted)
    }

    /// Remove every archive. Returns the removed ids, sorted.
    pub fn clear_archives(&self) -> Result<Vec<String>> {
        const OP: Operation = Operation::ClearArchives;
        let mut removed = Vec::new();
        for listing in self.list_archives()? {
            std::fs::remove_dir_all(&listing.path).map_err(ResetError::io(OP, &listing.path))?;
            removed.push(listing.id);
        }
        removed.sort();
        tracing::info!(count = removed.len(), "cleared archives");
        Ok(removed)
    }
}
