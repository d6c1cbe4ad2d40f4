//! Archive engine: copy category trees into an archive directory, copy them
//! back, and check an archive's structure.
//!
//! An archive is a directory holding one sub-tree per category (mirroring the
//! workspace-relative paths) plus `archive-metadata.json`. The descriptor is
//! written last and acts as the commit marker: a directory without one is
//! never a valid archive.

mod fs;
mod progress;

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

pub use progress::NoProgress;
pub use progress::Phase;
pub use progress::ProgressEvent;
pub use progress::ProgressObserver;
use progress::Reporter;

pub(crate) use fs::category_files;
pub(crate) use fs::prune_empty_dirs;
pub(crate) use fs::symlinked_component;
pub(crate) use fs::write_atomic;

use crate::category::Category;
use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;
use crate::metadata;
use crate::metadata::METADATA_FILENAME;
use crate::metadata::Metadata;

/// Result of checking an archive directory.
#[derive(Debug, Clone, Default)]
pub struct ArchiveReport {
    /// Parsed descriptor, when it could be read and typed.
    pub metadata: Option<Metadata>,
    /// Every reason the archive is invalid; empty when valid.
    pub problems: Vec<String>,
}

impl ArchiveReport {
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty() && self.metadata.is_some()
    }
}

/// Totals from an extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: u64,
    pub bytes: u64,
}

/// Copy every file the categories select from `source_root` into the empty
/// (or missing) `archive_root`, then write the finalized descriptor.
///
/// Counts, sizes and `contents.directories` of `metadata` are replaced with
/// what was actually copied. On failure the partial directory is left in
/// place without a descriptor.
pub fn create(
    source_root: &Path,
    archive_root: &Path,
    mut metadata: Metadata,
    categories: &[Category],
    progress: &mut dyn ProgressObserver,
) -> Result<Metadata> {
    const OP: Operation = Operation::CreateArchive;

    if !fs::is_empty_dir(archive_root).map_err(ResetError::io(OP, archive_root))? {
        return Err(ResetError::invalid_input(
            OP,
            format!("archive directory {} is not empty", archive_root.display()),
        ));
    }
    std::fs::create_dir_all(archive_root).map_err(ResetError::io(OP, archive_root))?;

    let mut reporter = Reporter::new(progress);

    let mut planned = Vec::with_capacity(categories.len());
    for category in categories {
        planned.push((category, fs::category_files(source_root, category, OP)?));
    }
    let total = planned.iter().map(|(_, files)| files.len() as u64).sum();
    reporter.counted(total);
    tracing::debug!(total, archive = %archive_root.display(), "counted files to archive");

    let mut counts = BTreeMap::new();
    let mut total_size = 0;
    for (category, files) in &planned {
        reporter.category(category.name());
        for relative in files {
            let bytes =
                fs::copy_file(&source_root.join(relative), &archive_root.join(relative), OP)?;
            total_size += bytes;
            tracing::debug!(file = %relative.display(), bytes, "archived file");
            reporter.file_done(category.name());
        }
        counts.insert(category.name().to_string(), files.len() as u64);
    }

    metadata.contents.directories = categories.iter().map(|c| c.name().to_string()).collect();
    metadata.contents.files.categories = counts;
    metadata.contents.files.total = total;
    metadata.contents.total_size = total_size;
    metadata::validate(&metadata).into_result(OP)?;

    reporter.metadata();
    let json = serde_json::to_vec_pretty(&metadata)
        .map_err(|err| ResetError::io(OP, archive_root)(err.into()))?;
    fs::write_atomic(&archive_root.join(METADATA_FILENAME), &json, OP)?;
    reporter.complete();

    tracing::info!(
        archive = %archive_root.display(),
        operation = %metadata.operation,
        files = total,
        bytes = total_size,
        "archive created"
    );
    Ok(metadata)
}

/// Whether the directory is a complete, consistent archive.
pub fn validate(archive_root: &Path) -> bool {
    inspect(archive_root).is_valid()
}

/// Check an archive and collect every reason it is invalid.
pub fn inspect(archive_root: &Path) -> ArchiveReport {
    let mut report = ArchiveReport::default();
    if !archive_root.is_dir() {
        report
            .problems
            .push(format!("{} is not a directory", archive_root.display()));
        return report;
    }

    let path = archive_root.join(METADATA_FILENAME);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            report.problems.push(format!("{METADATA_FILENAME} is missing"));
            return report;
        }
        Err(err) => {
            report
                .problems
                .push(format!("{METADATA_FILENAME} is unreadable: {err}"));
            return report;
        }
    };
    let document: serde_json::Value = match serde_json::from_str(&text) {
        Ok(document) => document,
        Err(err) => {
            report
                .problems
                .push(format!("{METADATA_FILENAME} is not valid JSON: {err}"));
            return report;
        }
    };

    let validation = metadata::validate_document(&document);
    if !validation.is_valid() {
        report
            .problems
            .extend(validation.violations().iter().map(ToString::to_string));
        return report;
    }

    let metadata: Metadata = match serde_json::from_value(document) {
        Ok(metadata) => metadata,
        Err(err) => {
            report
                .problems
                .push(format!("{METADATA_FILENAME} does not match the schema: {err}"));
            return report;
        }
    };

    report.problems.extend(check_contents(archive_root, &metadata));
    report.metadata = Some(metadata);
    report
}

/// Compare the descriptor's claims with what is on disk.
fn check_contents(archive_root: &Path, metadata: &Metadata) -> Vec<String> {
    let mut problems = Vec::new();
    let mut size_on_disk = 0;

    for directory in &metadata.contents.directories {
        let claimed = metadata
            .contents
            .files
            .categories
            .get(directory)
            .copied()
            .unwrap_or(0);
        let files = match fs::tree_files(archive_root, Path::new(directory), Operation::ReadMetadata)
        {
            Ok(files) => files,
            Err(err) => {
                problems.push(format!("category '{directory}' cannot be read: {err}"));
                continue;
            }
        };
        if claimed > 0 && files.is_empty() {
            problems.push(format!(
                "category '{directory}' claims {claimed} file(s) but its directory is absent or empty"
            ));
        } else if files.len() as u64 != claimed {
            problems.push(format!(
                "category '{directory}' claims {claimed} file(s) but holds {}",
                files.len()
            ));
        }
        for file in &files {
            match std::fs::metadata(archive_root.join(file)) {
                Ok(meta) => size_on_disk += meta.len(),
                Err(err) => problems.push(format!("{} is unreadable: {err}", file.display())),
            }
        }
    }

    if problems.is_empty() && size_on_disk != metadata.contents.total_size {
        problems.push(format!(
            "totalSize is {} but the archived files hold {size_on_disk} bytes",
            metadata.contents.total_size
        ));
    }
    problems
}

/// Parse the descriptor of an archive.
pub fn read_metadata(archive_root: &Path) -> Result<Metadata> {
    const OP: Operation = Operation::ReadMetadata;
    let name = archive_name(archive_root);
    let path = archive_root.join(METADATA_FILENAME);

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ResetError::InvalidArchive {
                name,
                reasons: vec![format!("{METADATA_FILENAME} is missing")],
            });
        }
        Err(err) => return Err(ResetError::io(OP, path)(err)),
    };
    let document: serde_json::Value =
        serde_json::from_str(&text).map_err(|err| ResetError::InvalidArchive {
            name: name.clone(),
            reasons: vec![format!("{METADATA_FILENAME} is not valid JSON: {err}")],
        })?;
    metadata::validate_document(&document).into_result(OP)?;
    serde_json::from_value(document).map_err(|err| ResetError::InvalidArchive {
        name,
        reasons: vec![format!("{METADATA_FILENAME} does not match the schema: {err}")],
    })
}

/// Copy an archive's category trees back under `target_root`, overwriting
/// existing files. The archive is checked first; nothing is written when it
/// is invalid or when a target path runs through a symbolic link.
pub fn extract(
    archive_root: &Path,
    target_root: &Path,
    progress: &mut dyn ProgressObserver,
) -> Result<ExtractSummary> {
    const OP: Operation = Operation::ExtractArchive;

    let report = inspect(archive_root);
    let metadata = match report.metadata {
        Some(metadata) if report.problems.is_empty() => metadata,
        _ => {
            return Err(ResetError::InvalidArchive {
                name: archive_name(archive_root),
                reasons: report.problems,
            });
        }
    };

    let mut reporter = Reporter::new(progress);

    let mut planned = Vec::with_capacity(metadata.contents.directories.len());
    for directory in &metadata.contents.directories {
        let files = fs::tree_files(archive_root, Path::new(directory), OP)?;
        planned.push((directory.as_str(), files));
    }
    for relative in planned.iter().flat_map(|(_, files)| files) {
        if let Some(link) = fs::symlinked_component(target_root, relative) {
            return Err(ResetError::invalid_input(
                OP,
                format!("refusing to write through symbolic link {}", link.display()),
            ));
        }
    }
    let total = planned.iter().map(|(_, files)| files.len() as u64).sum();
    reporter.counted(total);

    let mut summary = ExtractSummary::default();
    for (directory, files) in &planned {
        reporter.category(directory);
        for relative in files {
            let target: PathBuf = target_root.join(relative);
            summary.bytes += fs::copy_file(&archive_root.join(relative), &target, OP)?;
            summary.files += 1;
            tracing::debug!(file = %relative.display(), "restored file");
            reporter.file_done(directory);
        }
    }
    reporter.metadata();
    reporter.complete();

    tracing::info!(
        archive = %archive_root.display(),
        files = summary.files,
        bytes = summary.bytes,
        "archive extracted"
    );
    Ok(summary)
}

fn archive_name(archive_root: &Path) -> String {
    archive_root
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive_root.display().to_string())
}
