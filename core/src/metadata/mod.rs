//! Archive descriptor: schema, generation, validation and rendering.

mod render;
mod schema;
mod validation;

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

pub use render::format_bytes;
pub use render::render;
pub use render::render_lines;
pub use schema::ArchiveOperation;
pub use schema::Contents;
pub use schema::FileInventory;
pub use schema::METADATA_FILENAME;
pub use schema::Metadata;
pub use schema::Restoration;
pub use schema::SCHEMA_VERSION;
pub use schema::SourceInfo;
pub use schema::TOOL_ID;
pub use schema::UNKNOWN;
pub use validation::Validation;
pub use validation::Violation;
pub use validation::ViolationKind;
pub use validation::validate;
pub use validation::validate_document;

use crate::category;
use crate::category::Category;
use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;
use crate::provenance::Clock;
use crate::provenance::VcsProvider;
use crate::provenance::collect_source;

/// Inputs for [`generate`].
pub struct GenerateOptions<'a> {
    pub workspace_root: &'a Path,
    /// Paths for the custom policy.
    pub custom_paths: &'a [PathBuf],
    /// Pre-resolved categories. Required for `pre-restore`; resolved from the
    /// operation's policy otherwise.
    pub categories: Option<&'a [Category]>,
    pub clock: &'a dyn Clock,
    pub vcs: &'a dyn VcsProvider,
}

/// Build a descriptor for a new archive.
///
/// Provenance is best effort and never fails generation. File counts and the
/// total size start at zero; the archive engine fills them in.
pub fn generate(operation: ArchiveOperation, options: &GenerateOptions<'_>) -> Result<Metadata> {
    let resolved;
    let categories = match (options.categories, operation.policy()) {
        (Some(categories), _) => categories,
        (None, Some(policy)) => {
            resolved = category::resolve(policy, options.custom_paths)?;
            resolved.as_slice()
        }
        (None, None) => {
            return Err(ResetError::invalid_input(
                Operation::GenerateMetadata,
                format!("'{operation}' archives need an explicit category list"),
            ));
        }
    };

    let directories: Vec<String> = categories.iter().map(|c| c.name().to_string()).collect();
    let counts: BTreeMap<String, u64> = directories.iter().map(|d| (d.clone(), 0)).collect();

    Ok(Metadata {
        version: SCHEMA_VERSION.to_string(),
        created: options.clock.now(),
        operation,
        source: collect_source(options.workspace_root, options.vcs),
        contents: Contents {
            directories,
            files: FileInventory {
                categories: counts,
                total: 0,
            },
            total_size: 0,
        },
        restoration: Restoration::default(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provenance::MockClock;
    use crate::provenance::NoVcs;
    use pretty_assertions::assert_eq;

    struct FixedVcs;

    impl VcsProvider for FixedVcs {
        fn revision(&self, _root: &Path) -> Option<String> {
            Some("0123abcd".to_string())
        }

        fn branch(&self, _root: &Path) -> Option<String> {
            Some("main".to_string())
        }
    }

    fn options<'a>(clock: &'a MockClock, vcs: &'a dyn VcsProvider) -> GenerateOptions<'a> {
        GenerateOptions {
            workspace_root: Path::new("/work/project"),
            custom_paths: &[],
            categories: None,
            clock,
            vcs,
        }
    }

    #[test]
    fn generated_metadata_validates_and_round_trips() {
        let clock = MockClock::fixed();
        for operation in [
            ArchiveOperation::Light,
            ArchiveOperation::Medium,
            ArchiveOperation::Full,
        ] {
            let metadata = generate(operation, &options(&clock, &FixedVcs)).unwrap();
            assert_eq!(validate(&metadata), Validation::Valid);

            let json = serde_json::to_string_pretty(&metadata).unwrap();
            let parsed: Metadata = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, metadata);
        }
    }

    #[test]
    fn counts_start_at_zero_for_every_category() {
        let clock = MockClock::fixed();
        let metadata = generate(ArchiveOperation::Full, &options(&clock, &FixedVcs)).unwrap();
        assert_eq!(
            metadata.contents.directories,
            vec!["docs/plans", "docs/reports", "memory", "docs/architecture"]
        );
        assert!(metadata.contents.files.categories.values().all(|c| *c == 0));
        assert_eq!(metadata.contents.files.total, 0);
        assert_eq!(metadata.contents.total_size, 0);
        assert_eq!(metadata.created, clock.now());
        assert_eq!(metadata.source.vcs_revision, "0123abcd");
        assert_eq!(metadata.source.vcs_branch, "main");
    }

    #[test]
    fn missing_vcs_degrades_to_unknown() {
        let clock = MockClock::fixed();
        let metadata = generate(ArchiveOperation::Light, &options(&clock, &NoVcs)).unwrap();
        assert_eq!(metadata.source.path, "/work/project");
        assert_eq!(metadata.source.vcs_revision, UNKNOWN);
        assert_eq!(metadata.source.vcs_branch, UNKNOWN);
    }

    #[test]
    fn custom_operation_uses_custom_paths() {
        let clock = MockClock::fixed();
        let paths = [PathBuf::from("scratch")];
        let mut opts = options(&clock, &NoVcs);
        opts.custom_paths = &paths;
        let metadata = generate(ArchiveOperation::Custom, &opts).unwrap();
        assert_eq!(metadata.contents.directories, vec!["scratch"]);
    }

    #[test]
    fn pre_restore_requires_categories() {
        let clock = MockClock::fixed();
        let err = generate(ArchiveOperation::PreRestore, &options(&clock, &NoVcs)).unwrap_err();
        assert_eq!(err.operation(), Operation::GenerateMetadata);

        let categories = [Category::archive_only("memory").unwrap()];
        let mut opts = options(&clock, &NoVcs);
        opts.categories = Some(&categories);
        let metadata = generate(ArchiveOperation::PreRestore, &opts).unwrap();
        assert_eq!(metadata.operation, ArchiveOperation::PreRestore);
        assert_eq!(metadata.contents.directories, vec!["memory"]);
    }
}
