//! Reset and restore orchestration.
//!
//! A reset resolves the policy's categories, optionally snapshots them into a
//! new archive, then applies each category's destructive action and finally
//! enforces the retention limit. A restore validates the requested archive,
//! takes a `pre-restore` safety archive of the roots it is about to overwrite,
//! and only then extracts.
//!
//! Callers must not run two resets or restores against the same workspace at
//! once; nothing here locks.

mod retention;

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

pub use retention::ArchiveListing;

use crate::DEFAULT_ARCHIVES_DIR;
use crate::archive;
use crate::archive::ArchiveReport;
use crate::archive::NoProgress;
use crate::archive::ProgressObserver;
use crate::category;
use crate::category::Category;
use crate::category::DestructiveAction;
use crate::category::ResetPolicy;
use crate::category::display_relative;
use crate::config::AppConfig;
use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;
use crate::metadata;
use crate::metadata::ArchiveOperation;
use crate::metadata::GenerateOptions;
use crate::provenance::Clock;
use crate::provenance::GitVcs;
use crate::provenance::SystemClock;
use crate::provenance::VcsProvider;
use crate::templates::EmbeddedTemplates;
use crate::templates::PlaceholderContext;
use crate::templates::TemplateStore;
use crate::templates::substitute;

/// Options for [`ResetOrchestrator::perform_reset`].
#[derive(Debug, Clone, Default)]
pub struct ResetOptions {
    /// Must be set; the caller is responsible for asking the user.
    pub confirmed: bool,
    /// Apply the destructive step without taking an archive first.
    pub skip_archive: bool,
    /// Remove every existing archive before archiving.
    pub clear_archives: bool,
    /// Keep at most this many archives afterwards.
    pub retention_limit: Option<usize>,
    /// Paths for the custom policy.
    pub custom_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetOutcome {
    pub policy: ResetPolicy,
    /// Archive taken before the destructive step, if any.
    pub archive_id: Option<String>,
    /// Deleted files, workspace-relative.
    pub cleared: Vec<String>,
    /// Files rewritten from templates.
    pub reset: Vec<String>,
    /// Archives removed by the retention limit.
    pub evicted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub archive_id: String,
    pub safety_archive_id: String,
    pub restored_files: u64,
    pub restored_bytes: u64,
}

/// Side-effect-free preview of a reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPlan {
    pub policy: ResetPolicy,
    pub archive: bool,
    pub categories: Vec<PlannedCategory>,
    /// Existing archives that `clear_archives` would remove.
    pub archives_to_clear: Vec<String>,
    pub retention_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedCategory {
    pub root: String,
    /// `archive+clear`, `archive+template-reset` or `archive-only`.
    pub action: &'static str,
    pub archived: Vec<String>,
    pub cleared: Vec<String>,
    pub reset: Vec<String>,
}

/// Drives resets and restores for one workspace.
pub struct ResetOrchestrator {
    workspace_root: PathBuf,
    archives_dir: PathBuf,
    clock: Arc<dyn Clock>,
    vcs: Arc<dyn VcsProvider>,
    templates: Arc<dyn TemplateStore>,
}

impl ResetOrchestrator {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let templates = EmbeddedTemplates::new().with_override_dir(workspace_root.join("templates"));
        Self {
            workspace_root,
            archives_dir: PathBuf::from(DEFAULT_ARCHIVES_DIR),
            clock: Arc::new(SystemClock),
            vcs: Arc::new(GitVcs),
            templates: Arc::new(templates),
        }
    }

    /// Orchestrator using the archive and template directories from `config`.
    pub fn from_config(workspace_root: impl Into<PathBuf>, config: &AppConfig) -> Self {
        let workspace_root = workspace_root.into();
        let templates =
            EmbeddedTemplates::new().with_override_dir(workspace_root.join(&config.templates.dir));
        Self::new(workspace_root)
            .with_archives_dir(config.archive.dir.clone())
            .with_templates(templates)
    }

    /// Archives directory, relative to the workspace root.
    pub fn with_archives_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archives_dir = dir.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_vcs(mut self, vcs: Arc<dyn VcsProvider>) -> Self {
        self.vcs = vcs;
        self
    }

    pub fn with_templates(mut self, templates: impl TemplateStore + 'static) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn archives_path(&self) -> PathBuf {
        self.workspace_root.join(&self.archives_dir)
    }

    /// Path of a named archive. The name must be a single path component.
    pub fn archive_path(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) if part == name => {
                Ok(self.archives_path().join(name))
            }
            _ => Err(ResetError::invalid_input(
                Operation::Restore,
                format!("'{name}' is not a valid archive name"),
            )),
        }
    }

    /// Preview what a reset would archive, delete and rewrite.
    pub fn plan_reset(&self, policy: ResetPolicy, options: &ResetOptions) -> Result<ResetPlan> {
        let categories = self.resolve(policy, &options.custom_paths)?;

        let mut planned = Vec::with_capacity(categories.len());
        for category in &categories {
            let selected: Vec<String> =
                archive::category_files(&self.workspace_root, category, Operation::Reset)?
                    .iter()
                    .map(|path| display_relative(path))
                    .collect();
            let (cleared, reset) = match category.action() {
                DestructiveAction::Clear => (selected.clone(), Vec::new()),
                DestructiveAction::TemplateReset => (
                    Vec::new(),
                    self.templates
                        .targets(category)
                        .iter()
                        .map(|target| display_relative(&target.path))
                        .collect(),
                ),
                DestructiveAction::None => (Vec::new(), Vec::new()),
            };
            planned.push(PlannedCategory {
                root: category.name().to_string(),
                action: category.action().tag(),
                archived: if options.skip_archive {
                    Vec::new()
                } else {
                    selected
                },
                cleared,
                reset,
            });
        }

        let archives_to_clear = if options.clear_archives {
            self.list_archives()?
                .into_iter()
                .map(|listing| listing.id)
                .collect()
        } else {
            Vec::new()
        };

        Ok(ResetPlan {
            policy,
            archive: !options.skip_archive,
            categories: planned,
            archives_to_clear,
            retention_limit: options.retention_limit,
        })
    }

    pub fn perform_reset(&self, policy: ResetPolicy, options: &ResetOptions) -> Result<ResetOutcome> {
        self.perform_reset_with_progress(policy, options, &mut NoProgress)
    }

    pub fn perform_reset_with_progress(
        &self,
        policy: ResetPolicy,
        options: &ResetOptions,
        progress: &mut dyn ProgressObserver,
    ) -> Result<ResetOutcome> {
        if !options.confirmed {
            return Err(ResetError::invalid_input(
                Operation::Reset,
                format!("the {policy} reset was not confirmed"),
            ));
        }
        if options.retention_limit == Some(0) {
            return Err(ResetError::invalid_input(
                Operation::Reset,
                "retention limit must be at least 1",
            ));
        }

        let categories = self.resolve(policy, &options.custom_paths)?;
        tracing::info!(
            %policy,
            workspace = %self.workspace_root.display(),
            skip_archive = options.skip_archive,
            "reset started"
        );

        if options.clear_archives {
            self.clear_archives()?;
        }

        let archive_id = if options.skip_archive {
            None
        } else {
            Some(self.create_archive(ArchiveOperation::from(policy), &categories, progress)?)
        };

        let mut cleared = Vec::new();
        let mut reset = Vec::new();
        for category in &categories {
            match category.action() {
                DestructiveAction::Clear => cleared.extend(self.clear_category(category)?),
                DestructiveAction::TemplateReset => reset.extend(self.reset_category(category)?),
                DestructiveAction::None => {}
            }
        }

        let evicted = match options.retention_limit {
            Some(limit) => self.evict_archives(limit)?,
            None => Vec::new(),
        };

        tracing::info!(
            %policy,
            archive = archive_id.as_deref().unwrap_or("none"),
            cleared = cleared.len(),
            reset = reset.len(),
            evicted = evicted.len(),
            "reset complete"
        );
        Ok(ResetOutcome {
            policy,
            archive_id,
            cleared,
            reset,
            evicted,
        })
    }

    pub fn restore_from_archive(
        &self,
        name: &str,
        options: &RestoreOptions,
    ) -> Result<RestoreOutcome> {
        self.restore_from_archive_with_progress(name, options, &mut NoProgress)
    }

    /// Restore an archive over the live workspace.
    ///
    /// The observer sees the safety archive's creation first, then the
    /// extraction, each with its own counting-to-complete sequence.
    pub fn restore_from_archive_with_progress(
        &self,
        name: &str,
        options: &RestoreOptions,
        progress: &mut dyn ProgressObserver,
    ) -> Result<RestoreOutcome> {
        if !options.confirmed {
            return Err(ResetError::invalid_input(
                Operation::Restore,
                format!("restore of '{name}' was not confirmed"),
            ));
        }

        let path = self.archive_path(name)?;
        if !path.is_dir() {
            return Err(ResetError::ArchiveNotFound {
                name: name.to_string(),
                archives_dir: self.archives_path(),
            });
        }

        let metadata = match archive::inspect(&path) {
            ArchiveReport {
                metadata: Some(metadata),
                problems,
            } if problems.is_empty() => metadata,
            ArchiveReport { problems, .. } => {
                tracing::warn!(archive = name, ?problems, "refusing to restore invalid archive");
                return Err(ResetError::InvalidArchive {
                    name: name.to_string(),
                    reasons: problems,
                });
            }
        };

        let categories = metadata
            .contents
            .directories
            .iter()
            .map(Category::archive_only)
            .collect::<Result<Vec<_>>>()?;
        self.ensure_disjoint_from_archives(&categories)?;
        self.ensure_no_symlinked_roots(&categories)?;

        tracing::info!(archive = name, "restore started");
        let safety_archive_id =
            self.create_archive(ArchiveOperation::PreRestore, &categories, progress)?;
        let summary = archive::extract(&path, &self.workspace_root, progress)?;

        tracing::info!(
            archive = name,
            safety_archive = %safety_archive_id,
            files = summary.files,
            "restore complete"
        );
        Ok(RestoreOutcome {
            archive_id: name.to_string(),
            safety_archive_id,
            restored_files: summary.files,
            restored_bytes: summary.bytes,
        })
    }

    /// Check a named archive without touching anything.
    pub fn inspect_archive(&self, name: &str) -> Result<ArchiveReport> {
        let path = self.archive_path(name)?;
        if !path.is_dir() {
            return Err(ResetError::ArchiveNotFound {
                name: name.to_string(),
                archives_dir: self.archives_path(),
            });
        }
        Ok(archive::inspect(&path))
    }

    fn resolve(&self, policy: ResetPolicy, custom_paths: &[PathBuf]) -> Result<Vec<Category>> {
        let categories = category::resolve(policy, custom_paths)?;
        self.ensure_disjoint_from_archives(&categories)?;
        self.ensure_no_symlinked_roots(&categories)?;
        Ok(categories)
    }

    /// Reject categories whose root, or any directory above it, is a
    /// symbolic link. Clearing such a category would delete files outside
    /// the workspace.
    fn ensure_no_symlinked_roots(&self, categories: &[Category]) -> Result<()> {
        for category in categories {
            if let Some(link) = archive::symlinked_component(&self.workspace_root, category.root())
            {
                return Err(ResetError::invalid_input(
                    Operation::Resolve,
                    format!(
                        "'{}' runs through the symbolic link {}",
                        category.name(),
                        link.display()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Reject categories that are, contain, or sit inside the archives
    /// directory.
    fn ensure_disjoint_from_archives(&self, categories: &[Category]) -> Result<()> {
        let Some(archives) = self.archives_relative() else {
            return Ok(());
        };
        for category in categories {
            if category.root().starts_with(&archives) || archives.starts_with(category.root()) {
                return Err(ResetError::invalid_input(
                    Operation::Resolve,
                    format!(
                        "'{}' overlaps the archives directory '{}'",
                        category.name(),
                        display_relative(&archives)
                    ),
                ));
            }
        }
        Ok(())
    }

    fn archives_relative(&self) -> Option<PathBuf> {
        let relative = if self.archives_dir.is_absolute() {
            self.archives_dir
                .strip_prefix(&self.workspace_root)
                .ok()?
                .to_path_buf()
        } else {
            self.archives_dir.clone()
        };
        let normalized: PathBuf = relative
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect();
        Some(normalized)
    }

    fn create_archive(
        &self,
        operation: ArchiveOperation,
        categories: &[Category],
        progress: &mut dyn ProgressObserver,
    ) -> Result<String> {
        let archives = self.archives_path();
        std::fs::create_dir_all(&archives)
            .map_err(ResetError::io(Operation::CreateArchive, &archives))?;

        let metadata = metadata::generate(
            operation,
            &GenerateOptions {
                workspace_root: &self.workspace_root,
                custom_paths: &[],
                categories: Some(categories),
                clock: self.clock.as_ref(),
                vcs: self.vcs.as_ref(),
            },
        )?;
        let id = allocate_name(&archives, operation, metadata.created);
        archive::create(
            &self.workspace_root,
            &archives.join(&id),
            metadata,
            categories,
            progress,
        )?;
        Ok(id)
    }

    fn clear_category(&self, category: &Category) -> Result<Vec<String>> {
        let files = archive::category_files(&self.workspace_root, category, Operation::Reset)?;
        let root = self.workspace_root.join(category.root());
        let mut cleared = Vec::with_capacity(files.len());
        for relative in &files {
            let path = self.workspace_root.join(relative);
            std::fs::remove_file(&path).map_err(ResetError::io(Operation::Reset, &path))?;
            if let Some(parent) = path.parent() {
                archive::prune_empty_dirs(parent, &root);
            }
            tracing::debug!(file = %relative.display(), "cleared file");
            cleared.push(display_relative(relative));
        }
        Ok(cleared)
    }

    fn reset_category(&self, category: &Category) -> Result<Vec<String>> {
        let context = PlaceholderContext::new(self.clock.now(), &self.workspace_root);
        let mut reset = Vec::new();
        for target in self.templates.targets(category) {
            let template = self.templates.resolve(target.name)?;
            let path = self.workspace_root.join(&target.path);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(ResetError::io(Operation::Reset, parent))?;
            }
            archive::write_atomic(
                &path,
                substitute(&template.content, &context).as_bytes(),
                Operation::Reset,
            )?;
            tracing::debug!(file = %target.path.display(), template = target.name, "reset file from template");
            reset.push(display_relative(&target.path));
        }
        Ok(reset)
    }
}

/// `<operation>-<YYYYMMDDTHHMMSSZ>`, suffixed `-2`, `-3`, ... when taken.
fn allocate_name(archives: &Path, operation: ArchiveOperation, created: DateTime<Utc>) -> String {
    let base = format!("{operation}-{}", created.format("%Y%m%dT%H%M%SZ"));
    if !archives.join(&base).exists() {
        return base;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !archives.join(&candidate).exists() {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::provenance::MockClock;
    use crate::provenance::NoVcs;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn orchestrator(root: &Path) -> ResetOrchestrator {
        ResetOrchestrator::new(root)
            .with_clock(Arc::new(MockClock::fixed()))
            .with_vcs(Arc::new(NoVcs))
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn confirmed() -> ResetOptions {
        ResetOptions {
            confirmed: true,
            ..ResetOptions::default()
        }
    }

    #[test]
    fn unconfirmed_reset_touches_nothing() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs/plans/x.md", "x");
        let err = orchestrator(dir.path())
            .perform_reset(ResetPolicy::Light, &ResetOptions::default())
            .unwrap_err();
        assert!(matches!(err, ResetError::InvalidInput { .. }));
        assert!(dir.path().join("docs/plans/x.md").exists());
        assert!(!dir.path().join(".archives").exists());
    }

    #[test]
    fn archive_names_must_be_single_components() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path());
        for bad in ["", "..", "a/b", "../x", "/abs", "."] {
            assert!(orchestrator.archive_path(bad).is_err(), "{bad:?} accepted");
        }
        assert!(orchestrator.archive_path("light-20260115T120000Z").is_ok());
    }

    #[test]
    fn custom_path_into_archives_is_rejected() {
        let dir = TempDir::new().unwrap();
        let options = ResetOptions {
            custom_paths: vec![PathBuf::from(".archives/old")],
            ..confirmed()
        };
        let err = orchestrator(dir.path())
            .perform_reset(ResetPolicy::Custom, &options)
            .unwrap_err();
        assert!(err.to_string().contains("archives directory"));
    }

    #[test]
    fn custom_path_containing_archives_is_rejected() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(dir.path()).with_archives_dir("state/archives");
        let options = ResetOptions {
            custom_paths: vec![PathBuf::from("state")],
            ..confirmed()
        };
        assert!(orchestrator.perform_reset(ResetPolicy::Custom, &options).is_err());
    }

    #[test]
    fn names_collide_into_numbered_suffixes() {
        let dir = TempDir::new().unwrap();
        let created = MockClock::fixed().now();
        let first = allocate_name(dir.path(), ArchiveOperation::Light, created);
        assert_eq!(first, "light-20260115T120000Z");
        std::fs::create_dir(dir.path().join(&first)).unwrap();
        let second = allocate_name(dir.path(), ArchiveOperation::Light, created);
        assert_eq!(second, "light-20260115T120000Z-2");
    }

    #[test]
    fn plan_has_no_side_effects() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs/plans/x.md", "x");
        write(dir.path(), "docs/plans/README.md", "readme");
        write(dir.path(), "memory/progress.md", "old");

        let plan = orchestrator(dir.path())
            .plan_reset(ResetPolicy::Full, &ResetOptions::default())
            .unwrap();
        assert!(plan.archive);
        let plans = &plan.categories[0];
        assert_eq!(plans.root, "docs/plans");
        assert_eq!(plans.action, "archive+clear");
        assert_eq!(plans.cleared, vec!["docs/plans/x.md"]);
        let memory = plan
            .categories
            .iter()
            .find(|c| c.root == "memory")
            .unwrap();
        assert_eq!(memory.archived, vec!["memory/progress.md"]);
        assert_eq!(memory.reset.len(), 3);
        assert!(dir.path().join("docs/plans/x.md").exists());
        assert!(!dir.path().join(".archives").exists());
    }

    #[test]
    fn template_reset_substitutes_placeholders() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "memory/progress.md", "old notes");
        write(dir.path(), "templates/progress.template.md", "# Progress for {{PROJECT_NAME}} {{DATE}}");

        let outcome = orchestrator(dir.path())
            .perform_reset(ResetPolicy::Medium, &confirmed())
            .unwrap();
        assert_eq!(outcome.reset.len(), 3);
        let project = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("memory/progress.md")).unwrap(),
            format!("# Progress for {project} 2026-01-15")
        );
        assert!(dir.path().join("memory/decisions.md").is_file());
        assert!(dir.path().join("templates/progress.template.md").is_file());
    }

    #[test]
    fn skip_archive_still_clears() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs/reports/r.md", "r");
        let options = ResetOptions {
            skip_archive: true,
            ..confirmed()
        };
        let outcome = orchestrator(dir.path())
            .perform_reset(ResetPolicy::Light, &options)
            .unwrap();
        assert_eq!(outcome.archive_id, None);
        assert_eq!(outcome.cleared, vec!["docs/reports/r.md"]);
        assert!(dir.path().join("docs/reports").is_dir());
    }

    #[test]
    fn restore_of_missing_archive_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = orchestrator(dir.path())
            .restore_from_archive("light-19700101T000000Z", &RestoreOptions { confirmed: true })
            .unwrap_err();
        assert!(matches!(err, ResetError::ArchiveNotFound { .. }));
    }
}
