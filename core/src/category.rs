//! Reset policies and the path categories they resolve to.
//!
//! A [`Category`] is one workspace-relative root plus the destructive action
//! applied to it. Which files a category archives and clears is decided by
//! [`Category::selects`], and the README/template exclusion lives there so
//! that no policy can bypass it.

use std::fmt;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;
use crate::metadata::METADATA_FILENAME;

/// File name that is never cleared.
pub const README_FILE: &str = "README.md";

/// Infix marking template files (`*.template.*`), which are never cleared.
pub const TEMPLATE_INFIX: &str = ".template.";

pub const PLANS_ROOT: &str = "docs/plans";
pub const REPORTS_ROOT: &str = "docs/reports";
pub const MEMORY_ROOT: &str = "memory";
pub const ARCHITECTURE_ROOT: &str = "docs/architecture";

/// Named reset configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// Archive and clear planning documents; memory is left alone.
    Light,
    /// Archive memory files and rewrite them from templates.
    Medium,
    /// Everything `light` and `medium` touch, plus an archive-only snapshot
    /// of architecture notes.
    Full,
    /// Caller-supplied paths, archived and cleared.
    Custom,
}

impl ResetPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPolicy::Light => "light",
            ResetPolicy::Medium => "medium",
            ResetPolicy::Full => "full",
            ResetPolicy::Custom => "custom",
        }
    }

    pub fn all() -> [Self; 4] {
        [
            ResetPolicy::Light,
            ResetPolicy::Medium,
            ResetPolicy::Full,
            ResetPolicy::Custom,
        ]
    }
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetPolicy {
    type Err = ResetError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        ResetPolicy::all()
            .into_iter()
            .find(|policy| policy.as_str() == normalized)
            .ok_or_else(|| {
                ResetError::invalid_input(
                    Operation::Resolve,
                    format!("unknown reset policy '{s}' (expected light, medium, full or custom)"),
                )
            })
    }
}

/// What a reset does to a category after it has been archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestructiveAction {
    Clear,
    TemplateReset,
    None,
}

impl DestructiveAction {
    /// Tag used in plans and listings.
    pub fn tag(&self) -> &'static str {
        match self {
            DestructiveAction::Clear => "archive+clear",
            DestructiveAction::TemplateReset => "archive+template-reset",
            DestructiveAction::None => "archive-only",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Category {
    name: String,
    root: PathBuf,
    action: DestructiveAction,
}

impl Category {
    /// Build a category from an already normalized relative root.
    fn from_normalized(root: PathBuf, action: DestructiveAction) -> Self {
        Self {
            name: display_relative(&root),
            root,
            action,
        }
    }

    /// Build a category after checking that `root` is a safe relative path.
    pub fn new(root: impl AsRef<Path>, action: DestructiveAction) -> Result<Self> {
        let root = normalize_relative(root.as_ref(), Operation::Resolve)?;
        Ok(Self::from_normalized(root, action))
    }

    /// An archive-only category, used for pre-restore snapshots.
    pub fn archive_only(root: impl AsRef<Path>) -> Result<Self> {
        Self::new(root, DestructiveAction::None)
    }

    /// Root with `/` separators; this is the key used in metadata.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn action(&self) -> DestructiveAction {
        self.action
    }

    /// Whether the workspace-relative file belongs to this category's archive
    /// set. Clear categories skip protected files, so those are neither
    /// archived nor deleted.
    pub fn selects(&self, relative: &Path) -> bool {
        if !relative.starts_with(&self.root) {
            return false;
        }
        match self.action {
            DestructiveAction::Clear => is_clearable(relative),
            DestructiveAction::TemplateReset | DestructiveAction::None => true,
        }
    }

    /// Whether two categories would walk overlapping trees.
    pub fn overlaps(&self, other: &Category) -> bool {
        self.root.starts_with(&other.root) || other.root.starts_with(&self.root)
    }
}

/// `README.md` and `*.template.*` files.
pub fn is_protected(path: &Path) -> bool {
    match path.file_name().and_then(|name| name.to_str()) {
        Some(name) => name == README_FILE || name.contains(TEMPLATE_INFIX),
        None => false,
    }
}

pub fn is_clearable(path: &Path) -> bool {
    !is_protected(path)
}

/// Resolve a policy to its categories.
///
/// `custom_paths` is only accepted (and required) for [`ResetPolicy::Custom`].
pub fn resolve(policy: ResetPolicy, custom_paths: &[PathBuf]) -> Result<Vec<Category>> {
    if policy != ResetPolicy::Custom && !custom_paths.is_empty() {
        return Err(ResetError::invalid_input(
            Operation::Resolve,
            format!("custom paths are only accepted by the custom policy, not '{policy}'"),
        ));
    }

    let plans = || Category::from_normalized(PathBuf::from(PLANS_ROOT), DestructiveAction::Clear);
    let reports =
        || Category::from_normalized(PathBuf::from(REPORTS_ROOT), DestructiveAction::Clear);
    let memory = || {
        Category::from_normalized(PathBuf::from(MEMORY_ROOT), DestructiveAction::TemplateReset)
    };
    let architecture =
        || Category::from_normalized(PathBuf::from(ARCHITECTURE_ROOT), DestructiveAction::None);

    let categories = match policy {
        ResetPolicy::Light => vec![plans(), reports()],
        ResetPolicy::Medium => vec![memory()],
        ResetPolicy::Full => vec![plans(), reports(), memory(), architecture()],
        ResetPolicy::Custom => resolve_custom(custom_paths)?,
    };
    tracing::debug!(
        %policy,
        categories = ?categories.iter().map(Category::name).collect::<Vec<_>>(),
        "resolved reset categories"
    );
    Ok(categories)
}

fn resolve_custom(paths: &[PathBuf]) -> Result<Vec<Category>> {
    if paths.is_empty() {
        return Err(ResetError::invalid_input(
            Operation::Resolve,
            "the custom policy needs at least one path",
        ));
    }

    let mut categories: Vec<Category> = Vec::with_capacity(paths.len());
    for path in paths {
        let category = Category::new(path, DestructiveAction::Clear)?;
        if category.root().starts_with(METADATA_FILENAME) {
            return Err(ResetError::invalid_input(
                Operation::Resolve,
                format!("'{METADATA_FILENAME}' is reserved for archive metadata"),
            ));
        }
        if categories.iter().any(|existing| existing.root == category.root) {
            continue;
        }
        if let Some(existing) = categories.iter().find(|existing| existing.overlaps(&category)) {
            return Err(ResetError::invalid_input(
                Operation::Resolve,
                format!(
                    "custom paths '{}' and '{}' overlap",
                    existing.name(),
                    category.name()
                ),
            ));
        }
        categories.push(category);
    }
    Ok(categories)
}

/// Normalize a caller-supplied relative path: drop `.` components and reject
/// anything absolute, empty, or climbing out with `..`.
pub fn normalize_relative(path: &Path, operation: Operation) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(ResetError::invalid_input(
                    operation,
                    format!("path '{}' must not contain '..'", path.display()),
                ));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ResetError::invalid_input(
                    operation,
                    format!("path '{}' must be relative to the workspace", path.display()),
                ));
            }
        }
    }
    if normalized.as_os_str().is_empty() {
        return Err(ResetError::invalid_input(
            operation,
            format!("path '{}' does not name anything inside the workspace", path.display()),
        ));
    }
    Ok(normalized)
}

/// Render a relative path with `/` separators on every platform.
pub fn display_relative(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
