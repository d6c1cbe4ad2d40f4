//! Canonical templates for `template-reset` categories.
//!
//! Templates are compiled into the library with `include_str!()`.
//!
//! ## Resolution Order
//!
//! 1. **Project-local**: `<workspace>/templates/{name}.template.md`
//! 2. **Embedded**: compiled in, always available
//!
//! Placeholders `{{DATE}}`, `{{TIMESTAMP}}` and `{{PROJECT_NAME}}` are
//! substituted when a template is applied. Anything else in double braces is
//! left as written.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;

use crate::category::Category;
use crate::error::Operation;
use crate::error::ResetError;
use crate::error::Result;

/// Embedded template constants.
pub mod embedded {
    /// Current focus and next steps.
    pub const ACTIVE_CONTEXT: &str = include_str!("../../templates/active-context.template.md");

    /// Running progress log.
    pub const PROGRESS: &str = include_str!("../../templates/progress.template.md");

    /// Decision record.
    pub const DECISIONS: &str = include_str!("../../templates/decisions.template.md");
}

/// Template name to the workspace-relative file it resets.
pub const MEMORY_TEMPLATES: &[(&str, &str)] = &[
    ("active-context", "memory/active-context.md"),
    ("progress", "memory/progress.md"),
    ("decisions", "memory/decisions.md"),
];

/// File suffix of project-local overrides.
pub const TEMPLATE_SUFFIX: &str = ".template.md";

/// Get embedded template by name. `None` if the name is not recognized.
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name.to_lowercase().as_str() {
        "active-context" => Some(embedded::ACTIVE_CONTEXT),
        "progress" => Some(embedded::PROGRESS),
        "decisions" => Some(embedded::DECISIONS),
        _ => None,
    }
}

pub fn template_names() -> Vec<&'static str> {
    MEMORY_TEMPLATES.iter().map(|(name, _)| *name).collect()
}

/// Where a template's content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    ProjectLocal(PathBuf),
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub content: String,
    pub source: TemplateSource,
}

/// A file a template-reset category rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTarget {
    pub name: &'static str,
    /// Workspace-relative destination.
    pub path: PathBuf,
}

/// Supplies canonical template text.
pub trait TemplateStore: Send + Sync {
    /// Files under the category that have a template.
    fn targets(&self, category: &Category) -> Vec<TemplateTarget>;

    fn resolve(&self, name: &str) -> Result<ResolvedTemplate>;
}

/// Embedded templates with an optional project-local override directory.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedTemplates {
    override_dir: Option<PathBuf>,
}

impl EmbeddedTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `dir/{name}.template.md` before falling back to the embedded text.
    pub fn with_override_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.override_dir = Some(dir.into());
        self
    }

    /// Where `name` would be resolved from.
    pub fn source(&self, name: &str) -> TemplateSource {
        match self.override_path(name) {
            Some(path) if path.is_file() => TemplateSource::ProjectLocal(path),
            _ => TemplateSource::Embedded,
        }
    }

    fn override_path(&self, name: &str) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|dir| dir.join(format!("{name}{TEMPLATE_SUFFIX}")))
    }
}

impl TemplateStore for EmbeddedTemplates {
    fn targets(&self, category: &Category) -> Vec<TemplateTarget> {
        MEMORY_TEMPLATES
            .iter()
            .filter(|(_, path)| Path::new(path).starts_with(category.root()))
            .map(|&(name, path)| TemplateTarget {
                name,
                path: PathBuf::from(path),
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<ResolvedTemplate> {
        if let TemplateSource::ProjectLocal(path) = self.source(name) {
            let content =
                fs::read_to_string(&path).map_err(ResetError::io(Operation::Reset, &path))?;
            tracing::debug!(template = name, path = %path.display(), "using project template");
            return Ok(ResolvedTemplate {
                content,
                source: TemplateSource::ProjectLocal(path),
            });
        }
        get_embedded(name)
            .map(|content| ResolvedTemplate {
                content: content.to_string(),
                source: TemplateSource::Embedded,
            })
            .ok_or_else(|| {
                ResetError::invalid_input(Operation::Reset, format!("unknown template '{name}'"))
            })
    }
}

/// Values available to `{{...}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderContext {
    pub date: String,
    pub timestamp: String,
    pub project_name: String,
}

impl PlaceholderContext {
    pub fn new(now: DateTime<Utc>, workspace_root: &Path) -> Self {
        let project_name = workspace_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workspace".to_string());
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            timestamp: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            project_name,
        }
    }

    fn value(&self, key: &str) -> Option<&str> {
        match key {
            "DATE" => Some(&self.date),
            "TIMESTAMP" => Some(&self.timestamp),
            "PROJECT_NAME" => Some(&self.project_name),
            _ => None,
        }
    }
}

/// Replace known placeholders; unknown ones are kept verbatim.
pub fn substitute(template: &str, context: &PlaceholderContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        if key.contains("{{") {
            out.push_str("{{");
            rest = after;
            continue;
        }
        match context.value(key) {
            Some(value) => out.push_str(value),
            None => {
                out.push_str("{{");
                out.push_str(key);
                out.push_str("}}");
            }
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
