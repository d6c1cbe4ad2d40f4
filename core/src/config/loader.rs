use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::config::error::ConfigError;
use crate::config::error::Result;

/// Config file looked up in the workspace root.
pub const CONFIG_FILENAME: &str = "wskit.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "WSKIT";

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Root application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub templates: TemplatesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Archives directory, relative to the workspace root
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,

    /// Archives to keep after a reset (unlimited when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplatesConfig {
    /// Project-local template overrides, relative to the workspace root
    #[serde(default = "default_templates_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from(crate::DEFAULT_ARCHIVES_DIR)
}

fn default_templates_dir() -> PathBuf {
    PathBuf::from("templates")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
            retention_limit: None,
        }
    }
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: default_templates_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Check every value and report all problems at once.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if let Some(problem) = relative_dir_problem("archive.dir", &self.archive.dir) {
            problems.push(problem);
        }
        if let Some(problem) = relative_dir_problem("templates.dir", &self.templates.dir) {
            problems.push(problem);
        }
        if self.archive.retention_limit == Some(0) {
            problems.push("archive.retention_limit must be at least 1".to_string());
        }
        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            problems.push(format!(
                "logging.level '{}' is not one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ValidationError(problems))
        }
    }
}

fn relative_dir_problem(key: &str, dir: &Path) -> Option<String> {
    if dir.as_os_str().is_empty() {
        return Some(format!("{key} must not be empty"));
    }
    let escapes = dir.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    let only_current = dir
        .components()
        .all(|component| component == Component::CurDir);
    if escapes || only_current {
        return Some(format!(
            "{key} '{}' must be a relative path inside the workspace",
            dir.display()
        ));
    }
    None
}

/// Configuration loader with layered sources
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    workspace: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit config file. It must exist.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Pick up `<workspace>/wskit.toml` when present.
    pub fn with_workspace<P: AsRef<Path>>(mut self, workspace: P) -> Self {
        self.workspace = Some(workspace.as_ref().to_path_buf());
        self
    }

    pub fn load(&self) -> Result<AppConfig> {
        let mut builder = Config::builder();

        // Layer 1: Defaults
        let defaults_json = serde_json::to_string(&AppConfig::default())?;
        builder = builder.add_source(File::from_str(&defaults_json, config::FileFormat::Json));

        // Layer 2: Config file
        match (&self.config_path, &self.workspace) {
            (Some(path), _) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.clone()));
                }
                builder = builder.add_source(File::from(path.as_path()));
            }
            (None, Some(workspace)) => {
                if let Some(path) = Self::find_config_file(workspace) {
                    tracing::debug!(path = %path.display(), "loading config file");
                    builder = builder.add_source(File::from(path.as_path()));
                }
            }
            (None, None) => {}
        }

        // Layer 3: Environment variables, e.g. WSKIT_ARCHIVE__RETENTION_LIMIT=5
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;
        app_config.validate()?;
        Ok(app_config)
    }

    /// Locate a config file for the workspace:
    /// 1. `<workspace>/wskit.toml`
    /// 2. XDG config: `~/.config/wskit/config.toml`
    pub fn find_config_file(workspace: &Path) -> Option<PathBuf> {
        let local = workspace.join(CONFIG_FILENAME);
        if local.is_file() {
            return Some(local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let xdg_config = config_dir.join("wskit").join("config.toml");
            if xdg_config.is_file() {
                return Some(xdg_config);
            }
        }

        None
    }

    /// Load configuration for a workspace from the default locations.
    pub fn load_default(workspace: &Path) -> Result<AppConfig> {
        ConfigLoader::new().with_workspace(workspace).load()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.archive.dir, PathBuf::from(".archives"));
        assert_eq!(config.archive.retention_limit, None);
        assert_eq!(config.templates.dir, PathBuf::from("templates"));
        assert_eq!(config.logging.level, "info");
        config.validate().expect("defaults are valid");
    }

    #[test]
    #[serial]
    fn test_load_with_defaults_only() {
        let config = ConfigLoader::new().load().expect("Failed to load default config");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    #[serial]
    fn test_workspace_file_is_picked_up() {
        let workspace = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(
            workspace.path().join(CONFIG_FILENAME),
            "[archive]\ndir = \"snapshots\"\nretention_limit = 4\n",
        )
        .unwrap();

        let config = ConfigLoader::load_default(workspace.path()).expect("Failed to load config");
        assert_eq!(config.archive.dir, PathBuf::from("snapshots"));
        assert_eq!(config.archive.retention_limit, Some(4));
        assert_eq!(config.templates.dir, PathBuf::from("templates"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let workspace = tempfile::tempdir().expect("Failed to create temp dir");
        let path = workspace.path().join("custom.toml");
        std::fs::write(&path, "[archive]\nretention_limit = 4\n\n[logging]\nlevel = \"warn\"\n")
            .unwrap();

        unsafe {
            env::set_var("WSKIT_ARCHIVE__RETENTION_LIMIT", "2");
        }
        let result = ConfigLoader::new().with_file(&path).load();
        unsafe {
            env::remove_var("WSKIT_ARCHIVE__RETENTION_LIMIT");
        }

        let config = result.expect("Failed to load config");
        assert_eq!(config.archive.retention_limit, Some(2));
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    #[serial]
    fn test_missing_file_error() {
        let err = ConfigLoader::new()
            .with_file("/nonexistent/wskit.toml")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    #[serial]
    fn test_multiple_invalid_fields_caught() {
        let workspace = tempfile::tempdir().expect("Failed to create temp dir");
        std::fs::write(
            workspace.path().join(CONFIG_FILENAME),
            "[archive]\ndir = \"../elsewhere\"\nretention_limit = 0\n\n[logging]\nlevel = \"loud\"\n",
        )
        .unwrap();

        match ConfigLoader::load_default(workspace.path()).unwrap_err() {
            ConfigError::ValidationError(problems) => {
                assert_eq!(problems.len(), 3, "{problems:?}");
                assert!(problems[0].starts_with("archive.dir"));
                assert!(problems[1].contains("retention_limit"));
                assert!(problems[2].contains("loud"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_current_dir_is_not_an_archive_dir() {
        let config = AppConfig {
            archive: ArchiveConfig {
                dir: PathBuf::from("."),
                retention_limit: None,
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
