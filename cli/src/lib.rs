//! `wskit` command line.
//!
//! Archives, resets and restores the planning, report and memory trees of an
//! assistant workspace.
//!
//! ## Exit Codes
//!
//! - 0: Success
//! - 1: The operation failed (a remediation hint is printed)
//! - 2: `validate` found an invalid archive
//! - 3: A destructive command ran without `--yes`

mod archives_cmd;
mod reset_cmd;

use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use tracing_subscriber::EnvFilter;
use wskit_core::ResetError;
use wskit_core::ResetOrchestrator;
use wskit_core::archive::Phase;
use wskit_core::archive::ProgressEvent;
use wskit_core::config::AppConfig;
use wskit_core::config::ConfigLoader;

pub use archives_cmd::EvictArgs;
pub use archives_cmd::NameArgs;
pub use reset_cmd::ResetArgs;
pub use reset_cmd::RestoreArgs;

pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_INVALID_ARCHIVE: u8 = 2;
pub const EXIT_CANCELLED: u8 = 3;

/// Workspace archive and reset tool
#[derive(Debug, Parser)]
#[command(name = "wskit", version = wskit_core::VERSION)]
pub struct Cli {
    /// Workspace root (defaults to current directory)
    #[arg(short = 'C', long = "workspace", value_name = "DIR", global = true)]
    pub workspace: Option<PathBuf>,

    /// Explicit config file; must exist
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output as JSON instead of text
    #[arg(long = "json", short = 'j', global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Archive a policy's categories, then clear or reset them
    Reset(ResetArgs),

    /// Show what a reset would archive, delete and rewrite
    Plan(ResetArgs),

    /// Restore an archive over the live workspace
    Restore(RestoreArgs),

    /// List archives, newest first
    List,

    /// Print an archive's descriptor
    Show(NameArgs),

    /// Check an archive's integrity
    Validate(NameArgs),

    /// Delete every archive
    ClearArchives(ConfirmArgs),

    /// Delete all but the newest archives
    Evict(EvictArgs),
}

#[derive(Debug, Clone, Copy, Parser)]
pub struct ConfirmArgs {
    /// Confirm the destructive step
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,
}

/// Everything a subcommand needs once configuration is resolved.
pub(crate) struct CommandContext {
    pub orchestrator: ResetOrchestrator,
    pub config: AppConfig,
    pub json: bool,
}

impl Cli {
    /// Run the command and map the result to a process exit code.
    pub fn run(self) -> ExitCode {
        match self.execute() {
            Ok(code) => code,
            Err(err) => {
                eprintln!("Error: {err:#}");
                if let Some(reset_err) = err.downcast_ref::<ResetError>() {
                    eprintln!("hint: {}", reset_err.remediation());
                }
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }

    fn execute(self) -> anyhow::Result<ExitCode> {
        let workspace = match self.workspace {
            Some(path) => path,
            None => std::env::current_dir().context("failed to read the current directory")?,
        };
        let workspace = std::fs::canonicalize(&workspace)
            .with_context(|| format!("workspace {} does not exist", workspace.display()))?;
        if !workspace.is_dir() {
            anyhow::bail!("workspace {} is not a directory", workspace.display());
        }

        let config = load_config(&workspace, self.config.as_deref())?;
        init_tracing(&config.logging.level);
        tracing::debug!(workspace = %workspace.display(), "configuration loaded");

        let ctx = CommandContext {
            orchestrator: ResetOrchestrator::from_config(&workspace, &config),
            config,
            json: self.json,
        };

        match self.command {
            Command::Reset(args) => reset_cmd::run_reset(&ctx, args),
            Command::Plan(args) => reset_cmd::run_plan(&ctx, args),
            Command::Restore(args) => reset_cmd::run_restore(&ctx, args),
            Command::List => archives_cmd::run_list(&ctx),
            Command::Show(args) => archives_cmd::run_show(&ctx, &args),
            Command::Validate(args) => archives_cmd::run_validate(&ctx, &args),
            Command::ClearArchives(args) => archives_cmd::run_clear(&ctx, args),
            Command::Evict(args) => archives_cmd::run_evict(&ctx, args),
        }
    }
}

fn load_config(workspace: &Path, explicit: Option<&Path>) -> anyhow::Result<AppConfig> {
    let mut loader = ConfigLoader::new().with_workspace(workspace);
    if let Some(path) = explicit {
        loader = loader.with_file(path);
    }
    loader.load().context("failed to load configuration")
}

/// Log to stderr so stdout stays machine-readable. `RUST_LOG` wins over the
/// configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Destructive commands refuse to run without `--yes`.
pub(crate) fn not_confirmed(what: &str) -> ExitCode {
    eprintln!("Refusing to {what} without --yes; nothing was changed.");
    ExitCode::from(EXIT_CANCELLED)
}

/// Progress observer printing one stderr line per phase change. Silent in
/// JSON mode.
pub(crate) fn progress_printer(verb: &'static str, enabled: bool) -> impl FnMut(&ProgressEvent) {
    let mut last: Option<Phase> = None;
    move |event: &ProgressEvent| {
        if !enabled || last.as_ref() == Some(&event.phase) {
            return;
        }
        match &event.phase {
            Phase::Counting => eprintln!("{verb}: {} file(s)", event.total),
            Phase::Category(root) => {
                eprintln!("  {root} [{}/{}]", event.processed, event.total);
            }
            Phase::Metadata => {}
            Phase::Complete => eprintln!("  done [{}/{}]", event.processed, event.total),
        }
        last = Some(event.phase.clone());
    }
}

pub(crate) fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
