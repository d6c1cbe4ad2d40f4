//! `reset`, `plan` and `restore`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use wskit_core::ResetOptions;
use wskit_core::ResetPolicy;
use wskit_core::RestoreOptions;
use wskit_core::metadata::format_bytes;
use wskit_core::reset::ResetOutcome;
use wskit_core::reset::ResetPlan;
use wskit_core::reset::RestoreOutcome;

use crate::CommandContext;
use crate::not_confirmed;
use crate::print_json;
use crate::progress_printer;

/// Arguments shared by `reset` and `plan`
#[derive(Debug, Clone, Parser)]
pub struct ResetArgs {
    /// Reset policy (light, medium, full, custom)
    #[arg(value_name = "POLICY")]
    pub policy: ResetPolicy,

    /// Workspace-relative path to clear; required for `custom`, repeatable
    #[arg(long = "path", short = 'p', value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Confirm the destructive step
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,

    /// Clear without taking an archive first
    #[arg(long = "skip-archive")]
    pub skip_archive: bool,

    /// Delete every existing archive before archiving
    #[arg(long = "clear-archives")]
    pub clear_archives: bool,

    /// Keep only this many archives afterwards (overrides config)
    #[arg(long = "retention-limit", value_name = "N")]
    pub retention_limit: Option<usize>,
}

impl ResetArgs {
    fn options(&self, ctx: &CommandContext, confirmed: bool) -> ResetOptions {
        ResetOptions {
            confirmed,
            skip_archive: self.skip_archive,
            clear_archives: self.clear_archives,
            retention_limit: self
                .retention_limit
                .or(ctx.config.archive.retention_limit),
            custom_paths: self.paths.clone(),
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct RestoreArgs {
    /// Archive name as shown by `wskit list`
    #[arg(value_name = "ARCHIVE")]
    pub name: String,

    /// Confirm the destructive step
    #[arg(long = "yes", short = 'y')]
    pub yes: bool,
}

pub(crate) fn run_plan(ctx: &CommandContext, args: ResetArgs) -> anyhow::Result<ExitCode> {
    let plan = ctx
        .orchestrator
        .plan_reset(args.policy, &args.options(ctx, false))?;
    if ctx.json {
        print_json(&plan)?;
    } else {
        for line in render_plan(&plan) {
            println!("{line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn run_reset(ctx: &CommandContext, args: ResetArgs) -> anyhow::Result<ExitCode> {
    if !args.yes {
        // Show exactly what is at stake.
        let plan = ctx
            .orchestrator
            .plan_reset(args.policy, &args.options(ctx, false))?;
        for line in render_plan(&plan) {
            eprintln!("{line}");
        }
        return Ok(not_confirmed(&format!("run the {} reset", args.policy)));
    }

    let mut progress = progress_printer("archiving", !ctx.json);
    let outcome = ctx.orchestrator.perform_reset_with_progress(
        args.policy,
        &args.options(ctx, true),
        &mut progress,
    )?;

    if ctx.json {
        print_json(&outcome)?;
    } else {
        for line in render_outcome(ctx, &outcome) {
            println!("{line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn run_restore(ctx: &CommandContext, args: RestoreArgs) -> anyhow::Result<ExitCode> {
    if !args.yes {
        return Ok(not_confirmed(&format!("restore '{}'", args.name)));
    }

    let mut progress = progress_printer("restoring", !ctx.json);
    let outcome = ctx.orchestrator.restore_from_archive_with_progress(
        &args.name,
        &RestoreOptions { confirmed: true },
        &mut progress,
    )?;

    if ctx.json {
        print_json(&outcome)?;
    } else {
        println!("{}", render_restore(&outcome));
    }
    Ok(ExitCode::SUCCESS)
}

fn render_plan(plan: &ResetPlan) -> Vec<String> {
    let mut lines = vec![format!("Plan for {} reset", plan.policy)];
    if !plan.archive {
        lines.push("  archive skipped: cleared files will not be recoverable".to_string());
    }
    for category in &plan.categories {
        lines.push(format!("  {} ({})", category.root, category.action));
        lines.extend(category.archived.iter().map(|path| format!("    archive {path}")));
        lines.extend(category.cleared.iter().map(|path| format!("    delete  {path}")));
        lines.extend(category.reset.iter().map(|path| format!("    rewrite {path}")));
    }
    if !plan.archives_to_clear.is_empty() {
        lines.push(format!(
            "  existing archives removed first: {}",
            plan.archives_to_clear.join(", ")
        ));
    }
    if let Some(limit) = plan.retention_limit {
        lines.push(format!("  keep the newest {limit} archive(s)"));
    }
    lines
}

fn render_outcome(ctx: &CommandContext, outcome: &ResetOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    match &outcome.archive_id {
        Some(id) => lines.push(format!(
            "Archived to {}",
            ctx.orchestrator.archives_path().join(id).display()
        )),
        None => lines.push("No archive taken".to_string()),
    }
    lines.push(format!("Cleared {} file(s)", outcome.cleared.len()));
    if !outcome.reset.is_empty() {
        lines.push(format!("Reset from templates: {}", outcome.reset.join(", ")));
    }
    if !outcome.evicted.is_empty() {
        lines.push(format!("Evicted: {}", outcome.evicted.join(", ")));
    }
    lines
}

fn render_restore(outcome: &RestoreOutcome) -> String {
    format!(
        "Restored {} file(s) ({}) from {}; previous state saved as {}",
        outcome.restored_files,
        format_bytes(outcome.restored_bytes),
        outcome.archive_id,
        outcome.safety_archive_id
    )
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wskit_core::reset::PlannedCategory;

    #[test]
    fn plan_lists_every_action() {
        let plan = ResetPlan {
            policy: ResetPolicy::Light,
            archive: false,
            categories: vec![PlannedCategory {
                root: "docs/plans".to_string(),
                action: "archive+clear",
                archived: Vec::new(),
                cleared: vec!["docs/plans/x.md".to_string()],
                reset: Vec::new(),
            }],
            archives_to_clear: Vec::new(),
            retention_limit: Some(3),
        };
        assert_eq!(
            render_plan(&plan),
            vec![
                "Plan for light reset",
                "  archive skipped: cleared files will not be recoverable",
                "  docs/plans (archive+clear)",
                "    delete  docs/plans/x.md",
                "  keep the newest 3 archive(s)",
            ]
        );
    }

    #[test]
    fn restore_summary_names_the_safety_archive() {
        let line = render_restore(&RestoreOutcome {
            archive_id: "light-20260115T120000Z".to_string(),
            safety_archive_id: "pre-restore-20260115T120100Z".to_string(),
            restored_files: 2,
            restored_bytes: 10,
        });
        assert!(line.starts_with("Restored 2 file(s)"));
        assert!(line.ends_with("pre-restore-20260115T120100Z"));
    }
}
