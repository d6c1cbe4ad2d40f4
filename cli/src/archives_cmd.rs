//! Archive housekeeping: `list`, `show`, `validate`, `clear-archives` and
//! `evict`.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use wskit_core::metadata;
use wskit_core::metadata::format_bytes;
use wskit_core::reset::ArchiveListing;

use crate::CommandContext;
use crate::ConfirmArgs;
use crate::EXIT_INVALID_ARCHIVE;
use crate::not_confirmed;
use crate::print_json;

#[derive(Debug, Clone, Parser)]
pub struct NameArgs {
    /// Archive name as shown by `wskit list`
    #[arg(value_name = "ARCHIVE")]
    pub name: String,
}

#[derive(Debug, Clone, Copy, Parser)]
pub struct EvictArgs {
    /// Number of archives to keep (defaults to archive.retention_limit)
    #[arg(long = "limit", short = 'n', value_name = "N")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

pub(crate) fn run_list(ctx: &CommandContext) -> anyhow::Result<ExitCode> {
    let listings = ctx.orchestrator.list_archives()?;
    if ctx.json {
        print_json(&listings)?;
    } else if listings.is_empty() {
        println!(
            "No archives in {}",
            ctx.orchestrator.archives_path().display()
        );
    } else {
        for listing in &listings {
            println!("{}", render_listing(listing));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn render_listing(listing: &ArchiveListing) -> String {
    match (&listing.metadata, listing.valid) {
        (Some(metadata), true) => format!(
            "{:<36} {:<12} {}  {:>5} file(s)  {:>9}",
            listing.id,
            metadata.operation.as_str(),
            metadata.created.format("%Y-%m-%d %H:%M:%S"),
            metadata.contents.files.total,
            format_bytes(metadata.contents.total_size)
        ),
        _ => format!("{:<36} INVALID ({})", listing.id, listing.problems.join("; ")),
    }
}

pub(crate) fn run_show(ctx: &CommandContext, args: &NameArgs) -> anyhow::Result<ExitCode> {
    let path = ctx.orchestrator.archive_path(&args.name)?;
    let report = ctx.orchestrator.inspect_archive(&args.name)?;
    match report.metadata {
        Some(metadata) if ctx.json => print_json(&metadata)?,
        Some(metadata) => {
            println!("{}", path.display());
            print!("{}", metadata::render(&metadata));
            for problem in &report.problems {
                println!("warning: {problem}");
            }
        }
        None => {
            anyhow::bail!(
                "archive '{}' has no readable descriptor: {}",
                args.name,
                report.problems.join("; ")
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn run_validate(ctx: &CommandContext, args: &NameArgs) -> anyhow::Result<ExitCode> {
    let report = ctx.orchestrator.inspect_archive(&args.name)?;
    let valid = report.is_valid();
    if ctx.json {
        print_json(&serde_json::json!({
            "archive": args.name,
            "valid": valid,
            "problems": report.problems,
        }))?;
    } else if valid {
        println!("{}: valid", args.name);
    } else {
        println!("{}: invalid", args.name);
        for problem in &report.problems {
            println!("  - {problem}");
        }
    }

    if valid {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_INVALID_ARCHIVE))
    }
}

pub(crate) fn run_clear(ctx: &CommandContext, args: ConfirmArgs) -> anyhow::Result<ExitCode> {
    if !args.yes {
        return Ok(not_confirmed("delete every archive"));
    }
    let removed = ctx.orchestrator.clear_archives()?;
    if ctx.json {
        print_json(&removed)?;
    } else {
        println!("Removed {} archive(s)", removed.len());
    }
    Ok(ExitCode::SUCCESS)
}

pub(crate) fn run_evict(ctx: &CommandContext, args: EvictArgs) -> anyhow::Result<ExitCode> {
    let limit = args
        .limit
        .or(ctx.config.archive.retention_limit)
        .context("no retention limit given; pass --limit or set archive.retention_limit")?;
    if !args.confirm.yes {
        return Ok(not_confirmed(&format!(
            "evict archives beyond the newest {limit}"
        )));
    }
    let evicted = ctx.orchestrator.evict_archives(limit)?;
    if ctx.json {
        print_json(&evicted)?;
    } else if evicted.is_empty() {
        println!("Nothing to evict; at most {limit} archive(s) present");
    } else {
        for id in &evicted {
            println!("evicted {id}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn invalid_listing_shows_problems() {
        let listing = ArchiveListing {
            id: "partial".to_string(),
            path: PathBuf::from(".archives/partial"),
            valid: false,
            problems: vec!["archive-metadata.json is missing".to_string()],
            metadata: None,
        };
        let line = render_listing(&listing);
        assert!(line.starts_with("partial"));
        assert!(line.ends_with("INVALID (archive-metadata.json is missing)"));
    }
}
