//! Human-readable descriptor summary.
//!
//! Output is for people only; nothing parses it back.

use chrono::SecondsFormat;

use super::schema::Metadata;

/// Render the descriptor as display lines.
pub fn render_lines(metadata: &Metadata) -> Vec<String> {
    let mut lines = Vec::new();

    section(&mut lines, "Archive");
    lines.push(format!("  Version:    {}", metadata.version));
    lines.push(format!(
        "  Created:    {}",
        metadata.created.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    lines.push(format!("  Operation:  {}", metadata.operation));

    lines.push(String::new());
    section(&mut lines, "Source");
    lines.push(format!("  Path:       {}", metadata.source.path));
    lines.push(format!("  Revision:   {}", metadata.source.vcs_revision));
    lines.push(format!("  Branch:     {}", metadata.source.vcs_branch));
    lines.push(format!("  User:       {}", metadata.source.user));
    lines.push(format!("  Platform:   {}", metadata.source.platform));

    lines.push(String::new());
    section(&mut lines, "Contents");
    let width = metadata
        .contents
        .directories
        .iter()
        .map(String::len)
        .max()
        .unwrap_or(0);
    if metadata.contents.directories.is_empty() {
        lines.push("  (no directories)".to_string());
    }
    for directory in &metadata.contents.directories {
        let count = metadata
            .contents
            .files
            .categories
            .get(directory)
            .copied()
            .unwrap_or(0);
        lines.push(format!("  {directory:<width$}  {}", plural(count, "file")));
    }
    lines.push(format!(
        "  Total:      {}, {}",
        plural(metadata.contents.files.total, "file"),
        format_bytes(metadata.contents.total_size)
    ));

    lines.push(String::new());
    section(&mut lines, "Restoration");
    lines.push(format!(
        "  Compatible: {}",
        metadata.restoration.compatible.join(", ")
    ));
    if metadata.restoration.requirements.is_empty() {
        lines.push("  Requirements: none".to_string());
    } else {
        lines.push("  Requirements:".to_string());
        for requirement in &metadata.restoration.requirements {
            lines.push(format!("    - {requirement}"));
        }
    }

    lines
}

/// Render the descriptor as one multi-line string.
pub fn render(metadata: &Metadata) -> String {
    let mut text = render_lines(metadata).join("\n");
    text.push('\n');
    text
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push(title.to_string());
    lines.push("-".repeat(title.len()));
}

fn plural(count: u64, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Format a byte count with a binary unit.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}
