//! CLI output formatting for a build.
//!
//! # Output Format
//!
//! ```text
//! Gallery /var/www/html/photos/2024/trip
//!     Selected: 42 photos
//!     Rating filter: 5 dropped
//!     Captions: 3 applied
//!     Resized: 4 written, 33 current
//!     Removed: 2 photos
//!         old_a.jpg
//!         old_b.jpg
//!     Album: 2024/album.xml (added)
//! Published 37 photos
//! ```
//!
//! Lines for steps that did nothing (no filter, no captions, nothing removed,
//! no parent album) are left out.
//!
//! [`format_report`] returns `Vec<String>` for testability and
//! [`print_report`] writes it to stdout.

use crate::album::AlbumUpdate;
use crate::pipeline::BuildReport;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn photos(n: usize) -> String {
    if n == 1 {
        "1 photo".to_string()
    } else {
        format!("{n} photos")
    }
}

fn outcome_label(outcome: AlbumUpdate) -> &'static str {
    match outcome {
        AlbumUpdate::Unchanged => "unchanged",
        AlbumUpdate::Updated => "updated",
        AlbumUpdate::Added => "added",
        AlbumUpdate::Created => "created, set its title",
    }
}

/// Album path shown relative to the gallery's base directory when possible.
fn album_display(path: &Path, dest_dir: &Path, dir_depth: usize) -> String {
    let base = dest_dir.ancestors().nth(dir_depth);
    base.and_then(|b| path.strip_prefix(b).ok())
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Format a build report.
///
/// `dir` is the gallery's `dir` setting, used to show the album path
/// relative to the base output directory.
pub fn format_report(report: &BuildReport, dir: &str) -> Vec<String> {
    let mut lines = vec![format!("Gallery {}", report.dest_dir.display())];
    let pad = indent(1);

    lines.push(format!("{pad}Selected: {}", photos(report.selected)));
    if report.filtered_out > 0 {
        lines.push(format!("{pad}Rating filter: {} dropped", report.filtered_out));
    }
    if report.captioned > 0 {
        lines.push(format!("{pad}Captions: {} applied", report.captioned));
    }
    lines.push(format!(
        "{pad}Resized: {} written, {} current",
        report.written, report.skipped
    ));
    if !report.removed.is_empty() {
        lines.push(format!("{pad}Removed: {}", photos(report.removed.len())));
        for name in &report.removed {
            lines.push(format!("{}{name}", indent(2)));
        }
    }
    if let Some(album) = &report.album {
        let depth = dir.split('/').filter(|p| !p.is_empty() && *p != ".").count();
        lines.push(format!(
            "{pad}Album: {} ({})",
            album_display(&album.path, &report.dest_dir, depth),
            outcome_label(album.outcome)
        ));
    }
    lines.push(format!("Published {}", photos(report.photos)));
    lines
}

/// Print a build report to stdout.
pub fn print_report(report: &BuildReport, dir: &str) {
    for line in format_report(report, dir) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
