//! CLI output formatting.
//!
//! Every user-visible message goes through a `format_*` function returning
//! display lines, with a thin `print_*` wrapper for stdout. Keeping the
//! formatting pure makes it testable without capturing stdout.
//!
//! Images are identified by their position in the queue and their display
//! name; sizes and file names follow as context:
//!
//! ## Acquire
//!
//! ```text
//! Queued 4 images
//! Skipped 1 unsupported file
//!     notes
//! Could not load 1 image
//!     broken: decode failed: ...
//! ```
//!
//! ## Convert
//!
//! ```text
//! Converting 3 images to webp
//!     001 dawn → dawn.webp (400x300, 18.2 KB)
//!     002 dusk: could not be converted
//!     003 noon → noon.webp (400x300, 21.0 KB)
//! Saved converted_images.zip (2 images)
//!     out/converted_images.zip
//! ```
//!
//! ## Inspect
//!
//! ```text
//! 001 dawn 800x600 → 400x300
//! 002 pasted-image 1024x768 → 400x300
//! Output: webp, archive
//! ```

use crate::acquire::{AcquireReport, InputChannel};
use crate::clipboard::PasteReport;
use crate::imaging::Dimensions;
use crate::package::PackageReport;
use crate::session::{ConvertEvent, ConvertOutcome, ConvertSummary, Session};
use serde::Serialize;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

/// Human-readable byte size.
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

// ============================================================================
// Acquire
// ============================================================================

pub fn format_acquire_report(report: &AcquireReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.added > 0 {
        let verb = if report.replaced { "Replaced queue with" } else { "Queued" };
        lines.push(format!("{} {}", verb, plural(report.added, "image", "images")));
    }
    if !report.skipped.is_empty() {
        lines.push(format!(
            "Skipped {}",
            plural(report.skipped_count(), "unsupported file", "unsupported files")
        ));
        for name in &report.skipped {
            lines.push(format!("{}{}", indent(1), name));
        }
    }
    if !report.failed.is_empty() {
        lines.push(format!(
            "Could not load {}",
            plural(report.failed.len(), "image", "images")
        ));
        for failure in &report.failed {
            lines.push(format!("{}{}: {}", indent(1), failure.name, failure.reason));
        }
    }
    if report.ignored > 0 {
        lines.push(format!(
            "Ignored {} (batch mode is off)",
            plural(report.ignored, "extra input", "extra inputs")
        ));
    }
    if lines.is_empty() {
        lines.push("No images found.".to_string());
    }
    lines
}

pub fn print_acquire_report(report: &AcquireReport) {
    for line in format_acquire_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Convert
// ============================================================================

/// Format a single conversion progress event as display lines.
pub fn format_convert_event(event: &ConvertEvent) -> Vec<String> {
    match event {
        ConvertEvent::Started { count, format } => {
            vec![format!(
                "Converting {} to {}",
                plural(*count, "image", "images"),
                format
            )]
        }
        ConvertEvent::ImageConverted {
            index,
            name,
            filename,
            dimensions,
            bytes,
        } => vec![format!(
            "{}{} {} \u{2192} {} ({}, {})",
            indent(1),
            format_index(*index),
            name,
            filename,
            dimensions,
            format_size(*bytes)
        )],
        ConvertEvent::ImageFailed { index, name } => vec![format!(
            "{}{} {}: could not be converted",
            indent(1),
            format_index(*index),
            name
        )],
    }
}

fn format_package_report(report: &PackageReport) -> Vec<String> {
    let mut lines = Vec::new();
    match report.archived {
        Some(count) => {
            let location = report.delivered.first().map(String::as_str).unwrap_or("");
            let name = location.rsplit(['/', '\\']).next().unwrap_or(location);
            lines.push(format!(
                "Saved {} ({})",
                name,
                plural(count, "image", "images")
            ));
            lines.push(format!("{}{}", indent(1), location));
        }
        None => {
            if !report.delivered.is_empty() {
                lines.push(format!(
                    "Saved {}",
                    plural(report.delivered.len(), "file", "files")
                ));
                for location in &report.delivered {
                    lines.push(format!("{}{}", indent(1), location));
                }
            }
        }
    }
    for failure in &report.failed {
        lines.push(format!("Could not save {}: {}", failure.name, failure.reason));
    }
    lines
}

fn format_summary(summary: &ConvertSummary) -> Vec<String> {
    if summary.converted == 0 {
        return vec!["No images could be converted.".to_string()];
    }
    let mut lines = format_package_report(&summary.package);
    if !summary.failed.is_empty() {
        lines.push(format!(
            "{} skipped after encode errors",
            plural(summary.failed.len(), "image", "images")
        ));
    }
    lines
}

pub fn format_convert_outcome(outcome: &ConvertOutcome) -> Vec<String> {
    match outcome {
        ConvertOutcome::Busy => vec!["A conversion is already running.".to_string()],
        ConvertOutcome::NothingToConvert => vec!["Please add images first.".to_string()],
        ConvertOutcome::Finished(summary) => format_summary(summary),
    }
}

pub fn print_convert_outcome(outcome: &ConvertOutcome) {
    for line in format_convert_outcome(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Paste
// ============================================================================

pub fn format_paste_report(report: &PasteReport) -> Vec<String> {
    vec![
        format!("Saved {} ({})", report.filename, report.dimensions),
        format!("{}{}", indent(1), report.location),
    ]
}

pub fn print_paste_report(report: &PasteReport) {
    for line in format_paste_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect
// ============================================================================

/// One queued image as shown by `inspect --json`.
#[derive(Debug, Serialize)]
pub struct QueueEntry {
    pub index: usize,
    pub name: String,
    pub channel: InputChannel,
    pub original: Dimensions,
    pub planned: Dimensions,
}

pub fn queue_entries(session: &Session) -> Vec<QueueEntry> {
    session
        .queue()
        .iter()
        .zip(session.planned_dimensions())
        .enumerate()
        .map(|(i, (item, (_, planned)))| QueueEntry {
            index: i + 1,
            name: item.display_name().to_string(),
            channel: item.channel(),
            original: item.original(),
            planned,
        })
        .collect()
}

pub fn format_queue(session: &Session) -> Vec<String> {
    let mut lines: Vec<String> = queue_entries(session)
        .iter()
        .map(|entry| {
            format!(
                "{} {} {} \u{2192} {}",
                format_index(entry.index),
                entry.name,
                entry.original,
                entry.planned
            )
        })
        .collect();
    if lines.is_empty() {
        lines.push("Queue is empty.".to_string());
    }
    let output = session.output();
    let mut detail = output.format.to_string();
    if output.format.is_lossy() {
        detail.push_str(&format!(", quality {}", output.quality.percent()));
    }
    if output.archive {
        detail.push_str(", archive");
    }
    lines.push(format!("Output: {}", detail));
    lines
}

pub fn print_queue(session: &Session) {
    for line in format_queue(session) {
        println!("{}", line);
    }
}

pub fn queue_json(session: &Session) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&queue_entries(session))
}
