//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Convert
//!
//! ```text
//! photo.png → photo.jpg
//!     640x480 → 320x240, 18.2 KB
//! ```
//!
//! ## Batch
//!
//! ```text
//! Converting 3 images
//!     001 cover.png → out/cover.jpg (1200x800, 210.4 KB)
//!     003 2024/dunes.webp FAILED: failed to load image: ...
//!     002 2024/beach.tif → out/2024/beach.jpg (800x600, 95.0 KB)
//!
//! Converted 2 images (305.4 KB), 1 failed
//!     FAILED 2024/dunes.webp: failed to load image: ...
//! ```
//!
//! Progress lines arrive in completion order; the index is the image's
//! position in the sorted input listing.
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::process::{BatchReport, ConversionReport, ProcessEvent};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
///
/// ```text
/// 512 B
/// 18.2 KB
/// 3.4 MB
/// ```
fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

// ============================================================================
// Single file
// ============================================================================

/// Format the result of `imgconv convert`.
pub fn format_conversion(report: &ConversionReport) -> Vec<String> {
    vec![
        format!("{} → {}", report.source, report.output),
        format!(
            "{}{} → {}, {}",
            indent(1),
            report.original,
            report.result,
            format_bytes(report.bytes)
        ),
    ]
}

pub fn print_conversion(report: &ConversionReport) {
    for line in format_conversion(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Batch
// ============================================================================

/// Format a single batch progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::Started { image_count } => {
            vec![format!("Converting {}", plural(*image_count, "image"))]
        }
        ProcessEvent::Converted { index, report } => vec![format!(
            "{}{} {} → {} ({}, {})",
            indent(1),
            format_index(*index),
            report.source,
            report.output,
            report.result,
            format_bytes(report.bytes)
        )],
        ProcessEvent::Failed { index, failure } => vec![format!(
            "{}{} {} FAILED: {}",
            indent(1),
            format_index(*index),
            failure.source,
            failure.error
        )],
    }
}

/// Format the closing summary of a batch, listing every failure.
pub fn format_batch_summary(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![String::new()];
    let converted = format!(
        "Converted {} ({})",
        plural(report.converted.len(), "image"),
        format_bytes(report.total_bytes())
    );
    if report.failed.is_empty() {
        lines.push(converted);
    } else {
        lines.push(format!("{}, {} failed", converted, report.failed.len()));
        for failure in &report.failed {
            lines.push(format!(
                "{}FAILED {}: {}",
                indent(1),
                failure.source,
                failure.error
            ));
        }
    }
    lines
}

pub fn print_batch_summary(report: &BatchReport) {
    for line in format_batch_summary(report) {
        println!("{}", line);
    }
}
