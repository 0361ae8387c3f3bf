use std::fmt::Write;

use logsift_types::{SortPolicy, Summary};

use crate::export::project;

/// Longest example text carried into a digest line
const EXAMPLE_CHARS: usize = 120;

/// Compact plain-text rendering of a summary for prompts and terminals
///
/// ```text
/// 12 records, 3 error types
/// ERROR/Timeout - Count: 7 - first at line 4: upstream timed out after 30s
/// WARNING - Count: 5 - first at line 1: cache miss ratio high
/// peak: 2025-01-19 10:00 UTC with 6 errors
/// ```
pub fn digest(summary: &Summary) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "{} records, {} error types",
        summary.total_records(),
        summary.len()
    );
    if summary.filtered_out() > 0 {
        let _ = write!(out, " ({} filtered out)", summary.filtered_out());
    }
    out.push('\n');

    for row in project(summary, SortPolicy::CountDesc) {
        let label = match &row.sub_tag {
            Some(tag) => format!("{}/{}", row.error_type, tag),
            None => row.error_type.to_string(),
        };
        let example = row.example_message.lines().next().unwrap_or_default();
        let _ = writeln!(
            out,
            "{label} - Count: {} - first at line {}: {}",
            row.count,
            row.first_occurrence,
            shorten(example)
        );
    }

    let timeline = summary.timeline();
    if let Some(hour) = timeline.peak_hour {
        let _ = writeln!(
            out,
            "peak: {} with {} errors",
            hour.format("%Y-%m-%d %H:%M UTC"),
            timeline.peak_errors
        );
    }
    out
}

fn shorten(text: &str) -> String {
    match text.char_indices().nth(EXAMPLE_CHARS) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
