//! Rendering analysis results

use std::fmt::Write;

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use logsift_engine::{Chunk, ExportRow, Summary, Timeline};

/// Widest example column in the text table
const EXAMPLE_WIDTH: usize = 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Aligned table
    #[default]
    Text,
    /// One JSON document for all files
    Json,
    /// One summary row per file and error key
    Csv,
}

/// Everything produced for one input file
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub file: String,
    pub total_records: usize,
    pub filtered_out: usize,
    pub rows: Vec<ExportRow>,
    pub timeline: Timeline,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<Chunk>>,
}

impl FileReport {
    pub fn new(file: String, summary: &Summary, rows: Vec<ExportRow>) -> Self {
        Self {
            file,
            total_records: summary.total_records(),
            filtered_out: summary.filtered_out(),
            rows,
            timeline: summary.timeline().clone(),
            digest: None,
            chunks: None,
        }
    }
}

pub fn render(reports: &[FileReport], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(reports.iter().map(render_text).collect::<Vec<_>>().join("\n")),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(reports)?),
        OutputFormat::Csv => render_csv(reports),
    }
}

const CSV_HEADER: [&str; 6] = [
    "file",
    "error_type",
    "sub_tag",
    "count",
    "first_occurrence",
    "example_message",
];

/// Export rows of every report as CSV, files in input order
pub fn render_csv(reports: &[FileReport]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for report in reports {
        for row in &report.rows {
            writer.write_record([
                report.file.as_str(),
                row.error_type.as_str(),
                row.sub_tag.as_deref().unwrap_or(""),
                &row.count.to_string(),
                &row.first_occurrence.to_string(),
                &row.example_message,
            ])?;
        }
    }
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    let mut text = String::from_utf8(bytes).context("CSV output is not UTF-8")?;
    // println! adds the final newline
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Render one report as an aligned table followed by optional sections
pub fn render_text(report: &FileReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({} records, {} filtered out)",
        report.file, report.total_records, report.filtered_out
    );

    let header = ["TYPE", "SUB-TAG", "COUNT", "FIRST LINE", "EXAMPLE"];
    let cells: Vec<[String; 5]> = report
        .rows
        .iter()
        .map(|row| {
            [
                row.error_type.to_string(),
                row.sub_tag.clone().unwrap_or_else(|| "-".to_string()),
                row.count.to_string(),
                row.first_occurrence.to_string(),
                fit_width(
                    row.example_message.lines().next().unwrap_or_default(),
                    EXAMPLE_WIDTH,
                ),
            ]
        })
        .collect();

    let mut widths = header.map(UnicodeWidthStr::width);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    push_row(&mut out, &header.map(str::to_string), &widths);
    for row in &cells {
        push_row(&mut out, row, &widths);
    }

    if let Some(hour) = report.timeline.peak_hour {
        let _ = writeln!(
            out,
            "\nPeak error hour: {} ({} of {} timestamped errors)",
            hour.format("%Y-%m-%d %H:00 UTC"),
            report.timeline.peak_errors,
            report.timeline.total_errors
        );
    }

    if let Some(digest) = &report.digest {
        let _ = write!(out, "\n{digest}");
    }

    if let Some(chunks) = &report.chunks {
        for chunk in chunks {
            let _ = writeln!(
                out,
                "\n--- chunk {} (lines {}, {} records, {} errors) ---\n{}",
                chunk.id, chunk.line_range, chunk.record_count, chunk.error_count, chunk.text
            );
        }
    }
    out
}

/// Left-align cells, right-align the count column
fn push_row(out: &mut String, cells: &[String; 5], widths: &[usize; 5]) {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let pad = " ".repeat(width.saturating_sub(cell.width()));
        if idx > 0 {
            line.push_str("  ");
        }
        if idx == 2 {
            line.push_str(&pad);
            line.push_str(cell);
        } else {
            line.push_str(cell);
            line.push_str(&pad);
        }
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

/// Cut `text` to at most `max` display columns, marking the cut with `…`
fn fit_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use logsift_engine::{SortPolicy, analyze, project};

    fn report(input: &str) -> FileReport {
        let summary = analyze(input.as_bytes()).unwrap();
        let rows = project(&summary, SortPolicy::CountDesc);
        FileReport::new("app.log".to_string(), &summary, rows)
    }

    #[test]
    fn test_text_table_alignment() {
        let text = render_text(&report(
            "ERROR: upstream timed out\nERROR: upstream timed out\nWARN: slow\n",
        ));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "app.log (3 records, 0 filtered out)");
        assert_eq!(lines[1], "TYPE     SUB-TAG  COUNT  FIRST LINE  EXAMPLE");
        assert_eq!(lines[2], "ERROR    Timeout      2  1           upstream timed out");
        assert_eq!(lines[3], "WARNING  -            1  3           slow");
    }

    #[test]
    fn test_json_output() {
        let json = render(&[report("FATAL: boom\n")], OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["file"], "app.log");
        assert_eq!(value[0]["rows"][0]["error_type"], "FATAL");
        assert_eq!(value[0]["rows"][0]["count"], 1);
        assert!(value[0].get("chunks").is_none());
    }

    #[test]
    fn test_csv_output() {
        let input = "ERROR: upload \"a.txt\" failed, retrying\n\
                     ERROR: upload \"a.txt\" failed, retrying\n\
                     ERROR: disk full\n\
                     WARN: slow\n";
        let csv = render(&[report(input)], OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines,
            vec![
                "file,error_type,sub_tag,count,first_occurrence,example_message",
                r#"app.log,ERROR,,2,1,"upload ""a.txt"" failed, retrying""#,
                "app.log,ERROR,DiskFull,1,3,disk full",
                "app.log,WARNING,,1,4,slow",
            ]
        );
    }

    #[test]
    fn test_csv_header_without_rows() {
        let csv = render(&[], OutputFormat::Csv).unwrap();
        assert_eq!(csv, "file,error_type,sub_tag,count,first_occurrence,example_message");
    }

    #[test]
    fn test_fit_width() {
        assert_eq!(fit_width("short", 10), "short");
        assert_eq!(fit_width("abcdefghij", 5), "abcd…");
        assert_eq!(fit_width("日本語のログ", 5), "日本…");
    }
}
