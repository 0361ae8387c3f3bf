//! Regex fragments and timestamp parsing shared by the normalizer and the
//! recognizer.

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;

use logsift_types::Timestamp;

/// ISO-8601-ish date and time, `T` or space separated, optional fraction
/// (dot or comma) and zone
pub(crate) const TIMESTAMP: &str =
    r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?";

/// BSD syslog `Mmm dd hh:mm:ss` (no year)
pub(crate) const SYSLOG_TIMESTAMP: &str =
    r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)\s+\d{1,2}\s+\d{2}:\d{2}:\d{2}";

/// Matches nothing; stands in for an empty vocabulary
const NEVER: &str = r"[^\s\S]";

/// Case-insensitive alternation of severity tokens, longest first so that
/// `WARNING` is preferred over `WARN`
pub(crate) fn level_alternation(tokens: &[String]) -> String {
    alternation(tokens, |t| t.to_string(), "(?i:", ")")
}

/// Case-sensitive alternation of the upper-cased tokens
pub(crate) fn upper_level_alternation(tokens: &[String]) -> String {
    alternation(tokens, |t| t.to_uppercase(), "(?-i:", ")")
}

fn alternation(tokens: &[String], map: impl Fn(&str) -> String, open: &str, close: &str) -> String {
    let mut escaped: Vec<String> = tokens.iter().map(|t| regex::escape(&map(t))).collect();
    if escaped.is_empty() {
        return NEVER.to_string();
    }
    // stable sort keeps configured order among equal lengths
    escaped.sort_by(|a, b| b.len().cmp(&a.len()));
    escaped.dedup();
    format!("{open}{}{close}", escaped.join("|"))
}

/// Regex matching the start of a new log record: a timestamp, a severity
/// token (optionally bracketed), a syslog date, or a JSON object
pub(crate) fn header_regex(tokens: &[String]) -> Result<Regex, regex::Error> {
    let levels = level_alternation(tokens);
    Regex::new(&format!(
        r"^(?:\[\s*)?(?:{TIMESTAMP}|{levels}\b|{SYSLOG_TIMESTAMP}|\{{)"
    ))
}

/// Parse a timestamp matched by [`TIMESTAMP`]. Naive values are taken as UTC.
pub(crate) fn parse_timestamp(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    let mut normalized = text.replacen(',', ".", 1);
    if normalized.as_bytes().get(10) == Some(&b' ') {
        normalized.replace_range(10..11, "T");
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Epoch seconds or milliseconds, as written by JSON loggers
pub(crate) fn timestamp_from_epoch(value: f64) -> Option<Timestamp> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    // anything past the year 5138 in seconds is assumed to be milliseconds
    if value >= 1e11 {
        DateTime::from_timestamp_millis(value as i64)
    } else {
        let secs = value.trunc() as i64;
        let nanos = ((value - value.trunc()) * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}
