//! Shared types for logsift
//!
//! This crate contains the data model passed between the engine stages and
//! handed to collaborators (exporters, summarizers, the CLI).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Instant attached to a record. Naive log timestamps are read as UTC.
pub type Timestamp = DateTime<Utc>;

// ============================================================================
// Record Types
// ============================================================================

/// Inclusive, 1-based range of physical lines
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Range covering a single line
    pub fn single(line: usize) -> Self {
        Self::new(line, line)
    }

    /// Number of physical lines covered
    pub fn line_count(&self) -> usize {
        self.end + 1 - self.start
    }

    /// Smallest range covering both `self` and `other`
    pub fn union(&self, other: LineRange) -> Self {
        Self::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// One logical log entry: a physical line plus any continuation lines
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RawRecord {
    /// Normalized text, continuation lines joined with `\n`
    pub raw_text: String,

    /// Physical lines this record was built from
    pub line_range: LineRange,
}

impl RawRecord {
    pub fn new(raw_text: String, line_range: LineRange) -> Self {
        Self {
            raw_text,
            line_range,
        }
    }

    /// The header line (everything before the first continuation)
    pub fn first_line(&self) -> &str {
        self.raw_text.lines().next().unwrap_or_default()
    }

    /// Continuation lines, if any
    pub fn continuation(&self) -> Option<&str> {
        self.raw_text.split_once('\n').map(|(_, rest)| rest)
    }
}

/// Which recognizer pattern produced a structured record
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// A JSON object per line
    Json,
    /// `LEVEL [component] timestamp: message`
    LevelComponentTimestamp,
    /// `[timestamp] LEVEL code: message`
    BracketTimestampLevel,
    /// `timestamp - component - LEVEL - message`
    TimestampComponentLevel,
    /// `timestamp LEVEL [component] message`
    TimestampLevelComponent,
    /// `timestamp [LEVEL] message`
    TimestampBracketLevel,
    /// `[LEVEL] message`
    BracketLevel,
    /// `LEVEL: message`
    LevelColon,
    /// `LEVEL message` with an upper-case level and no separator
    LevelPrefix,
    /// `Mon dd hh:mm:ss host app[pid]: message`
    Syslog,
    /// `timestamp message`
    TimestampOnly,
    /// Nothing recognized, whole text is the message
    Plain,
}

impl RecordFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::LevelComponentTimestamp => "level_component_timestamp",
            Self::BracketTimestampLevel => "bracket_timestamp_level",
            Self::TimestampComponentLevel => "timestamp_component_level",
            Self::TimestampLevelComponent => "timestamp_level_component",
            Self::TimestampBracketLevel => "timestamp_bracket_level",
            Self::BracketLevel => "bracket_level",
            Self::LevelColon => "level_colon",
            Self::LevelPrefix => "level_prefix",
            Self::Syslog => "syslog",
            Self::TimestampOnly => "timestamp_only",
            Self::Plain => "plain",
        }
    }
}

/// A record with the fields the recognizer could extract
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructuredRecord {
    /// Parsed timestamp (if available)
    pub timestamp: Option<Timestamp>,

    /// Level marker exactly as written in the line
    pub severity_token: Option<String>,

    /// Logger, module or program name
    pub component: Option<String>,

    /// Numeric status/error code written next to the level (`ERROR 404: ...`)
    pub code: Option<String>,

    /// Message text, continuation lines included
    pub message: String,

    /// Pattern that matched
    pub format: RecordFormat,

    /// Record this was recognized from
    pub source: RawRecord,
}

impl StructuredRecord {
    /// A record nothing could be extracted from
    pub fn plain(source: RawRecord) -> Self {
        Self {
            timestamp: None,
            severity_token: None,
            component: None,
            code: None,
            message: source.raw_text.clone(),
            format: RecordFormat::Plain,
            source,
        }
    }
}

// ============================================================================
// Classification Types
// ============================================================================

/// Canonical error type / severity tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorType {
    #[serde(alias = "fatal")]
    Fatal,
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "warning", alias = "warn", alias = "WARN")]
    Warning,
    #[serde(alias = "info")]
    Info,
    #[serde(alias = "debug")]
    Debug,
    #[serde(alias = "trace")]
    Trace,
    #[serde(alias = "unknown")]
    Unknown,
}

impl ErrorType {
    /// Every type, most severe first
    pub const ALL: [ErrorType; 7] = [
        Self::Fatal,
        Self::Error,
        Self::Warning,
        Self::Info,
        Self::Debug,
        Self::Trace,
        Self::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Severity ordinal, higher is more severe. Unknown sorts last.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Fatal => 6,
            Self::Error => 5,
            Self::Warning => 4,
            Self::Info => 3,
            Self::Debug => 2,
            Self::Trace => 1,
            Self::Unknown => 0,
        }
    }

    /// ERROR or FATAL
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Fatal | Self::Error)
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a name is not a canonical error type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownErrorType(pub String);

impl fmt::Display for UnknownErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown error type '{}' (expected fatal, error, warning, info, debug, trace or unknown)",
            self.0
        )
    }
}

impl std::error::Error for UnknownErrorType {}

impl FromStr for ErrorType {
    type Err = UnknownErrorType;

    /// Parse a canonical type name (not a log token, see the engine's rule tables)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fatal" => Ok(Self::Fatal),
            "error" => Ok(Self::Error),
            "warning" | "warn" => Ok(Self::Warning),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            "unknown" => Ok(Self::Unknown),
            _ => Err(UnknownErrorType(s.to_string())),
        }
    }
}

/// How a classification was reached
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    /// The line carried a recognized severity token
    Explicit,
    /// A keyword rule matched the message
    Heuristic,
    /// Nothing matched
    Fallback,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "EXPLICIT",
            Self::Heuristic => "HEURISTIC",
            Self::Fallback => "FALLBACK",
        }
    }
}

/// A structured record with its classification
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassifiedRecord {
    pub record: StructuredRecord,
    pub error_type: ErrorType,

    /// Free-text refinement such as `NullPointerException` or `Timeout`
    pub sub_tag: Option<String>,

    pub confidence: Confidence,
}

impl ClassifiedRecord {
    pub fn message(&self) -> &str {
        &self.record.message
    }

    pub fn line_range(&self) -> LineRange {
        self.record.source.line_range
    }

    pub fn raw_text(&self) -> &str {
        &self.record.source.raw_text
    }

    /// Aggregation key for this record
    pub fn key(&self) -> ErrorKey {
        ErrorKey::new(self.error_type, self.sub_tag.clone())
    }
}

// ============================================================================
// Summary Types
// ============================================================================

/// Aggregation key: error type plus optional sub-tag
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorKey {
    pub error_type: ErrorType,
    pub sub_tag: Option<String>,
}

impl ErrorKey {
    pub fn new(error_type: ErrorType, sub_tag: Option<String>) -> Self {
        Self {
            error_type,
            sub_tag,
        }
    }
}

impl fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_tag {
            Some(tag) => write!(f, "{}/{}", self.error_type, tag),
            None => write!(f, "{}", self.error_type),
        }
    }
}

/// Number of records per classification provenance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConfidenceCounts {
    pub explicit: usize,
    pub heuristic: usize,
    pub fallback: usize,
}

impl ConfidenceCounts {
    pub fn record(&mut self, confidence: Confidence) {
        match confidence {
            Confidence::Explicit => self.explicit += 1,
            Confidence::Heuristic => self.heuristic += 1,
            Confidence::Fallback => self.fallback += 1,
        }
    }
}

/// Aggregated data for one error key
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub key: ErrorKey,

    /// Always at least 1
    pub count: usize,

    /// Lines of the first record with this key
    pub first_occurrence: LineRange,

    /// First messages seen, bounded by the aggregator's sample limit
    pub sample_messages: Vec<String>,

    pub confidence: ConfidenceCounts,

    /// Earliest and latest timestamps among records with this key
    pub first_seen: Option<Timestamp>,
    pub last_seen: Option<Timestamp>,
}

impl SummaryEntry {
    pub fn new(key: ErrorKey, first_occurrence: LineRange) -> Self {
        Self {
            key,
            count: 0,
            first_occurrence,
            sample_messages: Vec::new(),
            confidence: ConfidenceCounts::default(),
            first_seen: None,
            last_seen: None,
        }
    }

    /// Widen the seen window to include `ts`
    pub fn observe_timestamp(&mut self, ts: Timestamp) {
        self.first_seen = Some(self.first_seen.map_or(ts, |seen| seen.min(ts)));
        self.last_seen = Some(self.last_seen.map_or(ts, |seen| seen.max(ts)));
    }
}

/// Hourly concentration of ERROR and FATAL records
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Timeline {
    /// Timestamped error records
    pub total_errors: usize,

    /// Hour (truncated timestamp) to error count, chronological
    pub buckets: BTreeMap<Timestamp, usize>,

    /// Busiest hour, earliest one on ties
    pub peak_hour: Option<Timestamp>,
    pub peak_errors: usize,
}

impl Timeline {
    /// Count one error in the bucket `hour`
    pub fn record(&mut self, hour: Timestamp) {
        self.total_errors += 1;
        let count = self.buckets.entry(hour).or_insert(0);
        *count += 1;
        let count = *count;

        let better = count > self.peak_errors
            || (count == self.peak_errors && self.peak_hour.is_some_and(|peak| hour < peak));
        if better {
            self.peak_hour = Some(hour);
            self.peak_errors = count;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Result of one analysis call
///
/// Entries keep first-occurrence order. The sum of all counts equals the
/// number of records that survived filtering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    entries: Vec<SummaryEntry>,

    #[serde(skip)]
    index: HashMap<ErrorKey, usize>,

    /// Records seen by the aggregator plus those removed by the filter
    total_records: usize,

    /// Records removed by the record filter before aggregation
    filtered_out: usize,

    timeline: Timeline,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in first-occurrence order
    pub fn entries(&self) -> &[SummaryEntry] {
        &self.entries
    }

    pub fn get(&self, key: &ErrorKey) -> Option<&SummaryEntry> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    /// Get the entry for `key`, inserting `init()` on first occurrence
    pub fn entry_or_insert_with<F>(&mut self, key: &ErrorKey, init: F) -> &mut SummaryEntry
    where
        F: FnOnce() -> SummaryEntry,
    {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                let idx = self.entries.len();
                self.entries.push(init());
                self.index.insert(key.clone(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of counts over all keys
    pub fn total_count(&self) -> usize {
        self.entries.iter().map(|e| e.count).sum()
    }

    /// Sum of counts for one error type across its sub-tags
    pub fn count_of(&self, error_type: ErrorType) -> usize {
        self.entries
            .iter()
            .filter(|e| e.key.error_type == error_type)
            .map(|e| e.count)
            .sum()
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn filtered_out(&self) -> usize {
        self.filtered_out
    }

    pub fn set_record_totals(&mut self, total_records: usize, filtered_out: usize) {
        self.total_records = total_records;
        self.filtered_out = filtered_out;
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }
}

// ============================================================================
// Export Types
// ============================================================================

/// Row ordering for the export projection
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortPolicy {
    /// Most frequent first, ties by first occurrence
    #[default]
    CountDesc,
    /// Order of first occurrence in the input
    FirstOccurrence,
    /// Most severe type first, then by count
    Severity,
}

impl FromStr for SortPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "count" | "count-desc" => Ok(Self::CountDesc),
            "first" | "first-occurrence" => Ok(Self::FirstOccurrence),
            "severity" => Ok(Self::Severity),
            other => Err(format!("unknown sort policy '{other}'")),
        }
    }
}

/// One row of the tabular error summary
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    pub error_type: ErrorType,
    pub sub_tag: Option<String>,
    pub count: usize,
    pub first_occurrence: LineRange,
    pub example_message: String,
}

// ============================================================================
// Summarizer Input Types
// ============================================================================

/// A size-bounded run of whole records for a downstream summarizer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// Zero-based position in the chunk sequence
    pub id: usize,

    pub text: String,

    /// Length of `text` in characters
    pub length: usize,

    pub line_range: LineRange,
    pub record_count: usize,

    /// ERROR and FATAL records in this chunk
    pub error_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_line_range_display() {
        assert_eq!(LineRange::single(4).to_string(), "4");
        assert_eq!(LineRange::new(4, 9).to_string(), "4-9");
        assert_eq!(LineRange::new(4, 9).line_count(), 6);
    }

    #[test]
    fn test_error_type_from_str() {
        assert_eq!("Warn".parse::<ErrorType>(), Ok(ErrorType::Warning));
        assert_eq!(" fatal ".parse::<ErrorType>(), Ok(ErrorType::Fatal));
        assert!("severe".parse::<ErrorType>().is_err());
    }

    #[test]
    fn test_summary_keeps_insertion_order() {
        let mut summary = Summary::new();
        let warn = ErrorKey::new(ErrorType::Warning, None);
        let err = ErrorKey::new(ErrorType::Error, Some("Timeout".to_string()));

        for key in [&warn, &err, &warn] {
            let entry = summary.entry_or_insert_with(key, || {
                SummaryEntry::new(key.clone(), LineRange::single(1))
            });
            entry.count += 1;
        }

        let keys: Vec<_> = summary.entries().iter().map(|e| e.key.to_string()).collect();
        assert_eq!(keys, vec!["WARNING", "ERROR/Timeout"]);
        assert_eq!(summary.get(&warn).map(|e| e.count), Some(2));
        assert_eq!(summary.total_count(), 3);
    }

    #[test]
    fn test_timeline_peak_prefers_earliest_hour() {
        let h1 = Utc.with_ymd_and_hms(2025, 1, 19, 10, 0, 0).unwrap();
        let h2 = Utc.with_ymd_and_hms(2025, 1, 19, 11, 0, 0).unwrap();

        let mut timeline = Timeline::default();
        timeline.record(h2);
        timeline.record(h1);
        assert_eq!(timeline.peak_hour, Some(h1));
        assert_eq!(timeline.peak_errors, 1);

        timeline.record(h2);
        assert_eq!(timeline.peak_hour, Some(h2));
        assert_eq!(timeline.peak_errors, 2);
        assert_eq!(timeline.total_errors, 3);
    }

    #[test]
    fn test_raw_record_continuation() {
        let raw = RawRecord::new("ERROR: boom\n    at foo()".to_string(), LineRange::new(1, 2));
        assert_eq!(raw.first_line(), "ERROR: boom");
        assert_eq!(raw.continuation(), Some("    at foo()"));
    }
}
