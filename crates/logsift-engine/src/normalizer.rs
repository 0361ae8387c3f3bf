//! Splitting input into logical records.
//!
//! Decodes the input, cleans each physical line, and folds continuation
//! lines (stack frames, indented detail, `Caused by:` chains) into the record
//! they belong to, so a stack trace counts once.

use regex::Regex;
use serde::{Deserialize, Serialize};

use logsift_types::{LineRange, RawRecord};

use crate::ansi::strip_ansi;
use crate::decode::{Encoding, decode};
use crate::error::{EncodingError, RuleError};
use crate::patterns::header_regex;
use crate::rules::RuleSet;

/// Default cap on continuation lines folded into one record
pub const DEFAULT_MAX_CONTINUATION_LINES: usize = 200;

/// Unindented line starts that still continue the previous record
const CONTINUATION_MARKERS: &[&str] = &[
    "Caused by:",
    "caused by:",
    "Suppressed:",
    "Traceback ",
    "During handling of the above exception",
    "The above exception was the direct cause",
    "at ",
    "...",
    "\u{2514}", // └
    "\u{21b3}", // ↳
    "\u{2502}", // │
    "\u{251c}", // ├
];

/// Unindented exception header (`java.lang.IllegalStateException: closed`,
/// `ValueError: bad value`) that belongs to the trace above it
const EXCEPTION_HEADER: &str = r"^(?:[\w$]+\.)*[\w$]+(?:Error|Exception|Throwable)\b(?::|$)";

/// When a line joins the previous record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContinuationPolicy {
    /// Indented lines and stack-trace markers continue a record
    #[default]
    Indented,
    /// Every line without a recognized header continues a record
    Strict,
}

/// Turns decoded text into [`RawRecord`]s
#[derive(Clone, Debug)]
pub struct Normalizer {
    policy: ContinuationPolicy,
    max_continuation_lines: usize,

    /// Start of a new record (timestamp, level token, syslog date, JSON)
    header: Regex,

    exception_header: Regex,
}

impl Normalizer {
    pub fn new(rules: &RuleSet, policy: ContinuationPolicy) -> Result<Self, RuleError> {
        let header = header_regex(rules.tokens()).map_err(|source| RuleError::InvalidPattern {
            kind: "header",
            pattern: "<record header>".to_string(),
            source,
        })?;
        let exception_header =
            Regex::new(EXCEPTION_HEADER).map_err(|source| RuleError::InvalidPattern {
                kind: "exception header",
                pattern: EXCEPTION_HEADER.to_string(),
                source,
            })?;
        Ok(Self {
            policy,
            max_continuation_lines: DEFAULT_MAX_CONTINUATION_LINES,
            header,
            exception_header,
        })
    }

    /// Limit the number of continuation lines per record (at least 1)
    pub fn with_max_continuation_lines(mut self, max: usize) -> Self {
        self.max_continuation_lines = max.max(1);
        self
    }

    /// Decode `bytes` and split them into records
    pub fn normalize(
        &self,
        bytes: &[u8],
        declared: Option<Encoding>,
    ) -> Result<Vec<RawRecord>, EncodingError> {
        let text = decode(bytes, declared)?;
        Ok(self.split_records(&text))
    }

    /// Split already-decoded text into records
    pub fn split_records(&self, text: &str) -> Vec<RawRecord> {
        let mut records: Vec<RawRecord> = Vec::new();
        let mut current: Option<(String, LineRange)> = None;

        for (idx, physical) in text.lines().enumerate() {
            let line_no = idx + 1;
            let cleaned = strip_ansi(physical);
            let line = cleaned.trim_end();
            if line.trim_start().is_empty() {
                continue;
            }

            if let Some((text, range)) = current.as_mut()
                && range.line_count() <= self.max_continuation_lines
                && self.is_continuation(line)
            {
                text.push('\n');
                text.push_str(line);
                range.end = line_no;
                continue;
            }

            if let Some((text, range)) = current.take() {
                records.push(RawRecord::new(text, range));
            }
            current = Some((line.to_string(), LineRange::single(line_no)));
        }

        if let Some((text, range)) = current {
            records.push(RawRecord::new(text, range));
        }

        tracing::debug!(
            records = records.len(),
            policy = ?self.policy,
            "normalized input into records"
        );
        records
    }

    /// Whether `line` belongs to the record before it
    fn is_continuation(&self, line: &str) -> bool {
        if self.header.is_match(line) {
            return false;
        }
        match self.policy {
            ContinuationPolicy::Strict => true,
            ContinuationPolicy::Indented => {
                line.starts_with(char::is_whitespace)
                    || line.starts_with(['}', ']'])
                    || CONTINUATION_MARKERS.iter().any(|m| line.starts_with(m))
                    || self.exception_header.is_match(line)
            }
        }
    }
}
