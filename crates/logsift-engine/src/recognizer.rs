use regex::{Captures, Regex};
use serde_json::{Map, Value};

use logsift_types::{RawRecord, RecordFormat, StructuredRecord, Timestamp};

use crate::error::RuleError;
use crate::patterns::{
    SYSLOG_TIMESTAMP, TIMESTAMP, level_alternation, parse_timestamp, timestamp_from_epoch,
    upper_level_alternation,
};
use crate::rules::RuleSet;

/// Common field names for the log level
const JSON_LEVEL_FIELDS: &[&str] = &[
    "level",
    "lvl",
    "severity",
    "log.level",
    "loglevel",
    "log_level",
    "Level",
    "LEVEL",
];

const JSON_MESSAGE_FIELDS: &[&str] = &["message", "msg", "log", "text", "body"];

const JSON_COMPONENT_FIELDS: &[&str] = &[
    "logger",
    "logger_name",
    "component",
    "module",
    "name",
    "target",
    "service",
];

const JSON_TIMESTAMP_FIELDS: &[&str] = &["timestamp", "time", "ts", "@timestamp", "datetime"];

/// Fields carrying error details worth appending to the message
const JSON_ERROR_FIELDS: &[&str] = &["error", "err", "exception", "exc_info", "stack", "stacktrace"];

/// One entry of the ordered pattern list
#[derive(Clone, Debug)]
struct FormatPattern {
    format: RecordFormat,
    regex: Regex,
}

/// Fields pulled out of a record before it is assembled
#[derive(Default)]
struct Fields {
    timestamp: Option<Timestamp>,
    severity_token: Option<String>,
    component: Option<String>,
    code: Option<String>,
    message: String,
}

impl Fields {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let text = |name: &str| {
            caps.name(name)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            timestamp: caps.name("ts").and_then(|m| parse_timestamp(m.as_str())),
            severity_token: text("level"),
            component: text("component"),
            code: text("code"),
            message: text("msg").unwrap_or_default(),
        }
    }
}

/// Extracts structure from raw records
///
/// Patterns are tried in a fixed order, most specific first; the first one
/// that matches the record's header line wins. Records no pattern matches
/// keep their whole text as the message.
#[derive(Clone, Debug)]
pub struct FormatRecognizer {
    patterns: Vec<FormatPattern>,

    /// `LEVEL: message` inside a syslog or timestamp-only message
    inner_level: Regex,

    /// `LEVEL message` with an upper-case token and no separator
    inner_upper_level: Regex,
}

impl FormatRecognizer {
    /// Build the pattern list around the severity vocabulary of `rules`
    pub fn new(rules: &RuleSet) -> Result<Self, RuleError> {
        let l = level_alternation(rules.tokens());
        let u = upper_level_alternation(rules.tokens());
        let ts = TIMESTAMP;
        let sys = SYSLOG_TIMESTAMP;
        let comp = r"(?:\s*\[(?P<component>[^\]]+)\])?";
        let code = r"(?:\s+(?P<code>\d{3,5})\b)?";
        let sep = r"(?:\s*:|\s+-\s|\s*\|)";

        // after a timestamp, a level in any case needs a separator or a
        // `[component]`; a bare level must be upper-case
        let marked = format!(
            r"{code}(?:\s*\[(?P<component>[^\]]+)\]\s*[:\-]?|{sep})\s*(?P<msg>.*)$"
        );
        let bare = format!(r"{code}{comp}\s*[:\-]?\s*(?P<msg>.*)$");

        let specs = [
            (
                RecordFormat::LevelComponentTimestamp,
                format!(
                    r"^(?P<level>{l})\b\s*\[(?P<component>[^\]]+)\]\s+\[?(?P<ts>{ts})\]?\s*[:\-]?\s*(?P<msg>.*)$"
                ),
            ),
            (
                RecordFormat::BracketTimestampLevel,
                format!(r"^\[(?P<ts>{ts})\]\s*\[(?P<level>{l})\]{code}{comp}\s*[:\-]?\s*(?P<msg>.*)$"),
            ),
            (
                RecordFormat::BracketTimestampLevel,
                format!(r"^\[(?P<ts>{ts})\]\s*(?P<level>{l})\b{marked}"),
            ),
            (
                RecordFormat::BracketTimestampLevel,
                format!(r"^\[(?P<ts>{ts})\]\s*(?P<level>{u})\b{bare}"),
            ),
            (
                RecordFormat::TimestampComponentLevel,
                format!(
                    r"^(?P<ts>{ts})\s+-\s+(?P<component>\S+)\s+-\s+(?P<level>{l})\b\s+-\s+(?P<msg>.*)$"
                ),
            ),
            (
                RecordFormat::TimestampLevelComponent,
                format!(r"^(?P<ts>{ts})\s+(?P<level>{l})\b{marked}"),
            ),
            (
                RecordFormat::TimestampLevelComponent,
                format!(r"^(?P<ts>{ts})\s+(?P<level>{u})\b{bare}"),
            ),
            (
                RecordFormat::TimestampBracketLevel,
                format!(r"^(?P<ts>{ts})\s+\[(?P<level>{l})\]{comp}\s*[:\-]?\s*(?P<msg>.*)$"),
            ),
            (
                RecordFormat::BracketLevel,
                format!(r"^\[(?P<level>{l})\]{comp}\s*[:\-]?\s*(?P<msg>.*)$"),
            ),
            (
                RecordFormat::LevelColon,
                format!(r"^(?P<level>{l})\b{code}{comp}{sep}\s*(?P<msg>.*)$"),
            ),
            (
                RecordFormat::LevelPrefix,
                format!(r"^(?P<level>{u})\b{code}{comp}\s+(?P<msg>.*)$"),
            ),
            (
                RecordFormat::Syslog,
                format!(
                    r"^{sys}\s+\S+\s+(?P<component>[^\s\[:]+)(?:\[\d+\])?:\s*(?P<msg>.*)$"
                ),
            ),
            (
                RecordFormat::TimestampOnly,
                format!(r"^\[?(?P<ts>{ts})\]?\s+(?P<msg>.*)$"),
            ),
        ];

        let patterns = specs
            .into_iter()
            .map(|(format, pattern)| {
                Ok(FormatPattern {
                    format,
                    regex: compile(format, &pattern)?,
                })
            })
            .collect::<Result<Vec<_>, RuleError>>()?;

        let inner_level = compile(
            RecordFormat::LevelColon,
            &format!(r"^\[?(?P<level>{l})\b\]?{sep}\s*(?P<msg>.*)$"),
        )?;
        let inner_upper_level = compile(
            RecordFormat::LevelPrefix,
            &format!(r"^\[?(?P<level>{u})\b\]?\s+(?P<msg>.*)$"),
        )?;

        Ok(Self {
            patterns,
            inner_level,
            inner_upper_level,
        })
    }

    /// Extract structure from one record. Never fails.
    pub fn recognize(&self, raw: RawRecord) -> StructuredRecord {
        if let Some((fields, whole)) = Self::try_parse_json(&raw) {
            return Self::assemble(fields, RecordFormat::Json, raw, !whole);
        }

        let header = raw.first_line();
        for pattern in &self.patterns {
            let Some(caps) = pattern.regex.captures(header) else {
                continue;
            };
            let mut fields = Fields::from_captures(&caps);
            if matches!(pattern.format, RecordFormat::Syslog | RecordFormat::TimestampOnly) {
                self.split_inner_level(&mut fields);
            }
            return Self::assemble(fields, pattern.format, raw, true);
        }

        StructuredRecord::plain(raw)
    }

    /// Pull a leading level token out of an already-extracted message
    fn split_inner_level(&self, fields: &mut Fields) {
        let caps = self
            .inner_level
            .captures(&fields.message)
            .or_else(|| self.inner_upper_level.captures(&fields.message));
        let Some(caps) = caps else {
            return;
        };
        let level = caps.name("level").map(|m| m.as_str().to_string());
        let msg = caps
            .name("msg")
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        fields.severity_token = level;
        fields.message = msg;
    }

    fn assemble(
        fields: Fields,
        format: RecordFormat,
        source: RawRecord,
        with_continuation: bool,
    ) -> StructuredRecord {
        let continuation = if with_continuation {
            source.continuation()
        } else {
            None
        };
        let message = match continuation {
            Some(rest) if fields.message.is_empty() => rest.to_string(),
            Some(rest) => format!("{}\n{}", fields.message, rest),
            None => fields.message,
        };

        StructuredRecord {
            timestamp: fields.timestamp,
            severity_token: fields.severity_token,
            component: fields.component,
            code: fields.code,
            message,
            format,
            source,
        }
    }

    /// Try to parse the record as a JSON object
    ///
    /// The header line is tried first, then the whole record for
    /// pretty-printed objects. The flag is true when the whole record was
    /// consumed.
    fn try_parse_json(raw: &RawRecord) -> Option<(Fields, bool)> {
        let header = raw.first_line().trim();
        if !header.starts_with('{') {
            return None;
        }

        let (value, whole) = match serde_json::from_str::<Value>(header) {
            Ok(value) => (value, raw.continuation().is_none()),
            Err(_) => (serde_json::from_str::<Value>(raw.raw_text.trim()).ok()?, true),
        };
        let obj = value.as_object()?;

        let mut message = first_string(obj, JSON_MESSAGE_FIELDS).unwrap_or_else(|| header.to_string());
        for key in JSON_ERROR_FIELDS {
            if let Some(Value::String(detail)) = obj.get(*key) {
                message.push('\n');
                message.push_str(detail);
            }
        }

        let fields = Fields {
            timestamp: Self::extract_timestamp_from_json(obj),
            severity_token: Self::extract_level_from_json(obj),
            component: first_string(obj, JSON_COMPONENT_FIELDS),
            code: None,
            message,
        };
        Some((fields, whole))
    }

    /// Extract the level token from JSON fields
    fn extract_level_from_json(obj: &Map<String, Value>) -> Option<String> {
        for field in JSON_LEVEL_FIELDS {
            match obj.get(*field) {
                Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
                Some(Value::Number(n)) if n.as_u64().is_some() => {
                    // bunyan/pino numeric levels
                    let name = match n.as_u64().unwrap_or_default() {
                        0..=10 => "trace",
                        11..=20 => "debug",
                        21..=30 => "info",
                        31..=40 => "warn",
                        41..=50 => "error",
                        _ => "fatal",
                    };
                    return Some(name.to_string());
                }
                _ => {}
            }
        }
        None
    }

    fn extract_timestamp_from_json(obj: &Map<String, Value>) -> Option<Timestamp> {
        JSON_TIMESTAMP_FIELDS
            .iter()
            .find_map(|field| match obj.get(*field)? {
                Value::String(s) => parse_timestamp(s),
                Value::Number(n) => timestamp_from_epoch(n.as_f64()?),
                _ => None,
            })
    }
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

fn compile(format: RecordFormat, pattern: &str) -> Result<Regex, RuleError> {
    Regex::new(pattern).map_err(|source| RuleError::InvalidPattern {
        kind: format.as_str(),
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use logsift_types::LineRange;

    fn recognize(text: &str) -> StructuredRecord {
        let recognizer = FormatRecognizer::new(&RuleSet::default()).unwrap();
        let lines = text.lines().count().max(1);
        recognizer.recognize(RawRecord::new(text.to_string(), LineRange::new(1, lines)))
    }

    #[test]
    fn test_level_component_timestamp() {
        let rec = recognize("ERROR [db-pool] 2024-01-15 10:30:00: connection lost");
        assert_eq!(rec.format, RecordFormat::LevelComponentTimestamp);
        assert_eq!(rec.severity_token.as_deref(), Some("ERROR"));
        assert_eq!(rec.component.as_deref(), Some("db-pool"));
        assert_eq!(
            rec.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
        );
        assert_eq!(rec.message, "connection lost");
    }

    #[test]
    fn test_bracket_timestamp_with_code() {
        let rec = recognize("[2025-01-19 10:00:00] ERROR 404: Resource not found");
        assert_eq!(rec.format, RecordFormat::BracketTimestampLevel);
        assert_eq!(rec.severity_token.as_deref(), Some("ERROR"));
        assert_eq!(rec.code.as_deref(), Some("404"));
        assert_eq!(rec.message, "Resource not found");
        assert!(rec.timestamp.is_some());
    }

    #[test]
    fn test_bracket_timestamp_without_code() {
        let rec = recognize("[2025-01-19 10:10:00] INFO: System running normally");
        assert_eq!(rec.severity_token.as_deref(), Some("INFO"));
        assert_eq!(rec.code, None);
        assert_eq!(rec.message, "System running normally");
    }

    #[test]
    fn test_python_logging_layout() {
        let rec = recognize("2024-01-15 10:30:00,123 - billing.worker - WARNING - queue is backing up");
        assert_eq!(rec.format, RecordFormat::TimestampComponentLevel);
        assert_eq!(rec.component.as_deref(), Some("billing.worker"));
        assert_eq!(rec.severity_token.as_deref(), Some("WARNING"));
        assert_eq!(rec.message, "queue is backing up");
    }

    #[test]
    fn test_timestamp_level_component() {
        let rec = recognize("2024-01-15 10:30:00,123 ERROR [main] c.e.Service - request failed");
        assert_eq!(rec.format, RecordFormat::TimestampLevelComponent);
        assert_eq!(rec.severity_token.as_deref(), Some("ERROR"));
        assert_eq!(rec.component.as_deref(), Some("main"));
        assert_eq!(rec.message, "c.e.Service - request failed");
    }

    #[test]
    fn test_words_after_timestamp_are_not_levels() {
        for line in [
            "2025-01-19 10:00:00 Alert threshold updated to 80%",
            "2025-01-19 10:00:01 fine tuning job completed",
            "[2025-01-19 10:00:02] Critical section entered by worker 3",
        ] {
            let rec = recognize(line);
            assert_eq!(rec.severity_token, None, "{line}");
            assert_eq!(rec.format, RecordFormat::TimestampOnly, "{line}");
            assert!(rec.timestamp.is_some());
        }
    }

    #[test]
    fn test_level_after_timestamp_with_separator() {
        let rec = recognize("2025-01-19 10:00:00 error: disk full");
        assert_eq!(rec.format, RecordFormat::TimestampLevelComponent);
        assert_eq!(rec.severity_token.as_deref(), Some("error"));
        assert_eq!(rec.message, "disk full");

        let rec = recognize("2025-01-19 10:00:00 WARN cache cold");
        assert_eq!(rec.severity_token.as_deref(), Some("WARN"));
        assert_eq!(rec.message, "cache cold");

        let rec = recognize("[2025-01-19 10:00:00] [crit] disk gone");
        assert_eq!(rec.format, RecordFormat::BracketTimestampLevel);
        assert_eq!(rec.severity_token.as_deref(), Some("crit"));
        assert_eq!(rec.message, "disk gone");
    }

    #[test]
    fn test_timestamp_bracket_level() {
        let rec = recognize("2024-01-15T10:30:00Z [warn] cache miss ratio high");
        assert_eq!(rec.format, RecordFormat::TimestampBracketLevel);
        assert_eq!(rec.severity_token.as_deref(), Some("warn"));
        assert_eq!(rec.message, "cache miss ratio high");
    }

    #[test]
    fn test_bracket_level() {
        let rec = recognize("[ERROR] [auth] token expired");
        assert_eq!(rec.format, RecordFormat::BracketLevel);
        assert_eq!(rec.component.as_deref(), Some("auth"));
        assert_eq!(rec.message, "token expired");
    }

    #[test]
    fn test_level_colon_prefers_warning_over_warn() {
        let rec = recognize("Warning: exception occurred");
        assert_eq!(rec.format, RecordFormat::LevelColon);
        assert_eq!(rec.severity_token.as_deref(), Some("Warning"));
        assert_eq!(rec.message, "exception occurred");
    }

    #[test]
    fn test_upper_case_level_without_separator() {
        let rec = recognize("ERROR disk full");
        assert_eq!(rec.format, RecordFormat::LevelPrefix);
        assert_eq!(rec.severity_token.as_deref(), Some("ERROR"));
        assert_eq!(rec.message, "disk full");
    }

    #[test]
    fn test_sentence_starting_with_level_word_is_plain() {
        let rec = recognize("Error handling is tricky");
        assert_eq!(rec.format, RecordFormat::Plain);
        assert_eq!(rec.severity_token, None);
    }

    #[test]
    fn test_syslog_with_inner_level() {
        let rec = recognize("Jan  5 10:00:00 web01 nginx[812]: ERROR: upstream timed out");
        assert_eq!(rec.format, RecordFormat::Syslog);
        assert_eq!(rec.component.as_deref(), Some("nginx"));
        assert_eq!(rec.severity_token.as_deref(), Some("ERROR"));
        assert_eq!(rec.message, "upstream timed out");
        assert_eq!(rec.timestamp, None);
    }

    #[test]
    fn test_timestamp_only() {
        let rec = recognize("2024-01-15T10:30:00.123456789Z some log message");
        assert_eq!(rec.format, RecordFormat::TimestampOnly);
        assert!(rec.timestamp.is_some());
        assert_eq!(rec.severity_token, None);
        assert_eq!(rec.message, "some log message");
    }

    #[test]
    fn test_parse_json_log() {
        let rec = recognize(
            r#"{"level":"error","msg":"something failed","time":"2024-01-15T10:30:00Z","logger":"api","error":"io.TimeoutException: read"}"#,
        );
        assert_eq!(rec.format, RecordFormat::Json);
        assert_eq!(rec.severity_token.as_deref(), Some("error"));
        assert_eq!(rec.component.as_deref(), Some("api"));
        assert_eq!(rec.message, "something failed\nio.TimeoutException: read");
        assert!(rec.timestamp.is_some());
    }

    #[test]
    fn test_parse_json_numeric_level() {
        let rec = recognize(r#"{"level":50,"msg":"boom","time":1705314600000}"#);
        assert_eq!(rec.severity_token.as_deref(), Some("error"));
        assert_eq!(
            rec.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_broken_json_falls_through() {
        let rec = recognize(r#"{"level":"error", truncated"#);
        assert_eq!(rec.format, RecordFormat::Plain);
        assert_eq!(rec.message, r#"{"level":"error", truncated"#);
    }

    #[test]
    fn test_continuation_is_appended_to_message() {
        let rec = recognize("ERROR: failed\n    at foo()\n    at bar()");
        assert_eq!(rec.message, "failed\n    at foo()\n    at bar()");
        assert_eq!(rec.source.line_range, LineRange::new(1, 3));
    }

    #[test]
    fn test_unmatched_is_plain() {
        let rec = recognize("system heartbeat ok");
        assert_eq!(rec.format, RecordFormat::Plain);
        assert_eq!(rec.message, "system heartbeat ok");
        assert_eq!(rec.timestamp, None);
        assert_eq!(rec.component, None);
    }

    #[test]
    fn test_multibyte_utf8_no_panic() {
        let rec = recognize("─────────────────────────────────────────");
        assert_eq!(rec.format, RecordFormat::Plain);

        let rec = recognize("2024-01-15T10:30:00Z ╭────────────────────────────╮");
        assert!(rec.timestamp.is_some());
    }

    #[test]
    fn test_deterministic() {
        let line = "[2025-01-19 10:05:00] ERROR 500: Internal server error";
        assert_eq!(recognize(line), recognize(line));
    }
}
