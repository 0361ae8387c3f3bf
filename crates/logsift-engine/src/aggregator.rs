use chrono::Timelike;

use logsift_types::{ClassifiedRecord, Summary, SummaryEntry, Timestamp};

/// Default number of sample messages kept per key
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

/// Default maximum sample length in characters
pub const DEFAULT_SAMPLE_CHARS: usize = 500;

/// Folds classified records into a [`Summary`] in one pass
#[derive(Clone, Copy, Debug)]
pub struct Aggregator {
    sample_limit: usize,
    sample_chars: usize,
}

impl Aggregator {
    /// Every key keeps at least one sample, so `sample_limit` is raised to 1
    pub fn new(sample_limit: usize, sample_chars: usize) -> Self {
        Self {
            sample_limit: sample_limit.max(1),
            sample_chars: sample_chars.max(1),
        }
    }

    /// Count records per (error type, sub-tag) in first-occurrence order
    pub fn aggregate<'a, I>(&self, records: I) -> Summary
    where
        I: IntoIterator<Item = &'a ClassifiedRecord>,
    {
        let mut summary = Summary::new();
        let mut seen = 0usize;

        for record in records {
            seen += 1;
            let key = record.key();
            let entry = summary.entry_or_insert_with(&key, || {
                SummaryEntry::new(key.clone(), record.line_range())
            });

            entry.count += 1;
            entry.confidence.record(record.confidence);
            if entry.sample_messages.len() < self.sample_limit {
                entry
                    .sample_messages
                    .push(truncate_chars(record.message(), self.sample_chars));
            }
            if let Some(ts) = record.record.timestamp {
                entry.observe_timestamp(ts);
            }

            if record.error_type.is_error()
                && let Some(hour) = record.record.timestamp.and_then(truncate_to_hour)
            {
                summary.timeline_mut().record(hour);
            }
        }

        summary.set_record_totals(seen, 0);
        summary
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_LIMIT, DEFAULT_SAMPLE_CHARS)
    }
}

fn truncate_to_hour(ts: Timestamp) -> Option<Timestamp> {
    ts.with_minute(0)?.with_second(0)?.with_nanosecond(0)
}

/// Cut `text` to at most `max_chars` characters, marking the cut with `…`
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some(_) => {
            let keep = max_chars.saturating_sub(1);
            let end = text.char_indices().nth(keep).map_or(text.len(), |(i, _)| i);
            format!("{}…", &text[..end])
        }
    }
}
