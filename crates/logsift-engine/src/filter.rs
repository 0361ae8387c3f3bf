use regex::{Regex, RegexBuilder};
use std::collections::HashSet;

use logsift_types::{ClassifiedRecord, ErrorType};

/// Selects which classified records reach aggregation
///
/// A record passes when its type is in the kept set (an empty set keeps every
/// type) and its raw text matches the pattern, or fails to match it when the
/// filter excludes text.
#[derive(Clone, Debug, Default)]
pub struct RecordFilter {
    text: Option<Regex>,
    exclude_text: bool,
    types: HashSet<ErrorType>,
}

impl RecordFilter {
    /// Keep records whose raw text matches `pattern`, ignoring case
    pub fn text(pattern: &str) -> Result<Self, regex::Error> {
        let text = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            text: Some(text),
            ..Self::default()
        })
    }

    /// Drop records whose text matches instead of keeping them
    pub fn excluding_text(mut self) -> Self {
        self.exclude_text = true;
        self
    }

    pub fn with_types(mut self, types: HashSet<ErrorType>) -> Self {
        self.types = types;
        self
    }

    /// Keep types at least as severe as `min`. `UNKNOWN` is never included.
    pub fn at_least(self, min: ErrorType) -> Self {
        let types = ErrorType::ALL
            .into_iter()
            .filter(|t| *t != ErrorType::Unknown && t.rank() >= min.rank())
            .collect();
        self.with_types(types)
    }

    pub fn matches(&self, record: &ClassifiedRecord) -> bool {
        if !self.types.is_empty() && !self.types.contains(&record.error_type) {
            return false;
        }
        self.text
            .as_ref()
            .is_none_or(|re| re.is_match(record.raw_text()) != self.exclude_text)
    }

    /// True when every record passes
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.types.is_empty()
    }
}
