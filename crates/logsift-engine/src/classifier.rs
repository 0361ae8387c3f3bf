use std::sync::Arc;

use logsift_types::{ClassifiedRecord, Confidence, ErrorType, StructuredRecord};

use crate::rules::RuleSet;

/// Assigns an [`ErrorType`] to every structured record
///
/// Resolution is tiered, first match wins:
/// 1. the record's severity token through the severity table (`EXPLICIT`)
/// 2. the keyword rules against the message, by rule priority (`HEURISTIC`)
/// 3. `UNKNOWN` (`FALLBACK`)
#[derive(Clone, Debug)]
pub struct Classifier {
    rules: Arc<RuleSet>,
}

impl Classifier {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, record: StructuredRecord) -> ClassifiedRecord {
        let (error_type, confidence) = self.resolve(&record);
        let sub_tag = self.sub_tag(&record);

        tracing::trace!(
            lines = %record.source.line_range,
            error_type = %error_type,
            confidence = confidence.as_str(),
            sub_tag = sub_tag.as_deref().unwrap_or("-"),
            "classified record"
        );

        ClassifiedRecord {
            record,
            error_type,
            sub_tag,
            confidence,
        }
    }

    fn resolve(&self, record: &StructuredRecord) -> (ErrorType, Confidence) {
        if let Some(error_type) = record
            .severity_token
            .as_deref()
            .and_then(|token| self.rules.severity_of(token))
        {
            return (error_type, Confidence::Explicit);
        }

        if let Some(error_type) = self.rules.keyword_match(&record.message) {
            return (error_type, Confidence::Heuristic);
        }

        (ErrorType::Unknown, Confidence::Fallback)
    }

    /// Best-effort refinement: exception name, then status code, then phrase rules
    fn sub_tag(&self, record: &StructuredRecord) -> Option<String> {
        if let Some(name) = self.rules.exception_name(&record.message) {
            return Some(name.to_string());
        }
        if let Some(code) = &record.code {
            return Some(code.clone());
        }
        self.rules
            .sub_tag_match(&record.message)
            .map(str::to_string)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(Arc::new(RuleSet::default()))
    }
}
