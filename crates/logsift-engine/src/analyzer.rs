//! The analysis pipeline.
//!
//! `bytes → Normalizer → FormatRecognizer → Classifier → filter → Aggregator`
//!
//! An [`Analyzer`] is built once from a [`RuleSet`] and options, holds no
//! per-call state, and can be shared across threads.

use std::sync::{Arc, LazyLock};

use serde::Deserialize;

use logsift_types::{Chunk, ClassifiedRecord, RawRecord, Summary};

use crate::aggregator::{Aggregator, DEFAULT_SAMPLE_CHARS, DEFAULT_SAMPLE_LIMIT};
use crate::chunk::{Chunker, DEFAULT_CHUNK_CHARS};
use crate::classifier::Classifier;
use crate::decode::Encoding;
use crate::error::{EncodingError, RuleError};
use crate::filter::RecordFilter;
use crate::normalizer::{ContinuationPolicy, DEFAULT_MAX_CONTINUATION_LINES, Normalizer};
use crate::recognizer::FormatRecognizer;
use crate::rules::RuleSet;

static DEFAULT_ANALYZER: LazyLock<Analyzer> = LazyLock::new(|| {
    Analyzer::new(RuleSet::default(), AnalyzerOptions::default())
        .expect("built-in analyzer configuration is valid")
});

/// Tunables for one [`Analyzer`]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyzerOptions {
    /// Declared input encoding; sniffed from the BOM when unset
    pub encoding: Option<Encoding>,

    pub continuation: ContinuationPolicy,
    pub max_continuation_lines: usize,

    /// Sample messages kept per summary entry
    pub sample_limit: usize,
    pub sample_chars: usize,

    pub chunk_chars: usize,
    pub max_chunks: Option<usize>,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            continuation: ContinuationPolicy::default(),
            max_continuation_lines: DEFAULT_MAX_CONTINUATION_LINES,
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            sample_chars: DEFAULT_SAMPLE_CHARS,
            chunk_chars: DEFAULT_CHUNK_CHARS,
            max_chunks: None,
        }
    }
}

/// Stateless log analyzer
#[derive(Clone, Debug)]
pub struct Analyzer {
    normalizer: Normalizer,
    recognizer: FormatRecognizer,
    classifier: Classifier,
    aggregator: Aggregator,
    chunker: Chunker,
    filter: Option<RecordFilter>,
    encoding: Option<Encoding>,
}

impl Analyzer {
    pub fn new(rules: RuleSet, options: AnalyzerOptions) -> Result<Self, RuleError> {
        let normalizer = Normalizer::new(&rules, options.continuation)?
            .with_max_continuation_lines(options.max_continuation_lines);
        let recognizer = FormatRecognizer::new(&rules)?;

        Ok(Self {
            normalizer,
            recognizer,
            classifier: Classifier::new(Arc::new(rules)),
            aggregator: Aggregator::new(options.sample_limit, options.sample_chars),
            chunker: Chunker::new(options.chunk_chars).with_max_chunks(options.max_chunks),
            filter: None,
            encoding: options.encoding,
        })
    }

    /// Drop records that do not pass `filter` before aggregation
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// Decode and split into records
    pub fn normalize(&self, bytes: &[u8]) -> Result<Vec<RawRecord>, EncodingError> {
        self.normalizer.normalize(bytes, self.encoding)
    }

    /// Every record of the input with its classification, in input order
    ///
    /// The record filter is not applied here.
    pub fn classify_all(&self, bytes: &[u8]) -> Result<Vec<ClassifiedRecord>, EncodingError> {
        let records = self.normalize(bytes)?;
        Ok(records
            .into_iter()
            .map(|raw| self.classifier.classify(self.recognizer.recognize(raw)))
            .collect())
    }

    /// Summarize `bytes`
    ///
    /// Fails only when the input cannot be decoded. Empty input yields an
    /// empty summary.
    pub fn analyze(&self, bytes: &[u8]) -> Result<Summary, EncodingError> {
        let records = self.classify_all(bytes)?;
        let summary = self.analyze_records(&records);

        tracing::debug!(
            bytes = bytes.len(),
            records = summary.total_records(),
            filtered_out = summary.filtered_out(),
            keys = summary.len(),
            "analyzed input"
        );
        Ok(summary)
    }

    /// Summarize records that were already classified
    pub fn analyze_records(&self, records: &[ClassifiedRecord]) -> Summary {
        let mut summary = match &self.filter {
            Some(filter) => self
                .aggregator
                .aggregate(records.iter().filter(|r| filter.matches(r))),
            None => self.aggregator.aggregate(records),
        };
        let kept = summary.total_count();
        summary.set_record_totals(records.len(), records.len() - kept);
        summary
    }

    /// Size-bounded chunks of the filtered records
    pub fn chunks(&self, bytes: &[u8]) -> Result<Vec<Chunk>, EncodingError> {
        let records = self.classify_all(bytes)?;
        Ok(self.chunk_records(&records))
    }

    pub fn chunk_records(&self, records: &[ClassifiedRecord]) -> Vec<Chunk> {
        match &self.filter {
            Some(filter) => {
                let kept: Vec<ClassifiedRecord> = records
                    .iter()
                    .filter(|r| filter.matches(r))
                    .cloned()
                    .collect();
                self.chunker.chunk(&kept)
            }
            None => self.chunker.chunk(records),
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        DEFAULT_ANALYZER.clone()
    }
}

/// Analyze with the built-in rules and default options
pub fn analyze(bytes: &[u8]) -> Result<Summary, EncodingError> {
    DEFAULT_ANALYZER.analyze(bytes)
}
