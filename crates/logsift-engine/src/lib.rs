//! Log parsing and error classification for logsift
//!
//! This crate turns raw log bytes into a deterministic error summary:
//! records are split out of the text, parsed against known log formats,
//! classified into error types, and counted per (type, sub-tag).

mod aggregator;
mod analyzer;
mod ansi;
mod chunk;
mod classifier;
mod decode;
mod digest;
mod error;
mod export;
mod filter;
mod normalizer;
mod patterns;
mod recognizer;
mod rules;

pub use aggregator::{Aggregator, DEFAULT_SAMPLE_CHARS, DEFAULT_SAMPLE_LIMIT};
pub use analyzer::{Analyzer, AnalyzerOptions, analyze};
pub use ansi::strip_ansi;
pub use chunk::{Chunker, DEFAULT_CHUNK_CHARS};
pub use classifier::Classifier;
pub use decode::{Encoding, decode};
pub use digest::digest;
pub use error::{EncodingError, RuleError};
pub use export::project;
pub use filter::RecordFilter;
pub use normalizer::{ContinuationPolicy, DEFAULT_MAX_CONTINUATION_LINES, Normalizer};
pub use recognizer::FormatRecognizer;
pub use rules::{
    KeywordRuleConfig, RuleSet, RulesConfig, SeverityRuleConfig, SubTagRuleConfig,
};

// Re-export types used in our public API
pub use logsift_types::{
    Chunk, ClassifiedRecord, Confidence, ConfidenceCounts, ErrorKey, ErrorType, ExportRow,
    LineRange, RawRecord, RecordFormat, SortPolicy, StructuredRecord, Summary, SummaryEntry,
    Timeline, Timestamp,
};
