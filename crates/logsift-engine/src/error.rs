use thiserror::Error;

use crate::decode::Encoding;

/// Input bytes could not be turned into text
///
/// This is the only failure of an analysis call. Callers may retry with a
/// different declared encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("input is not valid {encoding}: invalid byte sequence at offset {offset}")]
    InvalidSequence { encoding: Encoding, offset: usize },

    #[error("input is truncated: {len} bytes is not a whole number of {encoding} code units")]
    Truncated { encoding: Encoding, len: usize },

    #[error("unsupported encoding '{0}'")]
    Unsupported(String),
}

/// Rule configuration that cannot be compiled
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid {kind} pattern '{pattern}': {source}")]
    InvalidPattern {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("severity token must not be empty")]
    EmptyToken,

    #[error("sub-tag for pattern '{0}' must not be empty")]
    EmptySubTag(String),
}
