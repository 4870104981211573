//! Library error types.
//!
//! Parsing is the only fallible library operation that callers must handle;
//! validation problems are reported as data (see [`crate::validation`]) and
//! the gap helper reports its own refusal reasons (see [`crate::gaps`]).

use thiserror::Error;

/// Errors raised while turning stored text into question structures.
#[derive(Debug, Error, PartialEq)]
pub enum ClozeError {
    /// A complete marker block names a question type that is not recognised.
    /// The whole parse is aborted.
    #[error("unknown question type '{tag}' in marker block #{position}")]
    UnknownQuestionType { tag: String, position: usize },

    /// The input exceeds the configured parse bound.
    #[error("question text is {len} bytes, the limit is {max}")]
    TextTooLong { len: usize, max: usize },

    /// Stored question text whose `{#n}` placeholders are not numbered
    /// 1, 2, ... in text order.
    #[error("placeholder {{#{found}}} found where {{#{expected}}} was expected")]
    PlaceholderOrder { expected: usize, found: usize },

    /// A stored sequence value could not be read.
    #[error("invalid sequence: {0}")]
    InvalidSequence(String),
}

impl ClozeError {
    /// Returns `true` if the error comes from the content of the question
    /// text itself rather than from its size or surrounding bookkeeping.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self,
            ClozeError::UnknownQuestionType { .. } | ClozeError::PlaceholderOrder { .. }
        )
    }
}
