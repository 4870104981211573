//! Core trait definitions for sub-question grading and sub-question storage.
//!
//! The aggregator in [`crate::grading`] only ever talks to sub-questions
//! through [`Subquestion`]; the concrete graders live in
//! [`crate::subquestion`]. Storage of child questions is a host concern and
//! is reached through [`SubquestionStore`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Layout, MarkerBlock, SubquestionResult};

/// A flat response map: field name to submitted value.
///
/// At question level the names are namespaced per sub-question (`sub2_answer`);
/// a sub-question only ever sees its own names with the prefix removed.
pub type Response = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Grading strategy
// ---------------------------------------------------------------------------

/// Grading strategy for one embedded sub-question.
pub trait Subquestion: Send + Sync {
    /// Name of the underlying question type (e.g. "shortanswer").
    fn name(&self) -> &str;

    /// Grade weight of this sub-question within its parent.
    fn weight(&self) -> f64;

    /// Choice layout, for multiple-choice types.
    fn layout(&self) -> Option<Layout> {
        None
    }

    /// The response field names this sub-question reads.
    fn response_keys(&self) -> Vec<String>;

    /// Whether enough was entered for the response to be graded.
    fn is_gradable_response(&self, response: &Response) -> bool;

    /// Whether the response is a complete answer.
    fn is_complete_response(&self, response: &Response) -> bool;

    /// Whether two responses are the same as far as this sub-question cares.
    fn is_same_response(&self, prev: &Response, new: &Response) -> bool {
        self.response_keys().iter().all(|key| {
            let a = prev.get(key).map(String::as_str).unwrap_or("");
            let b = new.get(key).map(String::as_str).unwrap_or("");
            a == b
        })
    }

    /// Grade a response.
    fn grade_response(&self, response: &Response) -> SubquestionResult;

    /// One-line human readable summary of a response.
    fn summarise_response(&self, response: &Response) -> String;

    /// Classify a response against the alternatives, for response analysis.
    fn classify_response(&self, response: &Response) -> Vec<ClassifiedResponse>;

    /// A response that earns full marks.
    fn correct_response(&self) -> Response;

    /// What stands in for this sub-question in a plain-text question summary.
    fn summary_placeholder(&self) -> String {
        "_____".to_string()
    }

    /// Lowest fraction a response can earn.
    fn min_fraction(&self) -> f64 {
        0.0
    }

    /// Highest fraction a response can earn.
    fn max_fraction(&self) -> f64 {
        1.0
    }
}

/// A response matched against one alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedResponse {
    /// Index of the matching alternative, `None` if nothing matched.
    pub alternative: Option<usize>,
    /// The response as entered.
    pub response: String,
    /// Fraction the matching alternative carries.
    pub fraction: f64,
}

impl ClassifiedResponse {
    pub fn unmatched(response: impl Into<String>) -> Self {
        Self {
            alternative: None,
            response: response.into(),
            fraction: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Child question storage
// ---------------------------------------------------------------------------

/// Lookup of stored child questions by id.
pub trait SubquestionStore {
    /// Load the child question with this id, `None` if it no longer exists.
    fn load(&self, id: u64) -> Option<MarkerBlock>;
}
