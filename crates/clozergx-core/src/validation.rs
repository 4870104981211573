//! Question validation.
//!
//! Problems are returned as data, keyed by the form field an editor would
//! highlight (`sub_2_answer[0]`, `sub_2_fraction[0]`, `questiontext`).

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::model::{MarkerBlock, ParsedQuestion, SubquestionKind};
use crate::parser::is_valid_number;
use crate::subquestion::compile_answer_regex;

/// What is wrong with a field.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "code", rename_all = "lowercase")]
pub enum FieldErrorKind {
    #[error("this type of question requires at least {required} answers")]
    NotEnoughAnswers { required: usize },

    #[error("one of the answers should have a score of 100% so it is possible to get full marks")]
    FractionsNoMax,

    #[error("the answer must be a number, for example -1.234 or 3e8, or '*'")]
    AnswerMustBeNumberOrStar,

    #[error("the question text must include at least one embedded answer")]
    QuestionsMissing,

    #[error("the first answer of a regular expression question must be worth 100%")]
    FillOutOneAnswer,

    #[error("invalid regular expression: {reason}")]
    InvalidRegexp { reason: String },
}

impl FieldErrorKind {
    /// Short stable identifier of the problem.
    pub fn code(&self) -> &'static str {
        match self {
            FieldErrorKind::NotEnoughAnswers { .. } => "notenoughanswers",
            FieldErrorKind::FractionsNoMax => "fractionsnomax",
            FieldErrorKind::AnswerMustBeNumberOrStar => "answermustbenumberorstar",
            FieldErrorKind::QuestionsMissing => "questionsmissing",
            FieldErrorKind::FillOutOneAnswer => "filloutoneanswer",
            FieldErrorKind::InvalidRegexp { .. } => "invalidregexp",
        }
    }
}

/// A validation problem attached to a form field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    #[serde(flatten)]
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.kind)
    }
}

fn answer_field(position: usize, index: usize) -> String {
    format!("sub_{position}_answer[{index}]")
}

fn fraction_field(position: usize) -> String {
    format!("sub_{position}_fraction[0]")
}

/// Check every block of a parsed question. Returns all problems found.
pub fn validate(parsed: &ParsedQuestion) -> Vec<FieldError> {
    if parsed.blocks.is_empty() {
        return vec![FieldError {
            field: "questiontext".to_string(),
            kind: FieldErrorKind::QuestionsMissing,
        }];
    }

    let errors: Vec<FieldError> = parsed.blocks.values().flat_map(validate_block).collect();
    tracing::debug!(
        blocks = parsed.blocks.len(),
        errors = errors.len(),
        "validated question"
    );
    errors
}

/// Check one marker block.
pub fn validate_block(block: &MarkerBlock) -> Vec<FieldError> {
    let position = block.position;
    let mut errors = Vec::new();
    let mut answer_count = 0usize;
    let mut has_max = false;

    for (index, alt) in block.alternatives.iter().enumerate() {
        let answer = alt.answer.trim();
        if answer.is_empty() {
            continue;
        }
        answer_count += 1;

        if block.kind == SubquestionKind::Numerical && answer != "*" && !is_valid_number(answer)
        {
            errors.push(FieldError {
                field: answer_field(position, index),
                kind: FieldErrorKind::AnswerMustBeNumberOrStar,
            });
        }

        if alt.fraction == 1.0 || (block.kind.is_multi_response() && alt.fraction > 0.0) {
            has_max = true;
        }

        if let SubquestionKind::Regexp { case_sensitive } = block.kind {
            if answer_count == 1 && alt.fraction < 1.0 {
                errors.push(FieldError {
                    field: answer_field(position, index),
                    kind: FieldErrorKind::FillOutOneAnswer,
                });
            }
            if answer_count > 1 && alt.fraction > 0.0 {
                if let Err(e) = compile_answer_regex(answer, case_sensitive) {
                    errors.push(FieldError {
                        field: answer_field(position, index),
                        kind: FieldErrorKind::InvalidRegexp {
                            reason: last_line(&e.to_string()),
                        },
                    });
                }
            }
        }
    }

    if block.kind.is_choice() && answer_count < 2 {
        errors.push(FieldError {
            field: answer_field(position, 0),
            kind: FieldErrorKind::NotEnoughAnswers { required: 2 },
        });
    } else if answer_count == 0 {
        errors.push(FieldError {
            field: answer_field(position, 0),
            kind: FieldErrorKind::NotEnoughAnswers { required: 1 },
        });
    }

    if !has_max {
        errors.push(FieldError {
            field: fraction_field(position),
            kind: FieldErrorKind::FractionsNoMax,
        });
    }

    errors
}

fn last_line(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .rfind(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}
