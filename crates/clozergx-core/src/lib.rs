//! clozergx-core: parser, validation and grading for embedded-answer
//! (cloze) questions.
//!
//! A question text carries inline marker blocks such as `{1:SA:=cat}` or
//! `{2:MC:Lyon~=Paris}`. [`parser::parse`] splits it into literal fragments
//! and [`model::MarkerBlock`]s, [`validation::validate`] reports authoring
//! problems, and [`grading::ClozeQuestion`] grades attempts across all
//! sub-questions.

pub mod config;
pub mod error;
pub mod gaps;
pub mod grading;
pub mod model;
pub mod parser;
pub mod sequence;
pub mod subquestion;
pub mod traits;
pub mod validation;

pub use error::ClozeError;
pub use grading::ClozeQuestion;
pub use parser::parse;
