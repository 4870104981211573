//! The grading aggregator: one overall grade and state from the
//! independently graded sub-questions of a cloze question.
//!
//! Responses are flat maps with keys namespaced per sub-question
//! (`sub1_answer`, `sub2_choice0`, ...). Each sub-question only ever sees its
//! own keys with the prefix removed.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Layout, OverallResult, ParsedQuestion, QuestionState};
use crate::subquestion::build_subquestion;
use crate::traits::{ClassifiedResponse, Response, Subquestion};

/// Shown when a response leaves some parts unanswered.
pub const INCOMPLETE_MESSAGE: &str = "Please answer all parts of the question.";

/// Default per-try penalty.
pub const DEFAULT_PENALTY: f64 = 0.333_333_3;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

// ---------------------------------------------------------------------------
// State combination
// ---------------------------------------------------------------------------

/// Combined state for each pair of the lattice
/// gave up < wrong < partial < right.
const COMBINED: [[QuestionState; 4]; 4] = {
    use crate::model::QuestionState::{GaveUp as G, GradedPartial as P, GradedRight as R, GradedWrong as W};
    [[G, W, P, P], [W, W, P, P], [P, P, P, P], [P, P, P, R]]
};

fn lattice_index(state: QuestionState) -> usize {
    match state {
        QuestionState::GradedWrong => 1,
        QuestionState::GradedPartial => 2,
        QuestionState::GradedRight => 3,
        QuestionState::GaveUp | QuestionState::Unanswered | QuestionState::Finished => 0,
    }
}

/// Fold one more sub-question state into the running combined state.
///
/// `None` means nothing has been combined yet. Commutative and associative.
pub fn combine_states(acc: Option<QuestionState>, next: QuestionState) -> QuestionState {
    match acc {
        None => COMBINED[lattice_index(next)][lattice_index(next)],
        Some(acc) => COMBINED[lattice_index(acc)][lattice_index(next)],
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// A cloze question ready for grading.
pub struct ClozeQuestion {
    /// Literal text around the sub-questions; one more entry than there are
    /// sub-questions.
    pub fragments: Vec<String>,
    /// Sub-questions in position order; index 0 is position 1.
    subquestions: Vec<Box<dyn Subquestion>>,
    penalty: f64,
}

impl std::fmt::Debug for ClozeQuestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.subquestions.iter().map(|s| s.name()).collect();
        f.debug_struct("ClozeQuestion")
            .field("fragments", &self.fragments)
            .field("subquestions", &names)
            .field("penalty", &self.penalty)
            .finish()
    }
}

impl ClozeQuestion {
    pub fn new(
        fragments: Vec<String>,
        subquestions: Vec<Box<dyn Subquestion>>,
        penalty: f64,
    ) -> Self {
        Self {
            fragments,
            subquestions,
            penalty,
        }
    }

    /// Build graders for every block of a parsed question.
    pub fn from_parsed(parsed: &ParsedQuestion, penalty: f64) -> Self {
        let subquestions = parsed.blocks.values().map(build_subquestion).collect();
        Self::new(parsed.fragments.clone(), subquestions, penalty)
    }

    pub fn subquestions(&self) -> &[Box<dyn Subquestion>] {
        &self.subquestions
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Key prefix for the sub-question at a 1-based position.
    pub fn response_prefix(position: usize) -> String {
        format!("sub{position}_")
    }

    /// The part of `response` belonging to one position, prefix removed.
    pub fn filter_response(position: usize, response: &Response) -> Response {
        let prefix = Self::response_prefix(position);
        response
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&prefix)
                    .map(|name| (name.to_string(), value.clone()))
            })
            .collect()
    }

    fn positioned(&self) -> impl Iterator<Item = (usize, &dyn Subquestion)> {
        self.subquestions
            .iter()
            .enumerate()
            .map(|(i, sq)| (i + 1, sq.as_ref()))
    }

    /// Grade one response across all sub-questions.
    ///
    /// Ungradable parts count as gave-up and carry no weight. If nothing was
    /// gradable the fraction is `None`.
    pub fn grade_response(&self, response: &Response) -> OverallResult {
        let mut fraction_sum = 0.0;
        let mut weight_sum = 0.0;
        let mut state: Option<QuestionState> = None;

        for (position, sq) in self.positioned() {
            let sub_response = Self::filter_response(position, response);
            if !sq.is_gradable_response(&sub_response) {
                state = Some(combine_states(state, QuestionState::GaveUp));
                continue;
            }
            let result = sq.grade_response(&sub_response);
            fraction_sum += result.fraction * sq.weight();
            weight_sum += sq.weight();
            state = Some(combine_states(state, result.state));
        }

        let state = state.unwrap_or(QuestionState::Finished);
        if weight_sum == 0.0 {
            return OverallResult {
                fraction: None,
                state,
            };
        }
        let fraction = fraction_sum / weight_sum;
        tracing::debug!(fraction, %state, "graded response");
        OverallResult {
            fraction: Some(fraction),
            state,
        }
    }

    /// Final grade over a sequence of submitted responses.
    ///
    /// For each sub-question, entries identical to the last counted one are
    /// skipped; every change is re-graded, and the last grade loses
    /// `index_of_last_change * penalty`, floored at zero.
    pub fn compute_final_grade(&self, history: &[Response], total_tries: usize) -> f64 {
        let mut fraction_sum = 0.0;
        let mut weight_sum = 0.0;

        for (position, sq) in self.positioned() {
            let mut last_response = Response::new();
            let mut last_change = 0usize;
            let mut sub_fraction = 0.0;

            for (index, response) in history.iter().enumerate() {
                let sub_response = Self::filter_response(position, response);
                if sq.is_same_response(&last_response, &sub_response) {
                    continue;
                }
                sub_fraction = sq.grade_response(&sub_response).fraction;
                last_response = sub_response;
                last_change = index;
            }

            let penalised = (sub_fraction - last_change as f64 * self.penalty).max(0.0);
            fraction_sum += sq.weight() * penalised;
            weight_sum += sq.weight();
        }

        tracing::debug!(
            tries = history.len(),
            total_tries,
            "computed final grade"
        );
        if weight_sum == 0.0 {
            return 0.0;
        }
        fraction_sum / weight_sum
    }

    /// Every sub-question has a complete answer.
    pub fn is_complete_response(&self, response: &Response) -> bool {
        self.positioned()
            .all(|(position, sq)| sq.is_complete_response(&Self::filter_response(position, response)))
    }

    /// At least one sub-question can be graded.
    pub fn is_gradable_response(&self, response: &Response) -> bool {
        self.positioned()
            .any(|(position, sq)| sq.is_gradable_response(&Self::filter_response(position, response)))
    }

    /// No sub-question sees a difference between the two responses.
    pub fn is_same_response(&self, prev: &Response, new: &Response) -> bool {
        self.positioned().all(|(position, sq)| {
            sq.is_same_response(
                &Self::filter_response(position, prev),
                &Self::filter_response(position, new),
            )
        })
    }

    /// Message to show for an incomplete response.
    pub fn validation_error(&self, response: &Response) -> Option<&'static str> {
        if self.is_complete_response(response) {
            None
        } else {
            Some(INCOMPLETE_MESSAGE)
        }
    }

    /// Blank out the parts of a response that are not fully right.
    ///
    /// Vertical and horizontal choice lists are reset to `-1`, every other
    /// field to the empty string.
    pub fn clear_wrong_from_response(&self, response: &Response) -> Response {
        let mut cleared = response.clone();
        for (position, sq) in self.positioned() {
            let sub_response = Self::filter_response(position, response);
            if sq.grade_response(&sub_response).state == QuestionState::GradedRight {
                continue;
            }
            let reset = match sq.layout() {
                Some(Layout::Vertical | Layout::Horizontal) => "-1",
                _ => "",
            };
            let prefix = Self::response_prefix(position);
            for name in sub_response.keys() {
                cleared.insert(format!("{prefix}{name}"), reset.to_string());
            }
        }
        cleared
    }

    /// Number of fully right parts and number of parts.
    pub fn num_parts_right(&self, response: &Response) -> (usize, usize) {
        let right = self
            .positioned()
            .filter(|(position, sq)| {
                sq.grade_response(&Self::filter_response(*position, response))
                    .state
                    == QuestionState::GradedRight
            })
            .count();
        (right, self.subquestions.len())
    }

    pub fn summarise_response(&self, response: &Response) -> String {
        self.positioned()
            .map(|(position, sq)| {
                let part = sq.summarise_response(&Self::filter_response(position, response));
                format!("part {position}: {part}")
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Classified responses keyed by position.
    pub fn classify_response(&self, response: &Response) -> BTreeMap<usize, Vec<ClassifiedResponse>> {
        self.positioned()
            .map(|(position, sq)| {
                (
                    position,
                    sq.classify_response(&Self::filter_response(position, response)),
                )
            })
            .collect()
    }

    /// A response earning full marks on every part, with namespaced keys.
    pub fn correct_response(&self) -> Response {
        let mut response = Response::new();
        for (position, sq) in self.positioned() {
            let prefix = Self::response_prefix(position);
            for (name, value) in sq.correct_response() {
                response.insert(format!("{prefix}{name}"), value);
            }
        }
        response
    }

    pub fn min_fraction(&self) -> f64 {
        self.weighted(|sq| sq.min_fraction())
    }

    pub fn max_fraction(&self) -> f64 {
        self.weighted(|sq| sq.max_fraction())
    }

    fn weighted(&self, f: impl Fn(&dyn Subquestion) -> f64) -> f64 {
        let (sum, weight) = self
            .subquestions
            .iter()
            .fold((0.0, 0.0), |(sum, weight), sq| {
                (sum + sq.weight() * f(sq.as_ref()), weight + sq.weight())
            });
        if weight == 0.0 {
            0.0
        } else {
            sum / weight
        }
    }

    /// Plain-text summary of the question with each part replaced by its
    /// placeholder.
    pub fn question_summary(&self) -> String {
        let mut out = String::new();
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                if let Some(sq) = self.subquestions.get(i - 1) {
                    out.push_str(&sq.summary_placeholder());
                }
            }
            out.push_str(fragment);
        }
        let text = HTML_TAG.replace_all(&out, " ");
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::subquestion::DeletedSubquestion;
    use crate::model::QuestionState::*;

    fn question(text: &str) -> ClozeQuestion {
        ClozeQuestion::from_parsed(&parse(text).unwrap(), DEFAULT_PENALTY)
    }

    fn response(pairs: &[(&str, &str)]) -> Response {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const ALL: [QuestionState; 4] = [GaveUp, GradedWrong, GradedPartial, GradedRight];

    #[test]
    fn combine_table_rules() {
        assert_eq!(combine_states(Some(GaveUp), GaveUp), GaveUp);
        assert_eq!(combine_states(Some(GaveUp), GradedWrong), GradedWrong);
        assert_eq!(combine_states(Some(GradedWrong), GradedWrong), GradedWrong);
        assert_eq!(combine_states(Some(GradedRight), GradedRight), GradedRight);
        assert_eq!(combine_states(Some(GradedRight), GradedWrong), GradedPartial);
        assert_eq!(combine_states(Some(GaveUp), GradedRight), GradedPartial);
        assert_eq!(combine_states(None, GradedRight), GradedRight);
        assert_eq!(combine_states(None, GradedPartial), GradedPartial);
    }

    #[test]
    fn combine_is_commutative_and_associative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(combine_states(Some(a), b), combine_states(Some(b), a));
                for c in ALL {
                    let left = combine_states(Some(combine_states(Some(a), b)), c);
                    let right = combine_states(Some(a), combine_states(Some(b), c));
                    assert_eq!(left, right, "{a:?} {b:?} {c:?}");
                }
            }
        }
    }

    #[test]
    fn weighted_grade() {
        let q = question("{2:SA:=cat} and {1:SA:=mat}");
        let result = q.grade_response(&response(&[("sub1_answer", "cat"), ("sub2_answer", "dog")]));
        assert_eq!(result.state, GradedPartial);
        assert!((result.fraction.unwrap() - 2.0 / 3.0).abs() < 1e-9);

        let result = q.grade_response(&response(&[("sub1_answer", "cat"), ("sub2_answer", "mat")]));
        assert_eq!(result, OverallResult { fraction: Some(1.0), state: GradedRight });
    }

    #[test]
    fn ungradable_parts_carry_no_weight() {
        let q = question("{1:SA:=cat} and {1:SA:=mat}");
        let result = q.grade_response(&response(&[("sub1_answer", "dog")]));
        assert_eq!(result.fraction, Some(0.0));
        assert_eq!(result.state, GradedWrong);
    }

    #[test]
    fn everything_gave_up() {
        let q = question("{1:SA:=cat} and {1:MC:=a~b}");
        let result = q.grade_response(&response(&[("sub2_answer", "-1")]));
        assert_eq!(result, OverallResult { fraction: None, state: GaveUp });
    }

    #[test]
    fn no_subquestions_is_finished() {
        let q = question("plain text");
        let result = q.grade_response(&Response::new());
        assert_eq!(result, OverallResult { fraction: None, state: Finished });
    }

    #[test]
    fn grade_is_invariant_to_order() {
        let forward = question("{1:SA:=a} {1:NM:=2} {1:MC:=x~y}");
        let backward = question("{1:MC:=x~y} {1:NM:=2} {1:SA:=a}");
        let r1 = response(&[("sub1_answer", "a"), ("sub2_answer", "3"), ("sub3_answer", "0")]);
        let r2 = response(&[("sub3_answer", "a"), ("sub2_answer", "3"), ("sub1_answer", "0")]);
        assert_eq!(forward.grade_response(&r1), backward.grade_response(&r2));
    }

    #[test]
    fn final_grade_penalises_last_change() {
        let q = question("{1:SA:=cat} {1:SA:=mat}");
        let history = vec![
            response(&[("sub1_answer", "cat"), ("sub2_answer", "dog")]),
            response(&[("sub1_answer", "cat"), ("sub2_answer", "mat")]),
        ];
        // Part 1 right at try 0, part 2 right at try 1.
        let expected = (1.0 + (1.0 - DEFAULT_PENALTY)) / 2.0;
        assert!((q.compute_final_grade(&history, 2) - expected).abs() < 1e-9);
    }

    #[test]
    fn final_grade_floors_at_zero() {
        let q = ClozeQuestion::from_parsed(&parse("{1:SA:=cat}").unwrap(), 0.6);
        let history = vec![
            response(&[("sub1_answer", "a")]),
            response(&[("sub1_answer", "b")]),
            response(&[("sub1_answer", "cat")]),
        ];
        assert_eq!(q.compute_final_grade(&history, 3), 0.0);
    }

    #[test]
    fn deleted_part_blocks_full_marks() {
        let parsed = parse("{1:SA:=cat}").unwrap();
        let mut subquestions: Vec<Box<dyn Subquestion>> =
            parsed.blocks.values().map(build_subquestion).collect();
        subquestions.push(Box::new(DeletedSubquestion));
        let fragments = vec![String::new(), " ".to_string(), String::new()];
        let q = ClozeQuestion::new(fragments, subquestions, DEFAULT_PENALTY);

        let r = response(&[("sub1_answer", "cat")]);
        let result = q.grade_response(&r);
        assert_eq!(result.state, GradedPartial);
        assert_eq!(result.fraction, Some(1.0));
        assert!(!q.is_complete_response(&r));
        assert_eq!(q.validation_error(&r), Some(INCOMPLETE_MESSAGE));
        assert_eq!(q.num_parts_right(&r), (1, 2));
    }

    #[test]
    fn clear_wrong_resets_per_layout() {
        let q = question("{1:SA:=cat} {1:MCV:=a~b} {1:MC:=a~b} {1:SA:=mat}");
        let r = response(&[
            ("sub1_answer", "dog"),
            ("sub2_answer", "1"),
            ("sub3_answer", "1"),
            ("sub4_answer", "mat"),
        ]);
        let cleared = q.clear_wrong_from_response(&r);
        assert_eq!(cleared["sub1_answer"], "");
        assert_eq!(cleared["sub2_answer"], "-1");
        assert_eq!(cleared["sub3_answer"], "");
        assert_eq!(cleared["sub4_answer"], "mat");
    }

    #[test]
    fn summaries_and_correct_response() {
        let q = question("<p>Capital: {1:SA:=Paris}, river: {1:MC:Loire~=Seine}</p>");
        assert_eq!(q.question_summary(), "Capital: _____, river: {Loire; Seine}");

        let correct = q.correct_response();
        assert_eq!(correct, response(&[("sub1_answer", "Paris"), ("sub2_answer", "1")]));
        assert_eq!(q.grade_response(&correct).state, GradedRight);
        assert!(q.is_same_response(&correct, &correct));
        assert_eq!(q.validation_error(&correct), None);
        assert_eq!(
            q.summarise_response(&correct),
            "part 1: Paris; part 2: Seine"
        );
        assert_eq!(q.max_fraction(), 1.0);
        assert_eq!(q.min_fraction(), 0.0);
    }

    #[test]
    fn classify_is_keyed_by_position() {
        let q = question("{1:SA:=cat} {1:NM:=2}");
        let classified = q.classify_response(&response(&[("sub2_answer", "2")]));
        assert!(classified[&1].is_empty());
        assert_eq!(classified[&2][0].alternative, Some(0));
    }
}
