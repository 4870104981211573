//! Graders for the embedded sub-question kinds.
//!
//! [`build_subquestion`] turns a parsed [`MarkerBlock`] into the matching
//! [`Subquestion`] implementation. [`DeletedSubquestion`] stands in for a
//! child question that has gone missing from storage.

use regex::{Regex, RegexBuilder};

use crate::model::{
    AlternativeAnswer, Layout, MarkerBlock, QuestionState, SubquestionKind, SubquestionResult,
};
use crate::parser::parse_number;
use crate::traits::{ClassifiedResponse, Response, Subquestion};

const ANSWER_KEY: &str = "answer";

/// Build the grader for a marker block.
pub fn build_subquestion(block: &MarkerBlock) -> Box<dyn Subquestion> {
    match block.kind {
        SubquestionKind::Numerical => Box::new(Numerical::new(block)),
        SubquestionKind::ShortAnswer { case_sensitive } => {
            Box::new(ShortAnswer::new(block, case_sensitive))
        }
        SubquestionKind::Regexp { case_sensitive } => {
            Box::new(RegexpAnswer::new(block, case_sensitive))
        }
        SubquestionKind::MultiChoice { layout, .. } => Box::new(MultiChoice::new(block, layout)),
        SubquestionKind::MultiResponse { layout, .. } => {
            Box::new(MultiResponse::new(block, layout))
        }
    }
}

/// Compile a regular-expression alternative, anchored at both ends.
pub fn compile_answer_regex(pattern: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    RegexBuilder::new(&format!("^(?:{pattern})$"))
        .case_insensitive(!case_sensitive)
        .build()
}

fn wildcard_regex(pattern: &str, case_sensitive: bool) -> Result<Regex, regex::Error> {
    let escaped = regex::escape(pattern.trim()).replace(r"\*", ".*");
    compile_answer_regex(&escaped, case_sensitive)
}

fn typed_answer(response: &Response) -> &str {
    response.get(ANSWER_KEY).map(|s| s.trim()).unwrap_or("")
}

fn best_fraction(block: &MarkerBlock) -> f64 {
    block.max_alternative_fraction().clamp(0.0, 1.0)
}

/// Index of the first alternative carrying the best fraction.
fn best_alternative(alternatives: &[AlternativeAnswer]) -> Option<usize> {
    let best = alternatives
        .iter()
        .map(|a| a.fraction)
        .fold(f64::NEG_INFINITY, f64::max);
    alternatives.iter().position(|a| a.fraction == best)
}

fn classify_typed(
    alternatives: &[AlternativeAnswer],
    given: &str,
    matched: Option<usize>,
) -> Vec<ClassifiedResponse> {
    if given.is_empty() {
        return Vec::new();
    }
    vec![match matched {
        Some(i) => ClassifiedResponse {
            alternative: Some(i),
            response: given.to_string(),
            fraction: alternatives[i].fraction,
        },
        None => ClassifiedResponse::unmatched(given),
    }]
}

fn single_key_response(value: impl Into<String>) -> Response {
    let mut response = Response::new();
    response.insert(ANSWER_KEY.to_string(), value.into());
    response
}

// ---------------------------------------------------------------------------
// Short answer
// ---------------------------------------------------------------------------

/// Typed answer compared against each alternative, `*` matching anything.
pub struct ShortAnswer {
    weight: f64,
    max_fraction: f64,
    alternatives: Vec<AlternativeAnswer>,
    patterns: Vec<Option<Regex>>,
}

impl ShortAnswer {
    pub fn new(block: &MarkerBlock, case_sensitive: bool) -> Self {
        let patterns = block
            .alternatives
            .iter()
            .map(|alt| wildcard_regex(&alt.answer, case_sensitive).ok())
            .collect();
        Self {
            weight: block.weight,
            max_fraction: best_fraction(block),
            alternatives: block.alternatives.clone(),
            patterns,
        }
    }

    fn matching(&self, given: &str) -> Option<usize> {
        self.patterns
            .iter()
            .position(|p| p.as_ref().is_some_and(|re| re.is_match(given)))
    }
}

impl Subquestion for ShortAnswer {
    fn name(&self) -> &str {
        "shortanswer"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn response_keys(&self) -> Vec<String> {
        vec![ANSWER_KEY.to_string()]
    }

    fn is_gradable_response(&self, response: &Response) -> bool {
        !typed_answer(response).is_empty()
    }

    fn is_complete_response(&self, response: &Response) -> bool {
        self.is_gradable_response(response)
    }

    fn grade_response(&self, response: &Response) -> SubquestionResult {
        let fraction = self
            .matching(typed_answer(response))
            .map(|i| self.alternatives[i].fraction)
            .unwrap_or(0.0);
        SubquestionResult::from_fraction(fraction)
    }

    fn summarise_response(&self, response: &Response) -> String {
        typed_answer(response).to_string()
    }

    fn classify_response(&self, response: &Response) -> Vec<ClassifiedResponse> {
        let given = typed_answer(response);
        classify_typed(&self.alternatives, given, self.matching(given))
    }

    fn correct_response(&self) -> Response {
        best_alternative(&self.alternatives)
            .map(|i| single_key_response(self.alternatives[i].answer.replace('*', "")))
            .unwrap_or_default()
    }

    fn max_fraction(&self) -> f64 {
        self.max_fraction
    }
}

// ---------------------------------------------------------------------------
// Regular expression
// ---------------------------------------------------------------------------

/// Typed answer matched against regular expressions.
///
/// The first fully-correct alternative is the model answer and is compared
/// as plain text; every other alternative is an anchored pattern.
pub struct RegexpAnswer {
    weight: f64,
    max_fraction: f64,
    case_sensitive: bool,
    alternatives: Vec<AlternativeAnswer>,
    literal: Option<usize>,
    patterns: Vec<Option<Regex>>,
}

impl RegexpAnswer {
    pub fn new(block: &MarkerBlock, case_sensitive: bool) -> Self {
        let literal = model_answer_index(&block.alternatives);
        let patterns = block
            .alternatives
            .iter()
            .enumerate()
            .map(|(i, alt)| {
                if Some(i) == literal {
                    return None;
                }
                match compile_answer_regex(&alt.answer, case_sensitive) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        tracing::warn!(
                            position = block.position,
                            alternative = i,
                            "ignoring invalid regular expression: {e}"
                        );
                        None
                    }
                }
            })
            .collect();
        Self {
            weight: block.weight,
            max_fraction: best_fraction(block),
            case_sensitive,
            alternatives: block.alternatives.clone(),
            literal,
            patterns,
        }
    }

    fn matching(&self, given: &str) -> Option<usize> {
        let given = collapse_whitespace(given);
        (0..self.alternatives.len()).find(|&i| {
            if Some(i) == self.literal {
                let expected = collapse_whitespace(&self.alternatives[i].answer);
                if self.case_sensitive {
                    expected == given
                } else {
                    expected.to_lowercase() == given.to_lowercase()
                }
            } else {
                self.patterns[i]
                    .as_ref()
                    .is_some_and(|re| re.is_match(&given))
            }
        })
    }
}

/// The alternative a regular-expression sub-question treats as plain text.
pub(crate) fn model_answer_index(alternatives: &[AlternativeAnswer]) -> Option<usize> {
    alternatives.iter().position(|a| a.fraction >= 1.0)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Subquestion for RegexpAnswer {
    fn name(&self) -> &str {
        "regexp"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn response_keys(&self) -> Vec<String> {
        vec![ANSWER_KEY.to_string()]
    }

    fn is_gradable_response(&self, response: &Response) -> bool {
        !typed_answer(response).is_empty()
    }

    fn is_complete_response(&self, response: &Response) -> bool {
        self.is_gradable_response(response)
    }

    fn grade_response(&self, response: &Response) -> SubquestionResult {
        let fraction = self
            .matching(typed_answer(response))
            .map(|i| self.alternatives[i].fraction)
            .unwrap_or(0.0);
        SubquestionResult::from_fraction(fraction)
    }

    fn summarise_response(&self, response: &Response) -> String {
        typed_answer(response).to_string()
    }

    fn classify_response(&self, response: &Response) -> Vec<ClassifiedResponse> {
        let given = typed_answer(response);
        classify_typed(&self.alternatives, given, self.matching(given))
    }

    fn correct_response(&self) -> Response {
        self.literal
            .map(|i| single_key_response(self.alternatives[i].answer.clone()))
            .unwrap_or_default()
    }

    fn max_fraction(&self) -> f64 {
        self.max_fraction
    }
}

// ---------------------------------------------------------------------------
// Numerical
// ---------------------------------------------------------------------------

/// Typed number compared against each alternative within its tolerance.
pub struct Numerical {
    weight: f64,
    max_fraction: f64,
    alternatives: Vec<AlternativeAnswer>,
}

impl Numerical {
    pub fn new(block: &MarkerBlock) -> Self {
        Self {
            weight: block.weight,
            max_fraction: best_fraction(block),
            alternatives: block.alternatives.clone(),
        }
    }

    fn matching(&self, given: &str) -> Option<usize> {
        let value = parse_number(given);
        self.alternatives.iter().position(|alt| {
            let answer = alt.answer.trim();
            if answer == "*" {
                return true;
            }
            match (value, parse_number(answer)) {
                (Some(value), Some(expected)) => {
                    let tolerance = alt.tolerance.unwrap_or(0.0).abs()
                        + 1e-12 * expected.abs().max(1.0);
                    expected - tolerance <= value && value <= expected + tolerance
                }
                _ => false,
            }
        })
    }
}

impl Subquestion for Numerical {
    fn name(&self) -> &str {
        "numerical"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn response_keys(&self) -> Vec<String> {
        vec![ANSWER_KEY.to_string()]
    }

    fn is_gradable_response(&self, response: &Response) -> bool {
        !typed_answer(response).is_empty()
    }

    fn is_complete_response(&self, response: &Response) -> bool {
        self.is_gradable_response(response)
    }

    fn grade_response(&self, response: &Response) -> SubquestionResult {
        let fraction = self
            .matching(typed_answer(response))
            .map(|i| self.alternatives[i].fraction)
            .unwrap_or(0.0);
        SubquestionResult::from_fraction(fraction)
    }

    fn summarise_response(&self, response: &Response) -> String {
        typed_answer(response).to_string()
    }

    fn classify_response(&self, response: &Response) -> Vec<ClassifiedResponse> {
        let given = typed_answer(response);
        classify_typed(&self.alternatives, given, self.matching(given))
    }

    fn correct_response(&self) -> Response {
        best_alternative(&self.alternatives)
            .map(|i| single_key_response(self.alternatives[i].answer.clone()))
            .unwrap_or_default()
    }

    fn max_fraction(&self) -> f64 {
        self.max_fraction
    }
}

// ---------------------------------------------------------------------------
// Multiple choice, one answer
// ---------------------------------------------------------------------------

/// One choice selected by index; `-1` or a missing value means no choice.
pub struct MultiChoice {
    weight: f64,
    max_fraction: f64,
    layout: Layout,
    alternatives: Vec<AlternativeAnswer>,
}

impl MultiChoice {
    pub fn new(block: &MarkerBlock, layout: Layout) -> Self {
        Self {
            weight: block.weight,
            max_fraction: best_fraction(block),
            layout,
            alternatives: block.alternatives.clone(),
        }
    }

    fn chosen(&self, response: &Response) -> Option<usize> {
        typed_answer(response)
            .parse::<usize>()
            .ok()
            .filter(|i| *i < self.alternatives.len())
    }
}

impl Subquestion for MultiChoice {
    fn name(&self) -> &str {
        "multichoice"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn layout(&self) -> Option<Layout> {
        Some(self.layout)
    }

    fn response_keys(&self) -> Vec<String> {
        vec![ANSWER_KEY.to_string()]
    }

    fn is_gradable_response(&self, response: &Response) -> bool {
        self.chosen(response).is_some()
    }

    fn is_complete_response(&self, response: &Response) -> bool {
        self.is_gradable_response(response)
    }

    fn grade_response(&self, response: &Response) -> SubquestionResult {
        let fraction = self
            .chosen(response)
            .map(|i| self.alternatives[i].fraction)
            .unwrap_or(0.0);
        SubquestionResult::from_fraction(fraction)
    }

    fn summarise_response(&self, response: &Response) -> String {
        self.chosen(response)
            .map(|i| self.alternatives[i].answer.clone())
            .unwrap_or_default()
    }

    fn classify_response(&self, response: &Response) -> Vec<ClassifiedResponse> {
        self.chosen(response)
            .map(|i| ClassifiedResponse {
                alternative: Some(i),
                response: self.alternatives[i].answer.clone(),
                fraction: self.alternatives[i].fraction,
            })
            .into_iter()
            .collect()
    }

    fn correct_response(&self) -> Response {
        best_alternative(&self.alternatives)
            .map(|i| single_key_response(i.to_string()))
            .unwrap_or_default()
    }

    fn summary_placeholder(&self) -> String {
        choice_list(&self.alternatives)
    }

    fn max_fraction(&self) -> f64 {
        self.max_fraction
    }
}

fn choice_list(alternatives: &[AlternativeAnswer]) -> String {
    let choices: Vec<&str> = alternatives.iter().map(|a| a.answer.as_str()).collect();
    format!("{{{}}}", choices.join("; "))
}

// ---------------------------------------------------------------------------
// Multiple choice, several answers
// ---------------------------------------------------------------------------

/// Checkboxes `choice0`, `choice1`, ... ticked with the value `1`.
pub struct MultiResponse {
    weight: f64,
    max_fraction: f64,
    layout: Layout,
    alternatives: Vec<AlternativeAnswer>,
}

impl MultiResponse {
    pub fn new(block: &MarkerBlock, layout: Layout) -> Self {
        Self {
            weight: block.weight,
            max_fraction: block
                .alternatives
                .iter()
                .map(|a| a.fraction)
                .filter(|f| *f > 0.0)
                .sum::<f64>()
                .min(1.0),
            layout,
            alternatives: block.alternatives.clone(),
        }
    }

    fn choice_key(i: usize) -> String {
        format!("choice{i}")
    }

    fn selected(&self, response: &Response) -> Vec<usize> {
        (0..self.alternatives.len())
            .filter(|i| response.get(&Self::choice_key(*i)).map(String::as_str) == Some("1"))
            .collect()
    }
}

impl Subquestion for MultiResponse {
    fn name(&self) -> &str {
        "multichoice"
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn layout(&self) -> Option<Layout> {
        Some(self.layout)
    }

    fn response_keys(&self) -> Vec<String> {
        (0..self.alternatives.len()).map(Self::choice_key).collect()
    }

    fn is_gradable_response(&self, response: &Response) -> bool {
        !self.selected(response).is_empty()
    }

    fn is_complete_response(&self, response: &Response) -> bool {
        self.is_gradable_response(response)
    }

    fn grade_response(&self, response: &Response) -> SubquestionResult {
        let fraction: f64 = self
            .selected(response)
            .into_iter()
            .map(|i| self.alternatives[i].fraction)
            .sum();
        SubquestionResult::from_fraction(fraction)
    }

    fn summarise_response(&self, response: &Response) -> String {
        self.selected(response)
            .into_iter()
            .map(|i| self.alternatives[i].answer.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn classify_response(&self, response: &Response) -> Vec<ClassifiedResponse> {
        self.selected(response)
            .into_iter()
            .map(|i| ClassifiedResponse {
                alternative: Some(i),
                response: self.alternatives[i].answer.clone(),
                fraction: self.alternatives[i].fraction,
            })
            .collect()
    }

    fn correct_response(&self) -> Response {
        self.alternatives
            .iter()
            .enumerate()
            .filter(|(_, alt)| alt.fraction > 0.0)
            .map(|(i, _)| (Self::choice_key(i), "1".to_string()))
            .collect()
    }

    fn summary_placeholder(&self) -> String {
        choice_list(&self.alternatives)
    }

    fn max_fraction(&self) -> f64 {
        self.max_fraction
    }
}

// ---------------------------------------------------------------------------
// Missing child question
// ---------------------------------------------------------------------------

/// Stand-in for a child question that no longer exists in storage.
///
/// It can never be answered, so a parent that contains one can never be
/// graded as right.
#[derive(Debug, Default)]
pub struct DeletedSubquestion;

impl Subquestion for DeletedSubquestion {
    fn name(&self) -> &str {
        "subquestion_replacement"
    }

    fn weight(&self) -> f64 {
        1.0
    }

    fn response_keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_gradable_response(&self, _: &Response) -> bool {
        false
    }

    fn is_complete_response(&self, _: &Response) -> bool {
        false
    }

    fn is_same_response(&self, _: &Response, _: &Response) -> bool {
        false
    }

    fn grade_response(&self, _: &Response) -> SubquestionResult {
        SubquestionResult {
            fraction: 0.0,
            state: QuestionState::GaveUp,
        }
    }

    fn summarise_response(&self, _: &Response) -> String {
        String::new()
    }

    fn classify_response(&self, _: &Response) -> Vec<ClassifiedResponse> {
        Vec::new()
    }

    fn correct_response(&self) -> Response {
        Response::new()
    }

    fn summary_placeholder(&self) -> String {
        "{ERR unknown sub-question type}".to_string()
    }

    fn max_fraction(&self) -> f64 {
        0.0
    }
}
