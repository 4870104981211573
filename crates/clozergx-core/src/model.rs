//! Core data model types for clozergx.
//!
//! These are the types the parser produces and the graders consume:
//! marker blocks with their alternatives, the parsed question, and the
//! per-attempt results the aggregator combines.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How the choices of a multiple-choice sub-question are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// Drop-down menu inline in the text.
    Dropdown,
    /// Vertical column of radio buttons or checkboxes.
    Vertical,
    /// Horizontal row of radio buttons or checkboxes.
    Horizontal,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Dropdown => write!(f, "dropdown"),
            Layout::Vertical => write!(f, "vertical"),
            Layout::Horizontal => write!(f, "horizontal"),
        }
    }
}

/// The kind of sub-question a marker block defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SubquestionKind {
    Numerical,
    ShortAnswer { case_sensitive: bool },
    Regexp { case_sensitive: bool },
    MultiChoice { layout: Layout, shuffle: bool },
    MultiResponse { layout: Layout, shuffle: bool },
}

/// Type tags recognised inside a marker block, long alias first.
const TYPE_TAGS: &[(&[&str], SubquestionKind)] = &[
    (&["NUMERICAL", "NM"], SubquestionKind::Numerical),
    (
        &["MULTICHOICE", "MC"],
        SubquestionKind::MultiChoice {
            layout: Layout::Dropdown,
            shuffle: false,
        },
    ),
    (
        &["MULTICHOICE_V", "MCV"],
        SubquestionKind::MultiChoice {
            layout: Layout::Vertical,
            shuffle: false,
        },
    ),
    (
        &["MULTICHOICE_H", "MCH"],
        SubquestionKind::MultiChoice {
            layout: Layout::Horizontal,
            shuffle: false,
        },
    ),
    (
        &["SHORTANSWER", "SA", "MW"],
        SubquestionKind::ShortAnswer {
            case_sensitive: false,
        },
    ),
    (
        &["SHORTANSWER_C", "SAC", "MWC"],
        SubquestionKind::ShortAnswer {
            case_sensitive: true,
        },
    ),
    (
        &["REGEXP", "RX"],
        SubquestionKind::Regexp {
            case_sensitive: false,
        },
    ),
    (
        &["REGEXP_C", "RXC"],
        SubquestionKind::Regexp {
            case_sensitive: true,
        },
    ),
    (
        &["MULTICHOICE_S", "MCS"],
        SubquestionKind::MultiChoice {
            layout: Layout::Dropdown,
            shuffle: true,
        },
    ),
    (
        &["MULTICHOICE_VS", "MCVS"],
        SubquestionKind::MultiChoice {
            layout: Layout::Vertical,
            shuffle: true,
        },
    ),
    (
        &["MULTICHOICE_HS", "MCHS"],
        SubquestionKind::MultiChoice {
            layout: Layout::Horizontal,
            shuffle: true,
        },
    ),
    (
        &["MULTIRESPONSE", "MR"],
        SubquestionKind::MultiResponse {
            layout: Layout::Vertical,
            shuffle: false,
        },
    ),
    (
        &["MULTIRESPONSE_H", "MRH"],
        SubquestionKind::MultiResponse {
            layout: Layout::Horizontal,
            shuffle: false,
        },
    ),
    (
        &["MULTIRESPONSE_S", "MRS"],
        SubquestionKind::MultiResponse {
            layout: Layout::Vertical,
            shuffle: true,
        },
    ),
    (
        &["MULTIRESPONSE_HS", "MRHS"],
        SubquestionKind::MultiResponse {
            layout: Layout::Horizontal,
            shuffle: true,
        },
    ),
];

impl SubquestionKind {
    /// Look up a type tag. Matching is case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Self> {
        TYPE_TAGS
            .iter()
            .find(|(aliases, _)| aliases.contains(&tag))
            .map(|(_, kind)| *kind)
    }

    fn aliases(&self) -> &'static [&'static str] {
        TYPE_TAGS
            .iter()
            .find(|(_, kind)| kind == self)
            .map(|(aliases, _)| *aliases)
            .unwrap_or(&[])
    }

    /// The long form of the type tag (e.g. `MULTICHOICE_V`).
    pub fn tag(&self) -> &'static str {
        self.aliases().first().copied().unwrap_or("")
    }

    /// The shortest alias of the type tag (e.g. `MCV`).
    pub fn short_tag(&self) -> &'static str {
        self.aliases().get(1).copied().unwrap_or_else(|| self.tag())
    }

    /// Multiple choice or multiple response.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            SubquestionKind::MultiChoice { .. } | SubquestionKind::MultiResponse { .. }
        )
    }

    /// Kinds where several alternatives may be credited at once.
    pub fn is_multi_response(&self) -> bool {
        matches!(self, SubquestionKind::MultiResponse { .. })
    }
}

impl fmt::Display for SubquestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for SubquestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubquestionKind::from_tag(s).ok_or_else(|| format!("unknown question type: {s}"))
    }
}

/// One `~`-separated clause inside a marker block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeAnswer {
    /// Literal answer, wildcard pattern or regular expression.
    pub answer: String,
    /// Credit for this answer, signed, in [-1, 1].
    pub fraction: f64,
    /// Feedback shown when this answer is chosen. May be empty.
    #[serde(default)]
    pub feedback: String,
    /// Absolute error margin. Only set for numerical sub-questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

/// One `{...}` span of the question text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerBlock {
    /// 1-based ordinal among all markers, the `n` of `{#n}`.
    pub position: usize,
    /// Grade weight of this sub-question.
    pub weight: f64,
    pub kind: SubquestionKind,
    pub alternatives: Vec<AlternativeAnswer>,
    /// The marker exactly as written in the source text.
    #[serde(default)]
    pub source: String,
}

impl MarkerBlock {
    /// Regenerate canonical marker text from the parsed fields.
    ///
    /// Unlike [`MarkerBlock::source`] this does not preserve the original
    /// spelling (aliases, entities); it is what a block built in code looks
    /// like when written out. Parsing the result gives back the same
    /// alternatives, whatever characters the answers and feedback hold.
    pub fn to_marker_text(&self) -> String {
        let alternatives = self
            .alternatives
            .iter()
            .map(|alt| {
                let mut out = String::new();
                if alt.fraction == 1.0 {
                    out.push('=');
                } else if alt.fraction != 0.0 {
                    out.push_str(&format!("%{}%", format_number(alt.fraction * 100.0)));
                }
                out.push_str(&encode_answer(&alt.answer));
                if let Some(tolerance) = alt.tolerance.filter(|t| *t != 0.0) {
                    out.push_str(&format!(":{}", format_number(tolerance)));
                }
                if !alt.feedback.is_empty() {
                    out.push('#');
                    out.push_str(&encode_marker_text(&alt.feedback));
                }
                out
            })
            .collect::<Vec<_>>()
            .join("~");

        format!(
            "{{{}:{}:{}}}",
            format_number(self.weight),
            self.kind.short_tag(),
            alternatives
        )
    }

    /// Highest credit any single alternative carries.
    pub fn max_alternative_fraction(&self) -> f64 {
        self.alternatives
            .iter()
            .map(|a| a.fraction)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Escape the characters that would otherwise end an answer or feedback.
pub(crate) fn escape_marker_text(s: &str) -> String {
    s.replace('}', "\\}").replace('#', "\\#")
}

/// Write answer or feedback text so that the parser reads it back unchanged.
///
/// `}` and `#` get the backslash escape; `&`, `~` and `\` become numeric
/// entities, which the parser decodes before anything else.
fn encode_marker_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&#38;"),
            '~' => out.push_str("&#126;"),
            '\\' => out.push_str("&#92;"),
            '}' => out.push_str("\\}"),
            '#' => out.push_str("\\#"),
            _ => out.push(c),
        }
    }
    out
}

/// Like [`encode_marker_text`], also hiding a leading `=` or `%` that would
/// read as a fraction.
fn encode_answer(s: &str) -> String {
    let encoded = encode_marker_text(s);
    match encoded.chars().next() {
        Some('=') => format!("&#61;{}", &encoded[1..]),
        Some('%') => format!("&#37;{}", &encoded[1..]),
        _ => encoded,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Result of parsing a question text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuestion {
    /// Literal text between markers. One more entry than there are blocks:
    /// entry 0 precedes the first marker, entry `i` follows block `i`.
    pub fragments: Vec<String>,
    /// Marker blocks keyed by position.
    pub blocks: BTreeMap<usize, MarkerBlock>,
    /// Sum of all block weights.
    pub total_weight: f64,
}

impl ParsedQuestion {
    /// The stored form of the question text, with `{#n}` placeholders.
    pub fn placeholder_text(&self) -> String {
        self.join_with(|position, _| format!("{{#{position}}}"))
    }

    /// The editable form of the question text, with every placeholder
    /// replaced by its block's original marker text.
    pub fn reconstruct(&self) -> String {
        self.join_with(|_, block| block.source.clone())
    }

    /// Like [`ParsedQuestion::reconstruct`], using regenerated marker text.
    pub fn to_canonical_text(&self) -> String {
        self.join_with(|_, block| block.to_marker_text())
    }

    fn join_with(&self, marker: impl Fn(usize, &MarkerBlock) -> String) -> String {
        let mut out = String::new();
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                if let Some(block) = self.blocks.get(&i) {
                    out.push_str(&marker(i, block));
                }
            }
            out.push_str(fragment);
        }
        out
    }
}

/// Grading state of a sub-question or of the whole question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionState {
    Unanswered,
    GaveUp,
    GradedWrong,
    GradedPartial,
    GradedRight,
    /// Nothing could be graded and no sub-question state was combined.
    Finished,
}

impl QuestionState {
    /// The graded state for a fraction in [0, 1].
    pub fn graded_for_fraction(fraction: f64) -> Self {
        if fraction < 0.000_000_1 {
            QuestionState::GradedWrong
        } else if fraction > 0.999_999_9 {
            QuestionState::GradedRight
        } else {
            QuestionState::GradedPartial
        }
    }
}

impl fmt::Display for QuestionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QuestionState::Unanswered => "unanswered",
            QuestionState::GaveUp => "gave up",
            QuestionState::GradedWrong => "incorrect",
            QuestionState::GradedPartial => "partially correct",
            QuestionState::GradedRight => "correct",
            QuestionState::Finished => "finished",
        };
        write!(f, "{s}")
    }
}

/// A sub-question's grade for one response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubquestionResult {
    /// Normalised score in [0, 1].
    pub fraction: f64,
    pub state: QuestionState,
}

impl SubquestionResult {
    /// Clamp `fraction` into [0, 1] and derive the graded state from it.
    pub fn from_fraction(fraction: f64) -> Self {
        let fraction = fraction.clamp(0.0, 1.0);
        Self {
            fraction,
            state: QuestionState::graded_for_fraction(fraction),
        }
    }
}

/// The combined grade of all sub-questions for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverallResult {
    /// Weighted fraction, `None` when nothing was gradable.
    pub fraction: Option<f64>,
    pub state: QuestionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_lookup_is_case_sensitive() {
        assert_eq!(SubquestionKind::from_tag("NM"), Some(SubquestionKind::Numerical));
        assert_eq!(
            SubquestionKind::from_tag("MWC"),
            Some(SubquestionKind::ShortAnswer {
                case_sensitive: true
            })
        );
        assert_eq!(
            SubquestionKind::from_tag("MRHS"),
            Some(SubquestionKind::MultiResponse {
                layout: Layout::Horizontal,
                shuffle: true
            })
        );
        assert!(SubquestionKind::from_tag("sa").is_none());
        assert!("MULTICHOICE_X".parse::<SubquestionKind>().is_err());
    }

    #[test]
    fn kind_display_and_short_tag() {
        let kind = SubquestionKind::MultiChoice {
            layout: Layout::Vertical,
            shuffle: true,
        };
        assert_eq!(kind.to_string(), "MULTICHOICE_VS");
        assert_eq!(kind.short_tag(), "MCVS");
        assert!(kind.is_choice());
        assert!(!kind.is_multi_response());
    }

    #[test]
    fn every_alias_round_trips_to_its_long_tag() {
        for (aliases, kind) in TYPE_TAGS {
            for alias in *aliases {
                assert_eq!(SubquestionKind::from_tag(alias).unwrap().tag(), aliases[0]);
            }
            assert_eq!(kind.tag(), aliases[0]);
        }
    }

    #[test]
    fn marker_text_escapes_and_formats() {
        let block = MarkerBlock {
            position: 1,
            weight: 2.0,
            kind: SubquestionKind::Numerical,
            alternatives: vec![
                AlternativeAnswer {
                    answer: "3.14".into(),
                    fraction: 1.0,
                    feedback: "use #pi}".into(),
                    tolerance: Some(0.01),
                },
                AlternativeAnswer {
                    answer: "3".into(),
                    fraction: 0.5,
                    feedback: String::new(),
                    tolerance: Some(0.0),
                },
            ],
            source: String::new(),
        };
        assert_eq!(
            block.to_marker_text(),
            "{2:NM:=3.14:0.01#use \\#pi\\}~%50%3}"
        );
    }

    #[test]
    fn canonical_text_survives_awkward_characters() {
        let alternative = |answer: &str, fraction: f64, feedback: &str| AlternativeAnswer {
            answer: answer.into(),
            fraction,
            feedback: feedback.into(),
            tolerance: None,
        };
        let block = MarkerBlock {
            position: 1,
            weight: 1.0,
            kind: SubquestionKind::ShortAnswer {
                case_sensitive: true,
            },
            alternatives: vec![
                alternative("a~b", 1.0, "x~y}"),
                alternative("&lt; stays literal", 0.5, "AT&T"),
                alternative("ends with \\", 0.0, "ends with \\"),
                alternative("tail&", 0.0, ""),
                alternative("=not a fraction", 0.0, ""),
                alternative("%50% neither", 0.0, "C# {x}"),
            ],
            source: String::new(),
        };
        let parsed = crate::parser::parse(&block.to_marker_text()).unwrap();
        assert_eq!(parsed.blocks[&1].alternatives, block.alternatives);
    }

    #[test]
    fn state_for_fraction_thresholds() {
        assert_eq!(QuestionState::graded_for_fraction(0.0), QuestionState::GradedWrong);
        assert_eq!(QuestionState::graded_for_fraction(0.5), QuestionState::GradedPartial);
        assert_eq!(QuestionState::graded_for_fraction(1.0), QuestionState::GradedRight);
        assert_eq!(SubquestionResult::from_fraction(-0.3).fraction, 0.0);
        assert_eq!(SubquestionResult::from_fraction(1.7).state, QuestionState::GradedRight);
    }

    #[test]
    fn parsed_question_serde_roundtrip() {
        let mut blocks = BTreeMap::new();
        blocks.insert(
            1,
            MarkerBlock {
                position: 1,
                weight: 1.0,
                kind: SubquestionKind::ShortAnswer {
                    case_sensitive: false,
                },
                alternatives: vec![AlternativeAnswer {
                    answer: "cat".into(),
                    fraction: 1.0,
                    feedback: String::new(),
                    tolerance: None,
                }],
                source: "{1:SA:=cat}".into(),
            },
        );
        let parsed = ParsedQuestion {
            fragments: vec!["The ".into(), " sat.".into()],
            blocks,
            total_weight: 1.0,
        };
        let json = serde_json::to_string(&parsed).unwrap();
        let back: ParsedQuestion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, parsed);
        assert_eq!(back.placeholder_text(), "The {#1} sat.");
        assert_eq!(back.reconstruct(), "The {1:SA:=cat} sat.");
    }
}
