//! Marker-text parser.
//!
//! Turns question text such as `The {1:SA:=cat} sat on the {1:SA:=mat}.`
//! into a [`ParsedQuestion`], and splits stored `{#n}` placeholder text back
//! into fragments.
//!
//! The grammar of one marker block is
//!
//! ```text
//! marker   = "{" weight? ":" tag ":" alt ("~" alt)* "}"
//! alt      = fraction? answer ("#" feedback)?
//! fraction = "=" | "%" "-"? digits ([.,] digits*)? "%"
//! ```
//!
//! The scanner is a single forward pass. A candidate `{` can only be
//! rejected while its weight and type tag are read; after that it either
//! closes or runs off the end of the text, which ends the whole scan. No
//! byte is read by more than one candidate past its tag.

use std::collections::BTreeMap;

use crate::error::ClozeError;
use crate::model::{AlternativeAnswer, MarkerBlock, ParsedQuestion, SubquestionKind};

/// Default upper bound on the length of a question text, in bytes.
pub const DEFAULT_MAX_TEXT_LEN: usize = 1 << 20;

/// Limits applied while parsing.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Texts longer than this are rejected with [`ClozeError::TextTooLong`].
    pub max_text_len: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

/// Parse question text with the default limits.
pub fn parse(text: &str) -> Result<ParsedQuestion, ClozeError> {
    parse_with(text, &ParseOptions::default())
}

/// Parse question text into fragments and marker blocks.
pub fn parse_with(text: &str, options: &ParseOptions) -> Result<ParsedQuestion, ClozeError> {
    if text.len() > options.max_text_len {
        return Err(ClozeError::TextTooLong {
            len: text.len(),
            max: options.max_text_len,
        });
    }

    let mut fragments = Vec::new();
    let mut blocks = BTreeMap::new();
    let mut literal_start = 0;
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        match scan_marker(text, start) {
            Scan::Marker(raw) => {
                let position = blocks.len() + 1;
                let block = raw.to_block(text, position)?;
                fragments.push(text[literal_start..start].to_string());
                literal_start = raw.end;
                search_from = raw.end;
                blocks.insert(position, block);
            }
            Scan::NoMatch => search_from = start + 1,
            Scan::Exhausted => break,
        }
    }
    fragments.push(text[literal_start..].to_string());

    let total_weight: f64 = blocks.values().map(|b: &MarkerBlock| b.weight).sum();
    tracing::debug!(
        markers = blocks.len(),
        total_weight,
        "parsed question text"
    );

    Ok(ParsedQuestion {
        fragments,
        blocks,
        total_weight,
    })
}

/// Split stored question text on its `{#n}` placeholders.
///
/// Returns the literal fragments (one more than the placeholders) and the
/// position number named by each placeholder, in order of appearance.
pub fn split_placeholders(text: &str) -> (Vec<String>, Vec<usize>) {
    let bytes = text.as_bytes();
    let mut fragments = Vec::new();
    let mut positions = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'#' {
            let digits_start = i + 2;
            let digits_end = skip_digits(bytes, digits_start);
            if digits_end > digits_start && bytes.get(digits_end) == Some(&b'}') {
                if let Ok(position) = text[digits_start..digits_end].parse::<usize>() {
                    fragments.push(text[literal_start..i].to_string());
                    positions.push(position);
                    i = digits_end + 1;
                    literal_start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    fragments.push(text[literal_start..].to_string());

    (fragments, positions)
}

enum Scan<'a> {
    Marker(RawMarker<'a>),
    /// This `{` does not start a marker; keep looking after it.
    NoMatch,
    /// The text ended inside a candidate marker; nothing further can match.
    Exhausted,
}

struct RawMarker<'a> {
    start: usize,
    end: usize,
    weight: &'a str,
    tag: &'a str,
    alternatives: Vec<RawAlternative<'a>>,
}

struct RawAlternative<'a> {
    fraction: RawFraction<'a>,
    answer: &'a str,
    feedback: Option<&'a str>,
}

enum RawFraction<'a> {
    None,
    Full,
    Percent(&'a str),
}

impl<'a> RawMarker<'a> {
    fn to_block(&self, text: &str, position: usize) -> Result<MarkerBlock, ClozeError> {
        let kind = SubquestionKind::from_tag(self.tag).ok_or_else(|| {
            ClozeError::UnknownQuestionType {
                tag: self.tag.to_string(),
                position,
            }
        })?;

        let weight = if self.weight.is_empty() {
            1.0
        } else {
            self.weight.parse::<f64>().unwrap_or(1.0)
        };

        let mut has_specific_fraction = false;
        let mut alternatives: Vec<AlternativeAnswer> = self
            .alternatives
            .iter()
            .map(|alt| {
                let fraction = match alt.fraction {
                    RawFraction::Full => 1.0,
                    RawFraction::Percent(pct) => {
                        has_specific_fraction = true;
                        pct.replace(',', ".").parse::<f64>().unwrap_or(0.0) / 100.0
                    }
                    RawFraction::None => 0.0,
                };
                let feedback = alt.feedback.map(unescape).unwrap_or_default();

                if kind == SubquestionKind::Numerical {
                    if let Some((number, tolerance)) = split_numerical_answer(alt.answer) {
                        return AlternativeAnswer {
                            answer: number.to_string(),
                            fraction,
                            feedback,
                            tolerance: Some(
                                tolerance
                                    .and_then(parse_number)
                                    .map(f64::abs)
                                    .unwrap_or(0.0),
                            ),
                        };
                    }
                }

                AlternativeAnswer {
                    answer: unescape(alt.answer),
                    fraction,
                    feedback,
                    tolerance: (kind == SubquestionKind::Numerical).then_some(0.0),
                }
            })
            .collect();

        if kind.is_multi_response() {
            normalise_multi_response(&mut alternatives, has_specific_fraction);
        }

        Ok(MarkerBlock {
            position,
            weight,
            kind,
            alternatives,
            source: text[self.start..self.end].to_string(),
        })
    }
}

/// Scale positive fractions so they sum to 1. Without explicit fractions
/// every other alternative is set so that ticking all of them cancels out
/// one correct choice.
fn normalise_multi_response(alternatives: &mut [AlternativeAnswer], has_specific_fraction: bool) {
    let total: f64 = alternatives
        .iter()
        .map(|a| a.fraction)
        .filter(|f| *f > 0.0)
        .sum();
    if total == 0.0 {
        return;
    }
    for alt in alternatives.iter_mut() {
        if alt.fraction > 0.0 {
            alt.fraction /= total;
        } else if !has_specific_fraction {
            alt.fraction = -1.0 / total;
        }
    }
}

fn scan_marker(text: &str, start: usize) -> Scan<'_> {
    let bytes = text.as_bytes();
    let mut i = start + 1;

    let weight_end = skip_digits(bytes, i);
    let weight = &text[i..weight_end];
    i = weight_end;
    if bytes.get(i) != Some(&b':') {
        return Scan::NoMatch;
    }
    i += 1;

    let tag_start = i;
    if !bytes.get(i).is_some_and(|b| b.is_ascii_uppercase()) {
        return Scan::NoMatch;
    }
    while bytes
        .get(i)
        .is_some_and(|b| b.is_ascii_uppercase() || *b == b'_')
    {
        i += 1;
    }
    let tag = &text[tag_start..i];
    if bytes.get(i) != Some(&b':') {
        return Scan::NoMatch;
    }
    i += 1;

    // From here on the candidate either closes or runs off the end.
    let mut alternatives = Vec::new();
    loop {
        let (mut fraction, mut answer_start) = scan_fraction(text, i);
        if !matches!(fraction, RawFraction::None) && is_terminator_or_end(bytes, answer_start) {
            // A lone `=` or `%50%` is the answer itself.
            fraction = RawFraction::None;
            answer_start = i;
        }

        let answer_end = match find_answer_end(bytes, answer_start) {
            Some(end) => end,
            None => return Scan::Exhausted,
        };
        let answer = &text[answer_start..answer_end];
        i = answer_end;

        let mut feedback = None;
        if bytes[i] == b'#' {
            let feedback_start = i + 1;
            let feedback_end = match find_feedback_end(bytes, feedback_start) {
                Some(end) => end,
                None => return Scan::Exhausted,
            };
            feedback = Some(&text[feedback_start..feedback_end]);
            i = feedback_end;
        }

        alternatives.push(RawAlternative {
            fraction,
            answer,
            feedback,
        });

        match bytes[i] {
            b'~' => i += 1,
            _ => {
                return Scan::Marker(RawMarker {
                    start,
                    end: i + 1,
                    weight,
                    tag,
                    alternatives,
                })
            }
        }
    }
}

fn scan_fraction(text: &str, i: usize) -> (RawFraction<'_>, usize) {
    let bytes = text.as_bytes();
    match bytes.get(i) {
        Some(b'=') => (RawFraction::Full, i + 1),
        Some(b'%') => {
            let start = i + 1;
            let mut j = start;
            if bytes.get(j) == Some(&b'-') {
                j += 1;
            }
            let int_end = skip_digits(bytes, j);
            if int_end == j {
                return (RawFraction::None, i);
            }
            j = int_end;
            if matches!(bytes.get(j), Some(b'.') | Some(b',')) {
                j = skip_digits(bytes, j + 1);
            }
            if bytes.get(j) == Some(&b'%') {
                (RawFraction::Percent(&text[start..j]), j + 1)
            } else {
                (RawFraction::None, i)
            }
        }
        _ => (RawFraction::None, i),
    }
}

fn is_terminator_or_end(bytes: &[u8], i: usize) -> bool {
    bytes.get(i).map_or(true, |b| matches!(b, b'~' | b'#' | b'}'))
}

/// Index of the `~`, `#` or `}` ending an answer that starts at `start`.
///
/// An answer is never empty: its first character is taken as is, even when
/// it is a terminator. A terminator right after `\`, `&` or `&amp;` belongs
/// to the answer.
fn find_answer_end(bytes: &[u8], start: usize) -> Option<usize> {
    (start + 1..bytes.len()).find(|&j| {
        matches!(bytes[j], b'~' | b'#' | b'}') && {
            let before = &bytes[..j];
            !(before.ends_with(b"\\") || before.ends_with(b"&") || before.ends_with(b"&amp;"))
        }
    })
}

/// Index of the `~` or `}` ending a feedback that starts at `start`.
fn find_feedback_end(bytes: &[u8], start: usize) -> Option<usize> {
    (start..bytes.len()).find(|&j| matches!(bytes[j], b'~' | b'}') && bytes[j - 1] != b'\\')
}

fn skip_digits(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(u8::is_ascii_digit) {
        i += 1;
    }
    i
}

/// Length of the number at the start of `s`: `-?(d+[.,]?d*|[.,]d+)([eE][-+]?d+)?`.
fn scan_number(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    if bytes.first() == Some(&b'-') {
        i += 1;
    }
    let int_end = skip_digits(bytes, i);
    if int_end > i {
        i = int_end;
        if matches!(bytes.get(i), Some(b'.') | Some(b',')) {
            i += 1;
        }
        i = skip_digits(bytes, i);
    } else if matches!(bytes.get(i), Some(b'.') | Some(b',')) {
        let frac_end = skip_digits(bytes, i + 1);
        if frac_end == i + 1 {
            return None;
        }
        i = frac_end;
    } else {
        return None;
    }

    if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'-') | Some(b'+')) {
            j += 1;
        }
        let exp_end = skip_digits(bytes, j);
        if exp_end > j {
            i = exp_end;
        }
    }
    Some(i)
}

/// Whether `s` is exactly one number in the marker number syntax.
pub fn is_valid_number(s: &str) -> bool {
    scan_number(s) == Some(s.len())
}

/// Parse a number written with `.` or `,` as decimal separator.
pub fn parse_number(s: &str) -> Option<f64> {
    is_valid_number(s)
        .then(|| s.replace(',', "."))
        .and_then(|n| n.parse::<f64>().ok())
}

/// Split `number[:tolerance]`. `None` if the answer is not in that form.
fn split_numerical_answer(answer: &str) -> Option<(&str, Option<&str>)> {
    let number_len = scan_number(answer)?;
    let (number, rest) = answer.split_at(number_len);
    if rest.is_empty() {
        return Some((number, None));
    }
    let tolerance = rest.strip_prefix(':')?;
    is_valid_number(tolerance).then_some((number, Some(tolerance)))
}

/// Undo HTML-editor quoting and marker escapes in an answer or feedback.
fn unescape(raw: &str) -> String {
    decode_entities(raw).replace("\\}", "}").replace("\\#", "#")
}

/// Decode the HTML entities an editor puts into plain text.
fn decode_entities(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        match candidate.find(';').filter(|&semi| semi <= 10) {
            Some(semi) => match decode_entity(&candidate[1..semi]) {
                Some(c) => {
                    out.push(c);
                    rest = &candidate[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = &candidate[1..];
                }
            },
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse::<u32>().ok()?,
            };
            char::from_u32(value)
        }
    }
}
