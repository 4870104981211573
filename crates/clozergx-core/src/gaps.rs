//! Automatic gap insertion and removal.
//!
//! [`insert_gaps`] turns every Nth word of a set of paragraphs into a
//! one-answer short-answer marker such as `{1:SA:=jumps}`; [`remove_gaps`]
//! strips exactly that marker shape back to its word.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::model::escape_marker_text;

/// Why gaps could not be inserted. The input is left untouched in all cases.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GapError {
    #[error("this question text already has gaps")]
    AlreadyHasGaps,

    #[error("not enough text to create gaps every {interval} words")]
    TooShort { interval: usize },

    #[error("the gap interval must be at least 1")]
    InvalidInterval,
}

static EXISTING_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^}]*\}").unwrap());

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").unwrap());

static GAP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\d+:SA:=((?:[^~#}\\]|\\[}#])+)\}").unwrap());

/// A token ending in an HTML entity, possibly followed by punctuation.
static TRAILING_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#?[A-Za-z0-9]+;[.,!?;:]*$").unwrap());

const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':'];

/// A whitespace-separated token split into the part that may be gapped and
/// its trailing punctuation.
struct Word<'a> {
    core: &'a str,
    punctuation: &'a str,
}

impl<'a> Word<'a> {
    /// `None` for tokens that are never counted or gapped: HTML tag
    /// fragments, tokens ending in an entity, bare punctuation, and words
    /// that would break a marker.
    fn from_token(token: &'a str) -> Option<Self> {
        if token.contains(['<', '>', '\\']) || TRAILING_ENTITY.is_match(token) {
            return None;
        }
        let core = token.trim_end_matches(TRAILING_PUNCTUATION);
        if core.is_empty() || core.contains('~') || core.ends_with('&') {
            return None;
        }
        Some(Self {
            core,
            punctuation: &token[core.len()..],
        })
    }

    fn is_capitalized(&self) -> bool {
        self.core.chars().next().is_some_and(char::is_uppercase)
    }

    fn gapped(&self) -> String {
        format!("{{1:SA:={}}}{}", escape_marker_text(self.core), self.punctuation)
    }
}

fn word_count(paragraph: &str) -> usize {
    WORD.find_iter(paragraph)
        .filter(|m| Word::from_token(m.as_str()).is_some())
        .count()
}

/// Gap every `interval`-th word of each paragraph.
///
/// The word counter restarts in each paragraph. With `skip_capitalized`,
/// capitalised words are passed over without advancing the counter, unless
/// the same word, ignoring case, was already gapped earlier in this pass.
/// Such a word is gapped without advancing the counter.
pub fn insert_gaps<S: AsRef<str>>(
    paragraphs: &[S],
    interval: usize,
    skip_capitalized: bool,
) -> Result<Vec<String>, GapError> {
    if interval == 0 {
        return Err(GapError::InvalidInterval);
    }
    if paragraphs
        .iter()
        .any(|p| EXISTING_MARKER.is_match(p.as_ref()))
    {
        return Err(GapError::AlreadyHasGaps);
    }
    if !paragraphs
        .iter()
        .any(|p| word_count(p.as_ref()) > interval)
    {
        return Err(GapError::TooShort { interval });
    }

    let mut used: HashSet<String> = HashSet::new();
    let mut gaps = 0usize;
    let out = paragraphs
        .iter()
        .map(|paragraph| {
            let paragraph = paragraph.as_ref();
            let mut out = String::with_capacity(paragraph.len() + 16);
            let mut last = 0;
            let mut counter = 0usize;

            for m in WORD.find_iter(paragraph) {
                out.push_str(&paragraph[last..m.start()]);
                last = m.end();

                let Some(word) = Word::from_token(m.as_str()) else {
                    out.push_str(m.as_str());
                    continue;
                };

                if skip_capitalized && word.is_capitalized() {
                    if used.contains(&word.core.to_lowercase()) {
                        out.push_str(&word.gapped());
                        gaps += 1;
                    } else {
                        out.push_str(m.as_str());
                    }
                    continue;
                }

                counter += 1;
                if counter % interval == 0 {
                    out.push_str(&word.gapped());
                    used.insert(word.core.to_lowercase());
                    gaps += 1;
                } else {
                    out.push_str(m.as_str());
                }
            }
            out.push_str(&paragraph[last..]);
            out
        })
        .collect();

    tracing::debug!(interval, gaps, "inserted gaps");
    Ok(out)
}

/// Replace every `{n:SA:=word}` marker with its word. Any other text,
/// including markers with several alternatives or feedback, is kept.
pub fn remove_gaps<S: AsRef<str>>(paragraphs: &[S]) -> Vec<String> {
    paragraphs
        .iter()
        .map(|p| {
            GAP.replace_all(p.as_ref(), |caps: &Captures| {
                caps[1].replace("\\}", "}").replace("\\#", "#")
            })
            .into_owned()
        })
        .collect()
}
