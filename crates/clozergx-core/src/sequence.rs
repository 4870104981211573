//! Child-question bookkeeping.
//!
//! A stored cloze question keeps its text with `{#n}` placeholders plus a
//! sequence: the ids of its child questions in position order. Loading the
//! question resolves that sequence against a [`SubquestionStore`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ClozeError;
use crate::grading::ClozeQuestion;
use crate::model::{MarkerBlock, ParsedQuestion};
use crate::parser::split_placeholders;
use crate::subquestion::{build_subquestion, DeletedSubquestion};
use crate::traits::{Subquestion, SubquestionStore};

/// Ordered child question ids; entry `i` is position `i + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence(pub Vec<u64>);

impl Sequence {
    pub fn ids(&self) -> &[u64] {
        &self.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<String> = self.0.iter().map(u64::to_string).collect();
        write!(f, "{}", ids.join(","))
    }
}

impl FromStr for Sequence {
    type Err = ClozeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Sequence::default());
        }
        s.split(',')
            .map(|id| {
                id.trim()
                    .parse::<u64>()
                    .map_err(|_| ClozeError::InvalidSequence(format!("'{}' is not an id", id.trim())))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Sequence)
    }
}

/// In-memory child question storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: HashMap<u64, MarkerBlock>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            blocks: HashMap::new(),
            next_id: 1,
        }
    }

    /// Store a block and return its new id.
    pub fn insert(&mut self, block: MarkerBlock) -> u64 {
        let id = self.next_id.max(1);
        self.next_id = id + 1;
        self.blocks.insert(id, block);
        id
    }

    /// Remove a block, as a host would when a child question is deleted.
    pub fn remove(&mut self, id: u64) -> Option<MarkerBlock> {
        self.blocks.remove(&id)
    }

    /// Store every block of a parsed question and return the sequence.
    pub fn save_all(&mut self, parsed: &ParsedQuestion) -> Sequence {
        Sequence(
            parsed
                .blocks
                .values()
                .map(|block| self.insert(block.clone()))
                .collect(),
        )
    }
}

impl SubquestionStore for MemoryStore {
    fn load(&self, id: u64) -> Option<MarkerBlock> {
        self.blocks.get(&id).cloned()
    }
}

/// Load the graders for a sequence. Ids the store no longer has become
/// [`DeletedSubquestion`] stand-ins.
pub fn resolve_sequence(
    sequence: &Sequence,
    store: &dyn SubquestionStore,
) -> Vec<Box<dyn Subquestion>> {
    sequence
        .ids()
        .iter()
        .enumerate()
        .map(|(i, &id)| match store.load(id) {
            Some(block) => build_subquestion(&block),
            None => {
                tracing::warn!(id, position = i + 1, "sub-question missing, using replacement");
                Box::new(DeletedSubquestion) as Box<dyn Subquestion>
            }
        })
        .collect()
}

impl ClozeQuestion {
    /// Rebuild a question from its stored placeholder text and sequence.
    ///
    /// Placeholders must appear as `{#1}`, `{#2}`, ... in text order. A
    /// placeholder without a matching sequence entry is dropped from the
    /// text.
    pub fn from_stored(
        text: &str,
        sequence: &Sequence,
        store: &dyn SubquestionStore,
        penalty: f64,
    ) -> Result<Self, ClozeError> {
        let (fragments, positions) = split_placeholders(text);
        if let Some((index, &found)) = positions
            .iter()
            .enumerate()
            .find(|(i, p)| **p != i + 1)
        {
            return Err(ClozeError::PlaceholderOrder {
                expected: index + 1,
                found,
            });
        }

        let mut subquestions = resolve_sequence(sequence, store);
        subquestions.truncate(positions.len());

        let mut kept = Vec::with_capacity(subquestions.len() + 1);
        let mut pending = String::new();
        for (i, fragment) in fragments.into_iter().enumerate() {
            pending.push_str(&fragment);
            if i < subquestions.len() || i == positions.len() {
                kept.push(std::mem::take(&mut pending));
            }
        }

        Ok(ClozeQuestion::new(kept, subquestions, penalty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grading::DEFAULT_PENALTY;
    use crate::model::QuestionState;
    use crate::parser::parse;
    use crate::traits::Response;

    #[test]
    fn sequence_text_form() {
        let seq: Sequence = "3, 5,9".parse().unwrap();
        assert_eq!(seq, Sequence(vec![3, 5, 9]));
        assert_eq!(seq.to_string(), "3,5,9");
        assert_eq!("".parse::<Sequence>().unwrap(), Sequence::default());
        assert!(matches!(
            "3,x".parse::<Sequence>(),
            Err(ClozeError::InvalidSequence(_))
        ));
    }

    #[test]
    fn stored_question_round_trip() {
        let parsed = parse("The {1:SA:=cat} sat on the {1:SA:=mat}.").unwrap();
        let mut store = MemoryStore::new();
        let seq = store.save_all(&parsed);
        assert_eq!(seq.ids().len(), 2);

        let q = ClozeQuestion::from_stored(&parsed.placeholder_text(), &seq, &store, DEFAULT_PENALTY)
                .unwrap();
        assert_eq!(q.fragments, parsed.fragments);

        let mut response = Response::new();
        response.insert("sub1_answer".into(), "cat".into());
        response.insert("sub2_answer".into(), "mat".into());
        assert_eq!(q.grade_response(&response).state, QuestionState::GradedRight);
    }

    #[test]
    fn missing_child_becomes_replacement() {
        let parsed = parse("{1:SA:=a} {1:SA:=b}").unwrap();
        let mut store = MemoryStore::new();
        let seq = store.save_all(&parsed);
        store.remove(seq.ids()[1]);

        let subquestions = resolve_sequence(&seq, &store);
        assert_eq!(subquestions[0].name(), "shortanswer");
        assert_eq!(subquestions[1].name(), "subquestion_replacement");

        let q = ClozeQuestion::from_stored("{#1} {#2}", &seq, &store, DEFAULT_PENALTY).unwrap();
        let mut response = Response::new();
        response.insert("sub1_answer".into(), "a".into());
        let result = q.grade_response(&response);
        assert_eq!(result.state, QuestionState::GradedPartial);
        assert!(!q.is_complete_response(&response));
    }

    #[test]
    fn short_sequence_drops_extra_placeholders() {
        let parsed = parse("{1:SA:=a}").unwrap();
        let mut store = MemoryStore::new();
        let seq = store.save_all(&parsed);

        let q = ClozeQuestion::from_stored("x {#1} y {#2} z", &seq, &store, DEFAULT_PENALTY).unwrap();
        assert_eq!(q.subquestions().len(), 1);
        assert_eq!(q.fragments, vec!["x ".to_string(), " y  z".to_string()]);
    }

    #[test]
    fn out_of_order_placeholders_are_rejected() {
        let parsed = parse("{1:SA:=a} {1:SA:=b}").unwrap();
        let mut store = MemoryStore::new();
        let seq = store.save_all(&parsed);

        let err = ClozeQuestion::from_stored("{#2} then {#1}", &seq, &store, DEFAULT_PENALTY)
            .unwrap_err();
        assert_eq!(
            err,
            ClozeError::PlaceholderOrder {
                expected: 1,
                found: 2
            }
        );
        assert!(ClozeQuestion::from_stored("{#1} {#1}", &seq, &store, DEFAULT_PENALTY).is_err());
    }
}
