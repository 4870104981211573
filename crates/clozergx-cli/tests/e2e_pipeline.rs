//! End-to-end pipeline tests through the library.
//!
//! These tests verify that question text flows through parse → validate →
//! store → reload → grade, and that gapped text parses into gradable
//! short-answer questions.

use std::collections::BTreeMap;

use clozergx_core::gaps::{insert_gaps, remove_gaps};
use clozergx_core::grading::{ClozeQuestion, DEFAULT_PENALTY};
use clozergx_core::model::QuestionState;
use clozergx_core::parser::parse;
use clozergx_core::sequence::{MemoryStore, Sequence};
use clozergx_core::traits::Response;
use clozergx_core::validation::validate;

const CAPITALS: &str = include_str!("../../../questions/capitals.txt");

fn response(pairs: &[(&str, &str)]) -> Response {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>()
}

#[test]
fn e2e_store_reload_and_grade() {
    let parsed = parse(CAPITALS).unwrap();
    assert!(validate(&parsed).is_empty());

    // Save the way a host would: placeholder text plus a sequence value.
    let mut store = MemoryStore::new();
    let stored_sequence = store.save_all(&parsed).to_string();
    let stored_text = parsed.placeholder_text();

    let sequence: Sequence = stored_sequence.parse().unwrap();
    let question =
        ClozeQuestion::from_stored(&stored_text, &sequence, &store, DEFAULT_PENALTY).unwrap();
    assert_eq!(question.subquestions().len(), 4);

    let correct = question.correct_response();
    let result = question.grade_response(&correct);
    assert_eq!(result.fraction, Some(1.0));
    assert_eq!(result.state, QuestionState::GradedRight);
    assert_eq!(question.num_parts_right(&correct), (4, 4));
}

#[test]
fn e2e_reparse_is_idempotent() {
    let parsed = parse(CAPITALS).unwrap();
    let again = parse(&parsed.reconstruct()).unwrap();
    assert_eq!(parsed, again);

    let canonical = parse(&parsed.to_canonical_text()).unwrap();
    assert_eq!(canonical.blocks.len(), parsed.blocks.len());
    for (a, b) in parsed.blocks.values().zip(canonical.blocks.values()) {
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.weight, b.weight);
        assert_eq!(a.alternatives, b.alternatives);
    }
}

#[test]
fn e2e_deleted_child_degrades_gracefully() {
    let parsed = parse(CAPITALS).unwrap();
    let mut store = MemoryStore::new();
    let sequence = store.save_all(&parsed);
    store.remove(sequence.ids()[3]);

    let question =
        ClozeQuestion::from_stored(&parsed.placeholder_text(), &sequence, &store, DEFAULT_PENALTY)
            .unwrap();
    let correct = question.correct_response();
    let result = question.grade_response(&correct);

    assert_eq!(result.state, QuestionState::GradedPartial);
    assert!(!question.is_complete_response(&correct));
    assert!(question.question_summary().contains("{ERR unknown sub-question type}"));
}

#[test]
fn e2e_gapped_text_is_gradable() {
    let paragraphs = ["The quick brown fox jumps over the lazy dog."];
    let gapped = insert_gaps(&paragraphs, 3, false).unwrap();
    assert_eq!(
        gapped[0],
        "The quick {1:SA:=brown} fox jumps {1:SA:=over} the lazy {1:SA:=dog}."
    );

    let parsed = parse(&gapped[0]).unwrap();
    assert!(validate(&parsed).is_empty());
    let question = ClozeQuestion::from_parsed(&parsed, DEFAULT_PENALTY);

    let result = question.grade_response(&response(&[
        ("sub1_answer", "BROWN"),
        ("sub2_answer", "under"),
        ("sub3_answer", "dog"),
    ]));
    assert_eq!(result.state, QuestionState::GradedPartial);
    assert!((result.fraction.unwrap() - 2.0 / 3.0).abs() < 1e-9);

    assert_eq!(remove_gaps(&gapped[..]), paragraphs);
}

#[test]
fn e2e_clear_wrong_then_retry() {
    let parsed = parse(CAPITALS).unwrap();
    let question = ClozeQuestion::from_parsed(&parsed, DEFAULT_PENALTY);

    let first = response(&[
        ("sub1_answer", "Paris"),
        ("sub2_answer", "0"),
        ("sub3_answer", "330"),
        ("sub4_answer", "green"),
    ]);
    let cleared = question.clear_wrong_from_response(&first);
    assert_eq!(cleared["sub1_answer"], "Paris");
    assert_eq!(cleared["sub2_answer"], "");
    assert_eq!(cleared["sub4_answer"], "");
    assert!(!question.is_same_response(&first, &cleared));

    let mut second = cleared.clone();
    second.insert("sub2_answer".into(), "1".into());
    second.insert("sub4_answer".into(), "red".into());

    let grade = question.compute_final_grade(&[first, second], 2);
    // Parts 1 and 3 right at try 0; parts 2 and 4 (weight 2) right at try 1.
    let expected = (1.0 + 1.0 + 3.0 * (1.0 - DEFAULT_PENALTY)) / 5.0;
    assert!((grade - expected).abs() < 1e-9);
}
