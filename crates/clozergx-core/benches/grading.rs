use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use clozergx_core::grading::{combine_states, ClozeQuestion, DEFAULT_PENALTY};
use clozergx_core::model::QuestionState;
use clozergx_core::parser::parse;
use clozergx_core::traits::Response;

const QUESTION: &str = r#"<p>The capital of France is {1:SA:=Paris#Correct~*#Try again}.</p>
<p>It lies on the river {1:MC:Loire~=Seine~Rhone}, and its tower is {1:NM:=330:5} metres tall.</p>
<p>Name a colour: {2:RX:=blue~=(white|red)~%50%bleu}. Tick all: {1:MR:=a~=b~c~d}.</p>"#;

fn response(pairs: &[(&str, &str)]) -> Response {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect::<BTreeMap<_, _>>()
}

fn bench_grade_response(c: &mut Criterion) {
    let question = ClozeQuestion::from_parsed(&parse(QUESTION).unwrap(), DEFAULT_PENALTY);
    let partial = response(&[
        ("sub1_answer", "Lyon"),
        ("sub2_answer", "1"),
        ("sub3_answer", "331.5"),
        ("sub4_answer", "bleu"),
        ("sub5_choice0", "1"),
        ("sub5_choice2", "1"),
    ]);
    let correct = question.correct_response();

    let mut group = c.benchmark_group("grade_response");
    group.bench_function("partial", |b| {
        b.iter(|| question.grade_response(black_box(&partial)))
    });
    group.bench_function("correct", |b| {
        b.iter(|| question.grade_response(black_box(&correct)))
    });
    group.bench_function("empty", |b| {
        b.iter(|| question.grade_response(black_box(&Response::new())))
    });
    group.finish();
}

fn bench_final_grade(c: &mut Criterion) {
    let question = ClozeQuestion::from_parsed(&parse(QUESTION).unwrap(), DEFAULT_PENALTY);
    let history: Vec<Response> = (0..20)
        .map(|i| {
            let guess = (325 + i).to_string();
            response(&[
                ("sub1_answer", "Paris"),
                ("sub2_answer", if i % 2 == 0 { "0" } else { "1" }),
                ("sub3_answer", &guess),
            ])
        })
        .collect();

    c.bench_function("compute_final_grade_20_tries", |b| {
        b.iter(|| question.compute_final_grade(black_box(&history), 20))
    });
}

fn bench_combine_states(c: &mut Criterion) {
    let states = [
        QuestionState::GradedRight,
        QuestionState::GaveUp,
        QuestionState::GradedWrong,
        QuestionState::GradedPartial,
    ]
    .repeat(250);

    c.bench_function("combine_1000_states", |b| {
        b.iter(|| {
            black_box(&states)
                .iter()
                .fold(None, |acc, s| Some(combine_states(acc, *s)))
        })
    });
}

criterion_group!(
    benches,
    bench_grade_response,
    bench_final_grade,
    bench_combine_states
);
criterion_main!(benches);
