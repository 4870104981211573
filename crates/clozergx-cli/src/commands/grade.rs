//! The `clozergx grade` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::Table;

use clozergx_core::grading::ClozeQuestion;
use clozergx_core::traits::Response;

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = super::read_text(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse JSON: {}", path.display()))
}

pub fn execute(
    file: PathBuf,
    response: Option<PathBuf>,
    history: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = super::load_config(config)?;
    let parsed = super::load_question(&file, &config)?;
    let question = ClozeQuestion::from_parsed(&parsed, config.penalty);

    match (response, history) {
        (Some(path), _) => grade_one(&question, &read_json(&path)?),
        (None, Some(path)) => {
            let history: Vec<Response> = read_json(&path)?;
            if history.is_empty() {
                anyhow::bail!("response history {} is empty", path.display());
            }
            let grade = question.compute_final_grade(&history, history.len());
            println!(
                "Final grade after {} tr{}: {:.1}%",
                history.len(),
                if history.len() == 1 { "y" } else { "ies" },
                grade * 100.0
            );
            Ok(())
        }
        (None, None) => anyhow::bail!("either --response or --history is required"),
    }
}

fn grade_one(question: &ClozeQuestion, response: &Response) -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Part", "Type", "Response", "Fraction", "State"]);
    for (i, sq) in question.subquestions().iter().enumerate() {
        let position = i + 1;
        let sub_response = ClozeQuestion::filter_response(position, response);
        let (fraction, state) = if sq.is_gradable_response(&sub_response) {
            let result = sq.grade_response(&sub_response);
            (format!("{:.2}", result.fraction), result.state.to_string())
        } else {
            ("-".to_string(), "gave up".to_string())
        };
        table.add_row(vec![
            position.to_string(),
            sq.name().to_string(),
            sq.summarise_response(&sub_response),
            fraction,
            state,
        ]);
    }
    println!("{table}");

    let overall = question.grade_response(response);
    match overall.fraction {
        Some(fraction) => println!("Overall: {:.1}% ({})", fraction * 100.0, overall.state),
        None => println!("Overall: not gradable ({})", overall.state),
    }
    let (right, total) = question.num_parts_right(response);
    println!("Parts right: {right}/{total}");
    if let Some(message) = question.validation_error(response) {
        println!("{message}");
    }
    Ok(())
}
