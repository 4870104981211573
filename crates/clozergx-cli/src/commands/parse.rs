//! The `clozergx parse` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{ContentArrangement, Table};

use clozergx_core::model::MarkerBlock;

pub fn execute(file: PathBuf, format: String, config: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config)?;
    let parsed = super::load_question(&file, &config)?;

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        _ => {
            println!(
                "{} sub-question(s), total weight {}",
                parsed.blocks.len(),
                parsed.total_weight
            );
            if parsed.blocks.is_empty() {
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["#", "Type", "Weight", "Answers"]);
            for block in parsed.blocks.values() {
                table.add_row(vec![
                    block.position.to_string(),
                    block.kind.to_string(),
                    block.weight.to_string(),
                    describe_answers(block),
                ]);
            }
            println!("{table}");
            println!("\nStored text:\n{}", parsed.placeholder_text());
        }
    }

    Ok(())
}

fn describe_answers(block: &MarkerBlock) -> String {
    block
        .alternatives
        .iter()
        .map(|alt| {
            let mut s = format!("{} ({:.0}%)", alt.answer, alt.fraction * 100.0);
            if let Some(tolerance) = alt.tolerance.filter(|t| *t != 0.0) {
                s.push_str(&format!(" ±{tolerance}"));
            }
            s
        })
        .collect::<Vec<_>>()
        .join("\n")
}
