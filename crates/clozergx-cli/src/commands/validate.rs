//! The `clozergx validate` command.

use std::path::PathBuf;

use anyhow::Result;

use clozergx_core::parser::parse_with;
use clozergx_core::validation::validate;

pub fn execute(file: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(config)?;
    let text = super::read_text(&file)?;

    let parsed = match parse_with(&text, &config.parse_options()) {
        Ok(parsed) => parsed,
        Err(e) if e.is_content_error() => {
            println!("  [questiontext] {e}");
            anyhow::bail!("{} is not a valid question", file.display());
        }
        Err(e) => return Err(e.into()),
    };

    let errors = validate(&parsed);
    for error in &errors {
        println!("  [{}] {}: {}", error.field, error.kind.code(), error.kind);
    }

    if errors.is_empty() {
        println!(
            "Question valid: {} sub-question(s), total weight {}",
            parsed.blocks.len(),
            parsed.total_weight
        );
        Ok(())
    } else {
        anyhow::bail!("{} validation error(s) found", errors.len())
    }
}
