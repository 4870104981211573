//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use clozergx_core::config::{self, ClozeConfig};
use clozergx_core::model::ParsedQuestion;
use clozergx_core::parser::parse_with;

pub mod gaps;
pub mod grade;
pub mod init;
pub mod parse;
pub mod validate;

/// Config from `--config`, or from the default search paths.
pub(crate) fn load_config(path: Option<PathBuf>) -> Result<ClozeConfig> {
    match path {
        Some(path) => config::load_config_from(Some(&path)),
        None => config::load_config(),
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Read and parse a question text file.
pub(crate) fn load_question(path: &Path, config: &ClozeConfig) -> Result<ParsedQuestion> {
    let text = read_text(path)?;
    parse_with(&text, &config.parse_options())
        .with_context(|| format!("failed to parse question {}", path.display()))
}

/// Print to stdout, or write to `output` when given.
pub(crate) fn emit(text: &str, output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
