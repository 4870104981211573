//! The `clozergx gaps` commands.

use std::path::PathBuf;

use anyhow::Result;

use clozergx_core::gaps::{insert_gaps, remove_gaps};

/// Split a file into blank-line separated paragraphs.
fn paragraphs(text: &str) -> Vec<String> {
    let text = text.replace("\r\n", "\n");
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                out.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

fn join(paragraphs: &[String]) -> String {
    let mut text = paragraphs.join("\n\n");
    text.push('\n');
    text
}

pub fn add(
    file: PathBuf,
    interval: Option<usize>,
    skip_capitalized: bool,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = super::load_config(config)?;
    let interval = interval.unwrap_or(config.gap_interval);
    let skip_capitalized = skip_capitalized || config.skip_capitalized;

    let input = paragraphs(&super::read_text(&file)?);
    let gapped = insert_gaps(&input, interval, skip_capitalized)?;
    tracing::info!(
        paragraphs = gapped.len(),
        interval,
        "gaps added to {}",
        file.display()
    );
    super::emit(&join(&gapped), output)
}

pub fn remove(file: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let input = paragraphs(&super::read_text(&file)?);
    super::emit(&join(&remove_gaps(&input)), output)
}
