//! Runtime configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::grading::DEFAULT_PENALTY;
use crate::parser::{ParseOptions, DEFAULT_MAX_TEXT_LEN};

/// Top-level clozergx configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClozeConfig {
    /// Fraction deducted per try when computing a final grade.
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    /// Default gap interval for the gap helper.
    #[serde(default = "default_gap_interval")]
    pub gap_interval: usize,
    /// Leave capitalised words alone when inserting gaps.
    #[serde(default)]
    pub skip_capitalized: bool,
    /// Longest question text accepted by the parser, in bytes.
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

fn default_penalty() -> f64 {
    DEFAULT_PENALTY
}
fn default_gap_interval() -> usize {
    5
}
fn default_max_text_len() -> usize {
    DEFAULT_MAX_TEXT_LEN
}

impl Default for ClozeConfig {
    fn default() -> Self {
        Self {
            penalty: default_penalty(),
            gap_interval: default_gap_interval(),
            skip_capitalized: false,
            max_text_len: default_max_text_len(),
        }
    }
}

impl ClozeConfig {
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_text_len: self.max_text_len,
        }
    }

    fn check(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.penalty) {
            anyhow::bail!("penalty must be between 0 and 1, got {}", self.penalty);
        }
        if self.gap_interval == 0 {
            anyhow::bail!("gap_interval must be at least 1");
        }
        Ok(())
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `clozergx.toml` in the current directory
/// 2. `~/.config/clozergx/config.toml`
///
/// Environment variable overrides: `CLOZERGX_PENALTY`, `CLOZERGX_MAX_TEXT_LEN`.
pub fn load_config() -> Result<ClozeConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ClozeConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("clozergx.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), "loading config");
            toml::from_str::<ClozeConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ClozeConfig::default(),
    };

    let config = apply_env_overrides(config, |name| std::env::var(name).ok())?;
    config.check()?;
    Ok(config)
}

fn apply_env_overrides(
    mut config: ClozeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ClozeConfig> {
    if let Some(value) = lookup("CLOZERGX_PENALTY") {
        config.penalty = value
            .trim()
            .parse()
            .with_context(|| format!("invalid CLOZERGX_PENALTY: {value}"))?;
    }
    if let Some(value) = lookup("CLOZERGX_MAX_TEXT_LEN") {
        config.max_text_len = value
            .trim()
            .parse()
            .with_context(|| format!("invalid CLOZERGX_MAX_TEXT_LEN: {value}"))?;
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("clozergx"))
}
