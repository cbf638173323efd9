//! Target list loading
//!
//! Targets live in a TOML file:
//!
//! ```toml
//! [[target]]
//! company = "Acme"
//! url_type = "News"
//! url = "https://acme.com/news"
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use pagewatch_core::Target;

#[derive(Debug, Deserialize)]
struct TargetFile {
    #[serde(default, rename = "target")]
    targets: Vec<Target>,
}

/// Load and validate a target file
pub fn load_targets(path: &Path) -> Result<Vec<Target>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read target file: {:?}", path))?;
    parse_targets(&content).with_context(|| format!("Invalid target file: {:?}", path))
}

/// Parse targets, rejecting entries that cannot be stored or fetched
pub fn parse_targets(content: &str) -> Result<Vec<Target>> {
    let file: TargetFile = toml::from_str(content).context("Failed to parse targets TOML")?;

    for (idx, target) in file.targets.iter().enumerate() {
        if target.url.trim().is_empty() {
            bail!("Target #{} ({}) has no url", idx + 1, target);
        }
        target
            .key()
            .with_context(|| format!("Target #{} has an unusable company/url_type", idx + 1))?;
    }

    Ok(file.targets)
}
