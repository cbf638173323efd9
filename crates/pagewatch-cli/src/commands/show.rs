//! Show command handler

use anyhow::{Context, Result};

use pagewatch_core::{Config, TargetKey};

use super::Workspace;
use crate::output::Output;

/// Print the stored snapshot for a target
pub async fn show(config: Config, company: &str, url_type: &str, output: &Output) -> Result<()> {
    let key = TargetKey::new(company, url_type).context("Invalid target")?;
    let workspace = Workspace::open(config)?;

    let items = workspace
        .store
        .read_key(&key)
        .await
        .with_context(|| format!("Failed to read snapshot for {}", key))?;

    output.print_snapshot(&key, &items);
    Ok(())
}
