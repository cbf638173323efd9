//! Publish command handler

use anyhow::{bail, Result};

use pagewatch_core::{Config, PublishStatus};

use super::Workspace;
use crate::output::Output;

/// Publish every stored snapshot
///
/// Unlike the end-of-run publish this does not depend on a dirty set, so it
/// converges the remote after earlier failed runs.
pub async fn publish(config: Config, output: &Output) -> Result<()> {
    let workspace = Workspace::open(config)?;

    let Some(ref sync) = workspace.sync else {
        bail!(
            "Remote mirror not configured. Set it with:\n  \
             pagewatch config set remote.owner <owner>\n  \
             pagewatch config set remote.repo <repo>\n\
             and export GITHUB_TOKEN"
        );
    };

    if !output.is_json() {
        output.message(&format!("Publishing to {}...", sync.describe()));
    }

    let status = match sync.reconcile(&workspace.store).await {
        Ok(outcome) => PublishStatus::Done(outcome),
        Err(e) => PublishStatus::Failed(e),
    };
    output.print_publish(&status);

    if let PublishStatus::Failed(e) = status {
        bail!("{}", e);
    }
    Ok(())
}
