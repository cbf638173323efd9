//! Run command handler

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use pagewatch_core::{Config, PublishStatus, Run};

use super::Workspace;
use crate::extract::extract_items;
use crate::fetch;
use crate::output::Output;
use crate::targets::load_targets;

/// Check every target, report new items and publish
pub async fn run(config: Config, targets: &Path, no_publish: bool, output: &Output) -> Result<()> {
    let targets = load_targets(targets)?;
    if targets.is_empty() {
        output.message("No targets to check.");
        return Ok(());
    }

    let workspace = Workspace::open(config)?;
    let http = fetch::client()?;

    let sync = if no_publish {
        None
    } else {
        workspace.sync.as_ref()
    };
    if sync.is_none() && !no_publish {
        info!("No remote configured; results are saved locally only");
    }

    if !output.is_json() {
        output.message(&format!("Checking {} target(s)...", targets.len()));
    }

    let mut run = Run::new(&workspace.store, sync).configured(&workspace.config);
    run.process_chunked(targets, |target| {
        let http = http.clone();
        async move {
            info!("Accessing {}: {}", target, target.url);
            let html = fetch::fetch_html(&http, &target.url)
                .await
                .map_err(|e| format!("{:#}", e))?;
            extract_items(&html, &target.url)
                .map_err(|e| format!("Could not extract structured content: {:#}", e))
        }
    })
    .await;
    let summary = run.finish().await;

    output.print_run_summary(&summary);

    // Local results are already saved; only the exit status reports this
    if let PublishStatus::Failed(e) = &summary.publish {
        bail!("{}", e);
    }
    Ok(())
}
