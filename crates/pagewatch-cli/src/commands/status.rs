//! Status command handler

use anyhow::Result;

use pagewatch_core::{BackendKind, Config, RemoteConfig, StorageError};

use super::Workspace;
use crate::output::{Output, OutputFormat};

/// Show status information
pub fn show(config: Config, output: &Output) -> Result<()> {
    let workspace = Workspace::open(config)?;
    let config = &workspace.config;
    let keys = workspace.store.keys();
    let remote = config.active_remote();

    let location = match config.backend {
        BackendKind::Files => config.snapshot_dir(),
        BackendKind::Archive => config.archive_path(),
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "backend": config.backend.to_string(),
                    "data_dir": config.data_dir,
                    "location": location,
                    "snapshots": keys.as_ref().map(|k| k.len()).ok(),
                    "storage_error": keys.as_ref().err().map(|e| e.to_string()),
                    "remote": workspace.sync.as_ref().map(|s| s.describe()),
                    "read_through": workspace.store.is_read_through(),
                    "chunk_size": config.effective_chunk_size(),
                    "publish_per_chunk": config.publish_per_chunk,
                })
            );
        }
        OutputFormat::Quiet => {
            if let Ok(keys) = &keys {
                println!("{}", keys.len());
            }
        }
        OutputFormat::Human => {
            println!("pagewatch Status");
            println!("================");
            println!();
            println!("Storage:");
            println!("  Backend:   {}", config.backend);
            println!("  Location:  {}", location.display());
            match &keys {
                Ok(keys) => println!("  Snapshots: {}", keys.len()),
                Err(e) => print_storage_error(e),
            }
            println!();
            println!("Runs:");
            println!("  Chunk size:        {}", config.effective_chunk_size());
            println!(
                "  Publish per chunk: {}",
                if config.publish_per_chunk { "yes" } else { "no" }
            );
            println!();
            println!("Remote:");
            match (remote, &workspace.sync) {
                (Some(remote), Some(sync)) => {
                    println!("  Mirror:       {}", sync.describe());
                    println!("  Snapshots:    {}", remote.snapshot_dir);
                    println!("  Archive:      {}", remote.archive_path);
                    println!(
                        "  Token:        {}",
                        if RemoteConfig::token().is_some() {
                            "set"
                        } else {
                            "missing (set GITHUB_TOKEN)"
                        }
                    );
                }
                _ => println!("  (not configured; results stay local)"),
            }
        }
    }

    Ok(())
}

fn print_storage_error(e: &StorageError) {
    println!("  Snapshots: unreadable ({})", e);
    if let Some(hint) = e.recovery_suggestion() {
        println!("  Hint:      {}", hint);
    }
}
