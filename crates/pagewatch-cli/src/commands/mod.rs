//! Command handlers

use std::sync::Arc;

use anyhow::{Context, Result};

use pagewatch_core::{Config, GitHubMirror, RemoteMirror, SnapshotStore, SyncManager};

pub mod config;
pub mod publish;
pub mod run;
pub mod show;
pub mod status;

/// Store and sync manager built from one configuration
pub struct Workspace {
    pub config: Config,
    pub store: SnapshotStore,
    /// `None` when no remote is configured
    pub sync: Option<SyncManager>,
}

impl Workspace {
    pub fn open(config: Config) -> Result<Self> {
        let mirror: Option<Arc<dyn RemoteMirror>> = match config.active_remote() {
            Some(remote) => Some(Arc::new(
                GitHubMirror::from_config(remote).context("Failed to set up the remote mirror")?,
            )),
            None => None,
        };

        let store = SnapshotStore::open(&config, mirror.clone());
        let sync = match (config.active_remote(), mirror) {
            (Some(remote), Some(mirror)) => Some(SyncManager::from_config(remote, mirror)),
            _ => None,
        };

        Ok(Self {
            config,
            store,
            sync,
        })
    }
}
