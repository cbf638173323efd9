//! Unified snapshot store
//!
//! `SnapshotStore` is what the rest of the crate talks to. It owns one
//! `SnapshotBackend` chosen from configuration and records every write in
//! the run's `RunContext`.
//!
//! ## Usage
//!
//! ```ignore
//! let store = SnapshotStore::open(&config, mirror);
//! let mut ctx = RunContext::new();
//!
//! let previous = store.read("Acme", "News").await?;
//! store.write(&mut ctx, &key, &items)?;
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::{BackendKind, Config};
use crate::context::RunContext;
use crate::models::{Item, TargetKey};
use crate::remote::{RemoteLayout, RemoteMirror};

use super::error::StorageResult;
use super::{ArchiveBackend, Document, FileBackend, ReadThroughBackend, SnapshotBackend};

/// Keyed snapshot persistence over a configurable backend
pub struct SnapshotStore {
    backend: Box<dyn SnapshotBackend>,
    read_through: bool,
}

impl SnapshotStore {
    /// Wrap an explicit backend
    pub fn new(backend: Box<dyn SnapshotBackend>) -> Self {
        Self {
            backend,
            read_through: false,
        }
    }

    /// Build the backend named by the configuration
    ///
    /// When a mirror is given and the config has an active remote, reads
    /// fall through to it.
    pub fn open(config: &Config, mirror: Option<Arc<dyn RemoteMirror>>) -> Self {
        let local: Box<dyn SnapshotBackend> = match config.backend {
            BackendKind::Files => Box::new(FileBackend::new(config.snapshot_dir())),
            BackendKind::Archive => Box::new(ArchiveBackend::new(config.archive_path())),
        };

        match (mirror, config.active_remote()) {
            (Some(mirror), Some(remote)) => {
                info!(
                    "Snapshot store: {} backend in {:?}, reading through {}",
                    config.backend,
                    config.data_dir,
                    mirror.describe()
                );
                let layout = RemoteLayout::from_config(remote);
                Self {
                    backend: Box::new(ReadThroughBackend::new(local, mirror, layout)),
                    read_through: true,
                }
            }
            _ => {
                info!(
                    "Snapshot store: {} backend in {:?}",
                    config.backend, config.data_dir
                );
                Self::new(local)
            }
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Whether reads fall back to the remote mirror
    pub fn is_read_through(&self) -> bool {
        self.read_through
    }

    /// Previous snapshot for a target, empty when none exists anywhere
    pub async fn read(&self, company: &str, url_type: &str) -> StorageResult<Vec<Item>> {
        let key = TargetKey::new(company, url_type)?;
        self.read_key(&key).await
    }

    /// Previous snapshot for a key, empty when none exists anywhere
    pub async fn read_key(&self, key: &TargetKey) -> StorageResult<Vec<Item>> {
        let items = self.backend.read(key).await?;
        if items.is_none() {
            debug!("No previous snapshot for {}", key);
        }
        Ok(items.unwrap_or_default())
    }

    /// Replace the snapshot for a key and mark it dirty
    pub fn write(&self, ctx: &mut RunContext, key: &TargetKey, items: &[Item]) -> StorageResult<()> {
        self.backend.write(key, items)?;
        ctx.mark_dirty(key.clone());
        Ok(())
    }

    /// Keys present in the local working copy
    pub fn keys(&self) -> StorageResult<Vec<TargetKey>> {
        self.backend.keys()
    }

    /// Documents to publish for a set of dirty keys
    ///
    /// Local state is reconciled with the mirror first, so a packed archive
    /// never goes out missing keys the mirror already holds.
    pub async fn publish_documents(
        &self,
        dirty: &BTreeSet<TargetKey>,
    ) -> StorageResult<Vec<Document>> {
        self.backend.prepare_publish(dirty).await?;
        self.backend.publish_documents(dirty)
    }
}
