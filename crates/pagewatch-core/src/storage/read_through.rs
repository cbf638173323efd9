//! Remote read-through backend
//!
//! Wraps a local backend. Reads that find nothing locally fall back to the
//! remote mirror; writes always go to the local working copy.
//!
//! A packed archive holds every key, so before it is published the remote
//! copy is merged in. A local archive started while the mirror was
//! unreachable would otherwise replace the remote one and drop every key
//! this run never touched.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::BackendKind;
use crate::models::{Item, TargetKey};
use crate::remote::{RemoteLayout, RemoteMirror};

use super::error::{StorageError, StorageResult};
use super::{Document, DocumentName, SnapshotBackend};

/// Local backend with the remote mirror as a fallback source
pub struct ReadThroughBackend {
    local: Box<dyn SnapshotBackend>,
    mirror: Arc<dyn RemoteMirror>,
    layout: RemoteLayout,
}

impl ReadThroughBackend {
    pub fn new(
        local: Box<dyn SnapshotBackend>,
        mirror: Arc<dyn RemoteMirror>,
        layout: RemoteLayout,
    ) -> Self {
        Self {
            local,
            mirror,
            layout,
        }
    }

    async fn read_remote(&self, key: &TargetKey) -> StorageResult<Option<Vec<Item>>> {
        let name = self.local.document_for(key);
        let path = self.layout.path_for(&name);

        let file = match self.mirror.fetch(&path).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                debug!("No remote snapshot for {} at {}", key, path);
                return Ok(None);
            }
            Err(e) => {
                // Unreachable mirror means "no previous state", not a failed target
                warn!(
                    "Remote read of {} from {} failed, treating as absent: {}",
                    path,
                    self.mirror.describe(),
                    e
                );
                return Ok(None);
            }
        };

        let location = format!("{}:{}", self.mirror.describe(), path);
        if self.local.adopt_remote(&name, &location, &file.content)? {
            return self.local.read(key).await;
        }

        let items = self
            .local
            .snapshot_from_document(key, &location, &file.content)?;
        if items.is_some() {
            debug!("Resolved {} from {}", key, location);
        }
        Ok(items)
    }
}

#[async_trait]
impl SnapshotBackend for ReadThroughBackend {
    fn kind(&self) -> BackendKind {
        self.local.kind()
    }

    async fn read(&self, key: &TargetKey) -> StorageResult<Option<Vec<Item>>> {
        if let Some(items) = self.local.read(key).await? {
            return Ok(Some(items));
        }
        self.read_remote(key).await
    }

    fn write(&self, key: &TargetKey, items: &[Item]) -> StorageResult<()> {
        self.local.write(key, items)
    }

    fn keys(&self) -> StorageResult<Vec<TargetKey>> {
        self.local.keys()
    }

    fn document_for(&self, key: &TargetKey) -> DocumentName {
        self.local.document_for(key)
    }

    fn snapshot_from_document(
        &self,
        key: &TargetKey,
        location: &str,
        bytes: &[u8],
    ) -> StorageResult<Option<Vec<Item>>> {
        self.local.snapshot_from_document(key, location, bytes)
    }

    fn adopt_remote(
        &self,
        name: &DocumentName,
        location: &str,
        bytes: &[u8],
    ) -> StorageResult<bool> {
        self.local.adopt_remote(name, location, bytes)
    }

    async fn prepare_publish(&self, dirty: &BTreeSet<TargetKey>) -> StorageResult<()> {
        // Per-key documents only ever carry their own key
        if self.local.kind() != BackendKind::Archive || dirty.is_empty() {
            return self.local.prepare_publish(dirty).await;
        }

        let name = DocumentName::Archive;
        let path = self.layout.path_for(&name);
        let location = format!("{}:{}", self.mirror.describe(), path);

        let file = self
            .mirror
            .fetch(&path)
            .await
            .map_err(|e| StorageError::Unreconciled {
                location: location.clone(),
                details: e.to_string(),
            })?;

        if let Some(file) = file {
            if self.local.adopt_remote(&name, &location, &file.content)? {
                info!("Reconciled local archive with {} before publishing", location);
            }
        }
        self.local.prepare_publish(dirty).await
    }

    fn publish_documents(&self, dirty: &BTreeSet<TargetKey>) -> StorageResult<Vec<Document>> {
        self.local.publish_documents(dirty)
    }
}
