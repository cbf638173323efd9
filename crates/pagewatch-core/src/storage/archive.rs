//! Packed-archive snapshot backend
//!
//! Every snapshot lives in one JSON object keyed by target key. Each write
//! reads the whole archive, replaces one entry and atomically swaps a fresh
//! file in, so the mirror only has a single object to manage.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::BackendKind;
use crate::models::{Item, TargetKey};

use super::error::StorageResult;
use super::persistence::{atomic_write, decode_archive, encode_archive, read_optional};
use super::{Document, DocumentName, SnapshotBackend};

type Archive = BTreeMap<TargetKey, Vec<Item>>;

/// Snapshot store backed by a single archive file
#[derive(Debug, Clone)]
pub struct ArchiveBackend {
    path: PathBuf,
}

impl ArchiveBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the archive file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a local archive exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> StorageResult<Option<Archive>> {
        let Some(bytes) = read_optional(&self.path)? else {
            return Ok(None);
        };
        decode_archive(&self.location(), &bytes).map(Some)
    }
}

#[async_trait]
impl SnapshotBackend for ArchiveBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Archive
    }

    async fn read(&self, key: &TargetKey) -> StorageResult<Option<Vec<Item>>> {
        Ok(self.load()?.and_then(|mut archive| archive.remove(key)))
    }

    fn write(&self, key: &TargetKey, items: &[Item]) -> StorageResult<()> {
        // A corrupt archive must not be silently replaced by a fresh one
        let mut archive = self.load()?.unwrap_or_default();
        archive.insert(key.clone(), items.to_vec());

        let bytes = encode_archive(&archive)?;
        atomic_write(&self.path, &bytes)?;
        debug!(
            "Wrote {} item(s) for {} into archive {:?} ({} key(s))",
            items.len(),
            key,
            self.path,
            archive.len()
        );
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<TargetKey>> {
        Ok(self
            .load()?
            .map(|archive| archive.into_keys().collect())
            .unwrap_or_default())
    }

    fn document_for(&self, _key: &TargetKey) -> DocumentName {
        DocumentName::Archive
    }

    fn snapshot_from_document(
        &self,
        key: &TargetKey,
        location: &str,
        bytes: &[u8],
    ) -> StorageResult<Option<Vec<Item>>> {
        let mut archive = decode_archive(location, bytes)?;
        Ok(archive.remove(key))
    }

    fn adopt_remote(
        &self,
        name: &DocumentName,
        location: &str,
        bytes: &[u8],
    ) -> StorageResult<bool> {
        if *name != DocumentName::Archive {
            return Ok(false);
        }

        let remote = decode_archive(location, bytes)?;
        let Some(mut archive) = self.load()? else {
            atomic_write(&self.path, bytes)?;
            info!(
                "Seeded local archive {:?} from {} ({} key(s))",
                self.path,
                location,
                remote.len()
            );
            return Ok(true);
        };

        // Fill in keys this copy never saw; local entries win
        let mut added = 0;
        for (key, items) in remote {
            if !archive.contains_key(&key) {
                archive.insert(key, items);
                added += 1;
            }
        }
        if added == 0 {
            return Ok(false);
        }

        atomic_write(&self.path, &encode_archive(&archive)?)?;
        info!(
            "Merged {} key(s) from {} into local archive {:?}",
            added, location, self.path
        );
        Ok(true)
    }

    fn publish_documents(&self, dirty: &BTreeSet<TargetKey>) -> StorageResult<Vec<Document>> {
        if dirty.is_empty() {
            return Ok(Vec::new());
        }

        match read_optional(&self.path)? {
            Some(content) => {
                // Refuse to publish an archive we could not read back ourselves
                decode_archive(&self.location(), &content)?;
                Ok(vec![Document {
                    name: DocumentName::Archive,
                    content,
                }])
            }
            None => Ok(Vec::new()),
        }
    }
}
