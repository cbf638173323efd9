//! Per-file snapshot backend
//!
//! One pretty-printed JSON array per key, at `<dir>/<key>.json`.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::BackendKind;
use crate::models::{Item, TargetKey};

use super::error::{StorageError, StorageResult};
use super::persistence::{atomic_write, decode_snapshot, encode_snapshot, read_optional};
use super::{Document, DocumentName, SnapshotBackend};

/// Snapshot store with one document per key
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the documents
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for a key
    pub fn path_for(&self, key: &TargetKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn read_local(&self, key: &TargetKey) -> StorageResult<Option<Vec<Item>>> {
        let path = self.path_for(key);
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };
        decode_snapshot(&path.display().to_string(), &bytes).map(Some)
    }
}

#[async_trait]
impl SnapshotBackend for FileBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Files
    }

    async fn read(&self, key: &TargetKey) -> StorageResult<Option<Vec<Item>>> {
        self.read_local(key)
    }

    fn write(&self, key: &TargetKey, items: &[Item]) -> StorageResult<()> {
        let bytes = encode_snapshot(key, items)?;
        let path = self.path_for(key);
        atomic_write(&path, &bytes)?;
        debug!("Wrote {} item(s) to {:?}", items.len(), path);
        Ok(())
    }

    fn keys(&self) -> StorageResult<Vec<TargetKey>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::from_read(e, self.dir.clone())),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::from_read(e, self.dir.clone()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match TargetKey::from_stored(stem) {
                Ok(key) => keys.push(key),
                Err(e) => warn!("Ignoring {:?}: {}", path, e),
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn document_for(&self, key: &TargetKey) -> DocumentName {
        DocumentName::Snapshot(key.clone())
    }

    fn snapshot_from_document(
        &self,
        _key: &TargetKey,
        location: &str,
        bytes: &[u8],
    ) -> StorageResult<Option<Vec<Item>>> {
        decode_snapshot(location, bytes).map(Some)
    }

    fn adopt_remote(
        &self,
        _name: &DocumentName,
        _location: &str,
        _bytes: &[u8],
    ) -> StorageResult<bool> {
        // Remote per-key documents are never dirty locally; nothing to seed
        Ok(false)
    }

    fn publish_documents(&self, dirty: &BTreeSet<TargetKey>) -> StorageResult<Vec<Document>> {
        let mut documents = Vec::with_capacity(dirty.len());

        for key in dirty {
            let path = self.path_for(key);
            match read_optional(&path)? {
                Some(content) => documents.push(Document {
                    name: DocumentName::Snapshot(key.clone()),
                    content,
                }),
                None => warn!("Dirty key {} has no local snapshot at {:?}", key, path),
            }
        }

        Ok(documents)
    }
}
