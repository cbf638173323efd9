//! Storage layer
//!
//! Durable, keyed persistence of the latest snapshot per monitored target.
//!
//! ## Backends
//!
//! - **files**: one JSON array per key in `data_dir/snapshots/`
//! - **archive**: every snapshot packed into `data_dir/snapshots.json`
//! - **read-through**: wraps either of the above and falls back to the
//!   remote mirror when the local working copy has no snapshot for a key
//!
//! All three implement `SnapshotBackend`; `SnapshotStore` picks one from
//! the configuration so the diff and sync layers never see which.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::config::BackendKind;
use crate::models::{Item, TargetKey};

pub mod archive;
pub mod error;
pub mod files;
pub mod persistence;
pub mod read_through;
pub mod store;

pub use archive::ArchiveBackend;
pub use error::{StorageError, StorageResult};
pub use files::FileBackend;
pub use read_through::ReadThroughBackend;
pub use store::SnapshotStore;

/// Name of a publishable document, independent of where it lives remotely
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DocumentName {
    /// Per-key snapshot document
    Snapshot(TargetKey),
    /// The packed archive of every snapshot
    Archive,
}

/// Encoded document ready to be compared against or published to the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: DocumentName,
    pub content: Vec<u8>,
}

/// A keyed snapshot backend
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Local layout this backend stores
    fn kind(&self) -> BackendKind;

    /// Read the snapshot for a key
    ///
    /// `Ok(None)` means no snapshot exists. Corrupt content is an error.
    async fn read(&self, key: &TargetKey) -> StorageResult<Option<Vec<Item>>>;

    /// Durably replace the snapshot for a key
    fn write(&self, key: &TargetKey, items: &[Item]) -> StorageResult<()>;

    /// Keys present in the local working copy
    fn keys(&self) -> StorageResult<Vec<TargetKey>>;

    /// Document that holds a key
    fn document_for(&self, key: &TargetKey) -> DocumentName;

    /// Extract a key's snapshot from an encoded document of this layout
    fn snapshot_from_document(
        &self,
        key: &TargetKey,
        location: &str,
        bytes: &[u8],
    ) -> StorageResult<Option<Vec<Item>>>;

    /// Install a fetched remote document as local state where that is safe
    ///
    /// Local entries always win over remote ones. Returns whether anything
    /// was written.
    fn adopt_remote(&self, name: &DocumentName, location: &str, bytes: &[u8])
        -> StorageResult<bool>;

    /// Bring local documents up to date with the mirror before publishing
    ///
    /// Backends without a mirror have nothing to reconcile.
    async fn prepare_publish(&self, _dirty: &BTreeSet<TargetKey>) -> StorageResult<()> {
        Ok(())
    }

    /// Build the documents to publish for a set of dirty keys
    fn publish_documents(&self, dirty: &BTreeSet<TargetKey>) -> StorageResult<Vec<Document>>;
}
