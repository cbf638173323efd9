//! Remote mirror
//!
//! A durable, version-controlled copy of every snapshot, addressed by path.
//!
//! ## Protocol
//!
//! The mirror exposes git-style primitives so a publish can be atomic:
//! 1. Read the branch head (commit + tree)
//! 2. Create one blob per changed document
//! 3. Create a tree from the base tree plus the new blobs
//! 4. Create a commit on top of the head
//! 5. Move the branch reference (fast-forward only)
//!
//! Nothing is visible to readers until step 5 succeeds. Single documents can
//! also be replaced in one call with an optimistic version check.

use async_trait::async_trait;

use crate::config::RemoteConfig;
use crate::storage::DocumentName;

mod error;
mod github;
#[cfg(test)]
pub(crate) mod memory;

pub use error::{RemoteError, RemoteResult};
pub use github::GitHubMirror;

/// File content and version as currently published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    /// Version token (blob sha) for optimistic updates
    pub version: String,
}

/// Current branch head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    pub commit: String,
    pub tree: String,
}

/// One path-to-blob entry of a new tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub blob: String,
}

/// A remote mirror of the snapshot store
#[async_trait]
pub trait RemoteMirror: Send + Sync {
    /// Human-readable identity (for logs and status)
    fn describe(&self) -> String;

    /// Current content of a file on the branch, `None` if absent
    async fn fetch(&self, path: &str) -> RemoteResult<Option<RemoteFile>>;

    /// Current branch head
    async fn head(&self) -> RemoteResult<Head>;

    /// Store content, returning its blob id
    async fn create_blob(&self, content: &[u8]) -> RemoteResult<String>;

    /// Create a tree from `base_tree` with `entries` added or replaced
    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> RemoteResult<String>;

    /// Create a commit with a single parent
    async fn create_commit(&self, message: &str, tree: &str, parent: &str)
        -> RemoteResult<String>;

    /// Fast-forward the branch to `commit`
    ///
    /// Fails with `RemoteError::Conflict` if the branch no longer descends
    /// from the commit's parent.
    async fn update_ref(&self, commit: &str) -> RemoteResult<()>;

    /// Create or replace one file in a single commit
    ///
    /// `version` must be the current version token (or `None` when the file
    /// does not exist yet); a stale token fails with `RemoteError::Conflict`.
    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        version: Option<&str>,
        message: &str,
    ) -> RemoteResult<String>;
}

/// Where snapshot documents live inside the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    snapshot_dir: String,
    archive_path: String,
}

impl RemoteLayout {
    pub fn new(snapshot_dir: impl Into<String>, archive_path: impl Into<String>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            archive_path: archive_path.into(),
        }
    }

    pub fn from_config(remote: &RemoteConfig) -> Self {
        Self::new(remote.snapshot_dir.clone(), remote.archive_path.clone())
    }

    /// Remote path of a document
    pub fn path_for(&self, name: &DocumentName) -> String {
        match name {
            DocumentName::Archive => self.archive_path.trim_matches('/').to_string(),
            DocumentName::Snapshot(key) => {
                let dir = self.snapshot_dir.trim_matches('/');
                if dir.is_empty() {
                    key.file_name()
                } else {
                    format!("{}/{}", dir, key.file_name())
                }
            }
        }
    }
}

impl Default for RemoteLayout {
    fn default() -> Self {
        Self::from_config(&RemoteConfig::default())
    }
}
