//! Publish state machine
//!
//! Publishing runs as explicit steps:
//!
//! ```text
//! BuildCandidate -> CompareToRemote -> Commit -> Done
//!                        ^               |
//!                        +-- conflict ---+   (up to max_attempts)
//! ```
//!
//! The dirty set is cleared only when the run reaches `Done`, so a failure at
//! any step leaves it intact for the next attempt.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::RemoteConfig;
use crate::context::RunContext;
use crate::remote::{RemoteError, RemoteLayout, RemoteMirror, TreeEntry};
use crate::storage::{Document, DocumentName, SnapshotStore};

use super::error::SyncError;

const DEFAULT_MESSAGE: &str = "snapshots: bulk update";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Where a publish currently is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    /// Encoding the dirty snapshots from local state
    BuildCandidate,
    /// Fetching the published copies to drop unchanged documents
    CompareToRemote,
    /// Reading the branch head the commit builds on
    ReadHead,
    /// Uploading changed documents
    UploadBlobs,
    /// Assembling the new tree
    CreateTree,
    /// Creating the commit object
    CreateCommit,
    /// Making the commit visible
    AdvanceRef,
    /// Replacing the single archive document
    ReplaceDocument,
}

impl fmt::Display for PublishStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PublishStep::BuildCandidate => "building the candidate",
            PublishStep::CompareToRemote => "comparing with the remote copy",
            PublishStep::ReadHead => "reading the branch head",
            PublishStep::UploadBlobs => "uploading documents",
            PublishStep::CreateTree => "creating the tree",
            PublishStep::CreateCommit => "creating the commit",
            PublishStep::AdvanceRef => "advancing the branch",
            PublishStep::ReplaceDocument => "replacing the archive",
        };
        write!(f, "{}", s)
    }
}

/// Result of a successful publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing was written this run; no remote calls were made
    NothingDirty,
    /// Every dirty document already matched the remote copy
    SkippedUnchanged { documents: usize },
    /// One commit made every changed document visible
    Published {
        commit: String,
        paths: Vec<String>,
        attempts: u32,
    },
}

impl PublishOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::NothingDirty => write!(f, "nothing to publish"),
            PublishOutcome::SkippedUnchanged { documents } => {
                write!(f, "remote already up to date ({} checked)", documents)
            }
            PublishOutcome::Published {
                commit, paths, ..
            } => write!(f, "published {} file(s) in {}", paths.len(), commit),
        }
    }
}

/// A document whose content differs from the published copy
#[derive(Debug, Clone)]
struct Change {
    name: DocumentName,
    path: String,
    content: Vec<u8>,
    /// Published version, `None` when the path does not exist remotely
    version: Option<String>,
}

enum State {
    BuildCandidate,
    CompareToRemote(Vec<Document>),
    Commit(Vec<Document>, Vec<Change>),
    Done(PublishOutcome),
}

/// Publishes dirty snapshots to a remote mirror
pub struct SyncManager {
    mirror: Arc<dyn RemoteMirror>,
    layout: RemoteLayout,
    message: String,
    max_attempts: u32,
}

impl SyncManager {
    pub fn new(mirror: Arc<dyn RemoteMirror>, layout: RemoteLayout) -> Self {
        Self {
            mirror,
            layout,
            message: DEFAULT_MESSAGE.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Layout, commit message and retry budget from configuration
    pub fn from_config(remote: &RemoteConfig, mirror: Arc<dyn RemoteMirror>) -> Self {
        Self::new(mirror, RemoteLayout::from_config(remote))
            .with_message(remote.commit_message.clone())
            .with_max_attempts(remote.max_attempts)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attempts per publish, at least one
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn describe(&self) -> String {
        self.mirror.describe()
    }

    /// Publish everything written during this run
    ///
    /// On success (including a skip) the dirty set is cleared. On error it
    /// is left untouched.
    pub async fn publish(
        &self,
        store: &SnapshotStore,
        ctx: &mut RunContext,
    ) -> Result<PublishOutcome, SyncError> {
        if ctx.is_clean() {
            debug!("Publish: nothing dirty");
            return Ok(PublishOutcome::NothingDirty);
        }

        info!(
            "Publishing {} dirty snapshot(s) to {}",
            ctx.dirty_count(),
            self.mirror.describe()
        );

        let mut attempt = 1;
        let mut state = State::BuildCandidate;
        loop {
            state = match state {
                State::BuildCandidate => {
                    debug!("Publish step: {}", PublishStep::BuildCandidate);
                    let documents = store
                        .publish_documents(ctx.dirty())
                        .await
                        .map_err(SyncError::Candidate)?;
                    if documents.is_empty() {
                        State::Done(PublishOutcome::SkippedUnchanged { documents: 0 })
                    } else {
                        State::CompareToRemote(documents)
                    }
                }
                State::CompareToRemote(documents) => {
                    debug!(
                        "Publish step: {} (attempt {}/{})",
                        PublishStep::CompareToRemote,
                        attempt,
                        self.max_attempts
                    );
                    let changes = self.changed_documents(&documents).await?;
                    if changes.is_empty() {
                        info!("Remote copy already matches {} document(s)", documents.len());
                        State::Done(PublishOutcome::SkippedUnchanged {
                            documents: documents.len(),
                        })
                    } else {
                        State::Commit(documents, changes)
                    }
                }
                State::Commit(documents, changes) => {
                    let committed = self.commit(&changes).await;
                    match committed {
                        Ok(commit) => State::Done(PublishOutcome::Published {
                            commit,
                            paths: changes.into_iter().map(|c| c.path).collect(),
                            attempts: attempt,
                        }),
                        Err(SyncError::Remote { step, source }) if source.is_conflict() => {
                            if attempt >= self.max_attempts {
                                warn!("Publish conflict at {}, giving up", step);
                                return Err(SyncError::Exhausted {
                                    attempts: attempt,
                                    source,
                                });
                            }
                            warn!(
                                "Publish conflict while {}: {}. Retrying against the new head",
                                step, source
                            );
                            attempt += 1;
                            State::CompareToRemote(documents)
                        }
                        Err(e) => return Err(e),
                    }
                }
                State::Done(outcome) => {
                    ctx.clear();
                    info!("Publish finished: {}", outcome);
                    return Ok(outcome);
                }
            };
        }
    }

    /// Publish every key in local state, not just this run's writes
    ///
    /// Converges the remote after earlier failed publishes.
    pub async fn reconcile(&self, store: &SnapshotStore) -> Result<PublishOutcome, SyncError> {
        let keys = store.keys().map_err(SyncError::Candidate)?;
        let mut ctx = RunContext::new();
        ctx.mark_all(keys);
        self.publish(store, &mut ctx).await
    }

    async fn changed_documents(&self, documents: &[Document]) -> Result<Vec<Change>, SyncError> {
        let mut changes = Vec::new();
        for document in documents {
            let path = self.layout.path_for(&document.name);
            let remote = self.mirror.fetch(&path).await.map_err(|source| {
                SyncError::Remote {
                    step: PublishStep::CompareToRemote,
                    source,
                }
            })?;

            match remote {
                Some(file) if file.content == document.content => {
                    debug!("{} unchanged on remote", path);
                }
                remote => changes.push(Change {
                    name: document.name.clone(),
                    path,
                    content: document.content.clone(),
                    version: remote.map(|f| f.version),
                }),
            }
        }
        Ok(changes)
    }

    async fn commit(&self, changes: &[Change]) -> Result<String, SyncError> {
        match changes {
            [single] if single.name == DocumentName::Archive => self.replace_document(single).await,
            _ => self.commit_tree(changes).await,
        }
    }

    /// Single-object replace with an optimistic version check
    async fn replace_document(&self, change: &Change) -> Result<String, SyncError> {
        debug!("Publish step: {} ({})", PublishStep::ReplaceDocument, change.path);
        self.mirror
            .put_file(
                &change.path,
                &change.content,
                change.version.as_deref(),
                &self.message,
            )
            .await
            .map_err(|source| remote_error(PublishStep::ReplaceDocument, source))
    }

    /// Multi-document commit; nothing is visible until the ref moves
    async fn commit_tree(&self, changes: &[Change]) -> Result<String, SyncError> {
        debug!("Publish step: {}", PublishStep::ReadHead);
        let head = self
            .mirror
            .head()
            .await
            .map_err(|source| remote_error(PublishStep::ReadHead, source))?;

        debug!("Publish step: {} ({})", PublishStep::UploadBlobs, changes.len());
        let mut entries = Vec::with_capacity(changes.len());
        for change in changes {
            let blob = self
                .mirror
                .create_blob(&change.content)
                .await
                .map_err(|source| remote_error(PublishStep::UploadBlobs, source))?;
            entries.push(TreeEntry {
                path: change.path.clone(),
                blob,
            });
        }

        debug!("Publish step: {}", PublishStep::CreateTree);
        let tree = self
            .mirror
            .create_tree(&head.tree, &entries)
            .await
            .map_err(|source| remote_error(PublishStep::CreateTree, source))?;

        debug!("Publish step: {}", PublishStep::CreateCommit);
        let commit = self
            .mirror
            .create_commit(&self.message, &tree, &head.commit)
            .await
            .map_err(|source| remote_error(PublishStep::CreateCommit, source))?;

        debug!("Publish step: {} ({})", PublishStep::AdvanceRef, commit);
        self.mirror
            .update_ref(&commit)
            .await
            .map_err(|source| remote_error(PublishStep::AdvanceRef, source))?;

        Ok(commit)
    }
}

fn remote_error(step: PublishStep, source: RemoteError) -> SyncError {
    SyncError::Remote { step, source }
}
