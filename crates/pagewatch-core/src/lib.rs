//! pagewatch core library
//!
//! Change detection for monitored web pages: remembers what each page
//! showed last time, reports only what is new, and mirrors the stored
//! snapshots to a version-controlled remote.
//!
//! # Architecture
//!
//! - **Local working copy**: source of truth for previous state, written
//!   atomically per target
//! - **Remote mirror**: durable copy published in one batch per run and
//!   consulted when the local copy has nothing for a target
//!
//! # Quick Start
//!
//! ```text
//! let store = SnapshotStore::open(&config, None);
//! let mut run = Run::new(&store, None);
//!
//! let report = run.process(&target, observed_items).await?;
//! for item in &report.new_items {
//!     println!("new: {}", item.title);
//! }
//!
//! let summary = run.finish().await;
//! ```
//!
//! # Modules
//!
//! - `models`: items, targets and storage keys
//! - `fingerprint`: content identity of an item
//! - `diff`: "unseen before" detection
//! - `storage`: snapshot backends and the `SnapshotStore`
//! - `remote`: the remote mirror protocol and its GitHub implementation
//! - `sync`: batched, idempotent publishing
//! - `run`: per-run driver with chunking and reporting
//! - `config`: application configuration

pub mod config;
pub mod context;
pub mod diff;
pub mod fingerprint;
pub mod models;
pub mod remote;
pub mod run;
pub mod storage;
pub mod sync;

pub use config::{BackendKind, Config, RemoteConfig};
pub use context::RunContext;
pub use diff::diff;
pub use fingerprint::{fingerprint, Fingerprint};
pub use models::{Item, Target, TargetKey};
pub use remote::{GitHubMirror, RemoteError, RemoteLayout, RemoteMirror};
pub use run::{PublishStatus, Run, RunSummary, TargetError, TargetFailure, TargetReport};
pub use storage::{SnapshotStore, StorageError, StorageResult};
pub use sync::{PublishOutcome, PublishStep, SyncError, SyncManager};
