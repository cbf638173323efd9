//! Monitoring run driver
//!
//! Ties the store, the diff engine and the sync manager together for one
//! run: read the previous snapshot, diff, persist, and publish the dirty set
//! once at the end (or after every chunk when configured).

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::RunContext;
use crate::diff::diff;
use crate::models::{Item, Target, TargetKey};
use crate::storage::{SnapshotStore, StorageError};
use crate::sync::{PublishOutcome, SyncError, SyncManager};

const DEFAULT_CHUNK_SIZE: usize = 2;

/// Why a single target produced no report
#[derive(Debug, Error)]
pub enum TargetError {
    /// The page could not be fetched or yielded no items
    #[error("{0}")]
    Unavailable(String),

    /// Previous state could not be read or the new state not written
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of processing one target
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: Target,
    pub key: TargetKey,
    /// Items not present in the previous snapshot, in observed order
    pub new_items: Vec<Item>,
    /// Items in the snapshot now stored for the key
    pub snapshot_len: usize,
    /// No previous snapshot existed
    pub first_run: bool,
}

impl TargetReport {
    pub fn has_changes(&self) -> bool {
        !self.new_items.is_empty()
    }
}

/// A target that failed without aborting the run
#[derive(Debug)]
pub struct TargetFailure {
    pub target: Target,
    pub error: TargetError,
}

/// Publish result recorded by a run
#[derive(Debug)]
pub enum PublishStatus {
    /// No mirror configured, or publishing was turned off
    Disabled,
    Done(PublishOutcome),
    Failed(SyncError),
}

impl PublishStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, PublishStatus::Failed(_))
    }
}

impl fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishStatus::Disabled => write!(f, "publishing disabled; results saved locally"),
            PublishStatus::Done(outcome) => write!(f, "{}", outcome),
            PublishStatus::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Everything a run produced
#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reports: Vec<TargetReport>,
    pub failures: Vec<TargetFailure>,
    pub publish: PublishStatus,
    /// Keys written but not published when the run ended
    pub unpublished: usize,
}

impl RunSummary {
    /// Targets with at least one new item
    pub fn changed(&self) -> impl Iterator<Item = &TargetReport> {
        self.reports.iter().filter(|r| r.has_changes())
    }

    /// Targets with nothing new
    pub fn unchanged(&self) -> impl Iterator<Item = &TargetReport> {
        self.reports.iter().filter(|r| !r.has_changes())
    }

    pub fn new_item_count(&self) -> usize {
        self.reports.iter().map(|r| r.new_items.len()).sum()
    }
}

/// One monitoring run
pub struct Run<'a> {
    store: &'a SnapshotStore,
    sync: Option<&'a SyncManager>,
    ctx: RunContext,
    chunk_size: usize,
    publish_per_chunk: bool,
    reports: Vec<TargetReport>,
    failures: Vec<TargetFailure>,
    publish: PublishStatus,
}

impl<'a> Run<'a> {
    /// Start a run with an empty dirty set
    ///
    /// Without a sync manager, results are only saved locally.
    pub fn new(store: &'a SnapshotStore, sync: Option<&'a SyncManager>) -> Self {
        Self {
            store,
            sync,
            ctx: RunContext::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            publish_per_chunk: false,
            reports: Vec::new(),
            failures: Vec::new(),
            publish: PublishStatus::Disabled,
        }
    }

    /// Chunking settings from configuration
    pub fn configured(self, config: &Config) -> Self {
        self.chunk_size(config.effective_chunk_size())
            .publish_per_chunk(config.publish_per_chunk)
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    pub fn publish_per_chunk(mut self, enabled: bool) -> Self {
        self.publish_per_chunk = enabled;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Read, diff and persist one target
    ///
    /// A corrupt previous snapshot fails before anything is written, so the
    /// damaged document stays in place for inspection.
    pub async fn process(
        &mut self,
        target: &Target,
        items: Vec<Item>,
    ) -> Result<TargetReport, TargetError> {
        let key = target.key()?;
        let previous = self.store.read_key(&key).await?;
        let new_items = diff(&previous, &items);

        self.store.write(&mut self.ctx, &key, &items)?;
        debug!(
            "{}: {} observed, {} new, {} previous",
            key,
            items.len(),
            new_items.len(),
            previous.len()
        );

        Ok(TargetReport {
            target: target.clone(),
            key,
            new_items,
            snapshot_len: items.len(),
            first_run: previous.is_empty(),
        })
    }

    /// Process one observation and record its outcome in the run
    pub async fn record<E: fmt::Display>(&mut self, target: Target, observed: Result<Vec<Item>, E>) {
        let result = match observed {
            Ok(items) => self.process(&target, items).await,
            Err(e) => Err(TargetError::Unavailable(e.to_string())),
        };

        match result {
            Ok(report) => {
                if report.has_changes() {
                    info!("{}: {} new item(s)", target, report.new_items.len());
                }
                self.reports.push(report);
            }
            Err(error) => {
                warn!("{}: {}", target, error);
                self.failures.push(TargetFailure { target, error });
            }
        }
    }

    /// Observe and process targets in fixed-size chunks
    ///
    /// Each chunk is observed into a buffer, then drained (diffed and
    /// persisted) before the next chunk is pulled from `targets`.
    pub async fn process_chunked<I, F, Fut, E>(&mut self, targets: I, mut observe: F)
    where
        I: IntoIterator<Item = Target>,
        F: FnMut(Target) -> Fut,
        Fut: Future<Output = Result<Vec<Item>, E>>,
        E: fmt::Display,
    {
        let mut targets = targets.into_iter();
        let mut chunk_no = 0;

        loop {
            let chunk: Vec<Target> = targets.by_ref().take(self.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            chunk_no += 1;
            debug!("Chunk {}: {} target(s)", chunk_no, chunk.len());

            let mut buffer = Vec::with_capacity(chunk.len());
            for target in chunk {
                let observed = observe(target.clone()).await;
                buffer.push((target, observed));
            }
            for (target, observed) in buffer {
                self.record(target, observed).await;
            }

            if self.publish_per_chunk {
                self.publish().await;
            }
        }
    }

    /// Publish the current dirty set
    pub async fn publish(&mut self) -> &PublishStatus {
        let Some(sync) = self.sync else {
            return &self.publish;
        };

        match sync.publish(self.store, &mut self.ctx).await {
            // A later chunk's no-op or skip must not hide an earlier commit
            Ok(outcome) if outcome_rank(&outcome) < self.done_rank() => {
                debug!("Keeping earlier publish result over: {}", outcome);
            }
            Ok(outcome) => self.publish = PublishStatus::Done(outcome),
            Err(e) => {
                warn!("{}", e);
                self.publish = PublishStatus::Failed(e);
            }
        }
        &self.publish
    }

    fn done_rank(&self) -> u8 {
        match &self.publish {
            PublishStatus::Done(outcome) => outcome_rank(outcome),
            _ => 0,
        }
    }

    /// Publish once more and close the run
    pub async fn finish(mut self) -> RunSummary {
        self.publish().await;

        let summary = RunSummary {
            started_at: self.ctx.started_at(),
            finished_at: Utc::now(),
            reports: self.reports,
            failures: self.failures,
            publish: self.publish,
            unpublished: self.ctx.dirty_count(),
        };
        info!(
            "Run finished: {} changed, {} unchanged, {} failed; {}",
            summary.changed().count(),
            summary.unchanged().count(),
            summary.failures.len(),
            summary.publish
        );
        summary
    }
}

fn outcome_rank(outcome: &PublishOutcome) -> u8 {
    match outcome {
        PublishOutcome::NothingDirty => 0,
        PublishOutcome::SkippedUnchanged { .. } => 1,
        PublishOutcome::Published { .. } => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::remote::memory::{MemoryMirror, MirrorOp};
    use crate::remote::RemoteLayout;
    use crate::storage::persistence::encode_snapshot;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store(temp_dir: &TempDir) -> SnapshotStore {
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            backend: BackendKind::Files,
            ..Config::default()
        };
        SnapshotStore::open(&config, None)
    }

    fn acme() -> Target {
        Target::new("Acme", "News", "https://acme.com/news")
    }

    fn target(company: &str) -> Target {
        Target::new(company, "Blog", format!("https://{}.io/blog", company))
    }

    fn q1() -> Item {
        Item::new("Q1 results", "https://acme.com/q1", "2024-01-10")
    }

    fn ceo() -> Item {
        Item::new("New CEO", "https://acme.com/ceo", "2024-02-01")
    }

    fn ok(items: Vec<Item>) -> Result<Vec<Item>, String> {
        Ok(items)
    }

    #[tokio::test]
    async fn test_reports_only_new_items() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let mut first = Run::new(&store, None);
        let report = first.process(&acme(), vec![q1()]).await.unwrap();
        assert!(report.first_run);
        assert_eq!(report.new_items, vec![q1()]);
        first.finish().await;

        let mut second = Run::new(&store, None);
        let report = second.process(&acme(), vec![q1(), ceo()]).await.unwrap();
        assert!(!report.first_run);
        assert_eq!(report.new_items, vec![ceo()]);
        assert_eq!(report.snapshot_len, 2);
        assert_eq!(store.read("Acme", "News").await.unwrap(), vec![q1(), ceo()]);
    }

    #[tokio::test]
    async fn test_unchanged_target_is_still_written() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let mut run = Run::new(&store, None);
        run.process(&acme(), vec![q1()]).await.unwrap();
        let mut run = Run::new(&store, None);
        let report = run.process(&acme(), vec![q1()]).await.unwrap();

        assert!(!report.has_changes());
        assert_eq!(run.context().dirty_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_the_run() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let dir = temp_dir.path().join("snapshots");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("Acme_News.json"), b"not json").unwrap();

        let observations = vec![
            (acme(), ok(vec![q1()])),
            (target("zeta"), Err("HTTP 404: page not found".to_string())),
            (target("nova"), ok(vec![ceo()])),
        ];

        let mut run = Run::new(&store, None);
        for (target, observed) in observations {
            run.record(target, observed).await;
        }
        let summary = run.finish().await;

        assert_eq!(summary.reports.len(), 1);
        assert_eq!(summary.reports[0].target, target("nova"));
        assert_eq!(summary.failures.len(), 2);
        assert!(matches!(
            &summary.failures[0].error,
            TargetError::Storage(e) if e.is_corrupt()
        ));
        assert!(matches!(summary.failures[1].error, TargetError::Unavailable(_)));

        // Corrupt document left untouched
        assert_eq!(fs::read(dir.join("Acme_News.json")).unwrap(), b"not json");
        assert!(matches!(summary.publish, PublishStatus::Disabled));
    }

    #[tokio::test]
    async fn test_chunks_are_drained_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let targets: Vec<Target> = ["a", "b", "c", "d", "e"].iter().map(|c| target(c)).collect();

        let mut run = Run::new(&store, None).chunk_size(2);
        let mut observed = Vec::new();
        run.process_chunked(targets.clone(), |t| {
            observed.push(t.company.clone());
            async move { ok(vec![Item::undated(t.company.clone(), t.url.clone())]) }
        })
        .await;
        let summary = run.finish().await;

        assert_eq!(observed, vec!["a", "b", "c", "d", "e"]);
        let reported: Vec<&Target> = summary.reports.iter().map(|r| &r.target).collect();
        assert_eq!(reported, targets.iter().collect::<Vec<_>>());
        assert_eq!(summary.new_item_count(), 5);
    }

    #[tokio::test]
    async fn test_chunk_is_persisted_before_next_is_observed() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let mirror = Arc::new(MemoryMirror::new());
        let sync = SyncManager::new(mirror.clone(), RemoteLayout::default());
        let targets: Vec<Target> = ["a", "b", "c", "d"].iter().map(|c| target(c)).collect();

        let stored = &store;
        let remote = &mirror;
        let mut seen = Vec::new();

        let mut run = Run::new(&store, Some(&sync))
            .chunk_size(2)
            .publish_per_chunk(true);
        run.process_chunked(targets, |t| {
            let persisted = stored.keys().unwrap().len();
            seen.push((t.company.clone(), persisted, remote.published_commits()));
            async move { ok(vec![Item::undated(t.company.clone(), t.url.clone())]) }
        })
        .await;
        run.finish().await;

        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 0, 0),
                // Observations of a chunk are buffered until it is drained
                ("b".to_string(), 0, 0),
                ("c".to_string(), 2, 1),
                ("d".to_string(), 2, 1),
            ]
        );
        assert_eq!(mirror.published_commits(), 2);
    }

    #[tokio::test]
    async fn test_later_skip_does_not_hide_earlier_publish() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let mirror = Arc::new(MemoryMirror::new());

        // The second target's snapshot is already on the mirror
        let b = target("b");
        let b_items = vec![Item::undated(b.company.clone(), b.url.clone())];
        mirror.seed(
            "data/snapshots/b_Blog.json",
            &encode_snapshot(&b.key().unwrap(), &b_items).unwrap(),
        );
        let sync = SyncManager::new(mirror.clone(), RemoteLayout::default());

        let mut run = Run::new(&store, Some(&sync))
            .chunk_size(1)
            .publish_per_chunk(true);
        run.process_chunked(vec![target("a"), b], |t| async move {
            ok(vec![Item::undated(t.company, t.url)])
        })
        .await;
        let summary = run.finish().await;

        assert_eq!(mirror.published_commits(), 1);
        assert!(matches!(
            &summary.publish,
            PublishStatus::Done(outcome) if outcome.is_published()
        ));
    }

    #[tokio::test]
    async fn test_publishes_once_per_run() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let mirror = Arc::new(MemoryMirror::new());
        let sync = SyncManager::new(mirror.clone(), RemoteLayout::default());

        let mut run = Run::new(&store, Some(&sync)).chunk_size(2);
        run.process_chunked(vec![target("a"), target("b"), target("c")], |t| async move {
            ok(vec![Item::undated(t.company, t.url)])
        })
        .await;
        let summary = run.finish().await;

        assert_eq!(mirror.published_commits(), 1);
        assert!(matches!(
            &summary.publish,
            PublishStatus::Done(outcome) if outcome.is_published()
        ));
        assert_eq!(summary.unpublished, 0);
    }

    #[tokio::test]
    async fn test_publish_per_chunk() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let mirror = Arc::new(MemoryMirror::new());
        let sync = SyncManager::new(mirror.clone(), RemoteLayout::default());

        let mut run = Run::new(&store, Some(&sync))
            .chunk_size(2)
            .publish_per_chunk(true);
        run.process_chunked(vec![target("a"), target("b"), target("c")], |t| async move {
            ok(vec![Item::undated(t.company, t.url)])
        })
        .await;
        let summary = run.finish().await;

        assert_eq!(mirror.published_commits(), 2);
        // The final no-op publish does not hide the last real one
        assert!(matches!(
            &summary.publish,
            PublishStatus::Done(outcome) if outcome.is_published()
        ));
    }

    #[tokio::test]
    async fn test_failed_publish_keeps_local_results() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let mirror = Arc::new(MemoryMirror::new());
        mirror.fail_on(MirrorOp::Head);
        let sync = SyncManager::new(mirror.clone(), RemoteLayout::default());

        let mut run = Run::new(&store, Some(&sync));
        run.record(acme(), ok(vec![q1(), ceo()])).await;
        let summary = run.finish().await;

        assert!(summary.publish.is_failed());
        assert!(summary
            .publish
            .to_string()
            .contains("remote copy is stale"));
        assert_eq!(summary.unpublished, 1);
        assert_eq!(summary.changed().count(), 1);
        assert_eq!(store.read("Acme", "News").await.unwrap(), vec![q1(), ceo()]);
    }
}
