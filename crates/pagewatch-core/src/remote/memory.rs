//! In-process mirror for tests
//!
//! Keeps blobs, trees, commits and one branch ref, with the same visibility
//! rules as the real mirror: readers only see what the branch points at.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::{RemoteError, RemoteResult};
use super::{Head, RemoteFile, RemoteMirror, TreeEntry};

/// Mirror operations, for fault injection and call accounting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MirrorOp {
    Fetch,
    Head,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
    PutFile,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, (String, Option<String>)>,
    head: String,
    failing: HashSet<MirrorOp>,
    race_next_publish: bool,
    calls: HashMap<MirrorOp, usize>,
    published_commits: usize,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn enter(&mut self, op: MirrorOp) -> RemoteResult<()> {
        *self.calls.entry(op).or_default() += 1;
        if self.failing.contains(&op) {
            return Err(RemoteError::Status {
                operation: format!("{:?}", op),
                status: 503,
                body: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn head_tree(&self) -> BTreeMap<String, String> {
        let (tree, _) = &self.commits[&self.head];
        self.trees[tree].clone()
    }

    fn commit_tree(&mut self, tree: BTreeMap<String, String>) -> String {
        let tree_id = self.id("tree");
        self.trees.insert(tree_id.clone(), tree);
        let commit_id = self.id("commit");
        self.commits
            .insert(commit_id.clone(), (tree_id, Some(self.head.clone())));
        self.head = commit_id.clone();
        commit_id
    }

    fn write_directly(&mut self, path: &str, content: &[u8]) {
        let blob = self.id("blob");
        self.blobs.insert(blob.clone(), content.to_vec());
        let mut tree = self.head_tree();
        tree.insert(path.to_string(), blob);
        self.commit_tree(tree);
    }

    fn take_race(&mut self) {
        if self.race_next_publish {
            self.race_next_publish = false;
            self.write_directly("other-writer.txt", b"elsewhere");
        }
    }
}

/// Mirror that lives entirely in memory
#[derive(Debug)]
pub(crate) struct MemoryMirror {
    state: Mutex<State>,
}

impl MemoryMirror {
    pub(crate) fn new() -> Self {
        let mut state = State::default();
        let tree = state.id("tree");
        state.trees.insert(tree.clone(), BTreeMap::new());
        let commit = state.id("commit");
        state.commits.insert(commit.clone(), (tree, None));
        state.head = commit;
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish a file as if another writer had committed it
    pub(crate) fn seed(&self, path: &str, content: &[u8]) {
        self.lock().write_directly(path, content);
    }

    /// Content visible on the branch
    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        let state = self.lock();
        let tree = state.head_tree();
        tree.get(path).map(|blob| state.blobs[blob].clone())
    }

    pub(crate) fn head_commit(&self) -> String {
        self.lock().head.clone()
    }

    /// Make every call of `op` fail until cleared
    pub(crate) fn fail_on(&self, op: MirrorOp) {
        self.lock().failing.insert(op);
    }

    pub(crate) fn clear_failures(&self) {
        self.lock().failing.clear();
    }

    /// Let another writer move the branch just before our next ref update
    pub(crate) fn race_next_publish(&self) {
        self.lock().race_next_publish = true;
    }

    pub(crate) fn calls(&self, op: MirrorOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Commits made visible through `update_ref` or `put_file`
    pub(crate) fn published_commits(&self) -> usize {
        self.lock().published_commits
    }
}

#[async_trait]
impl RemoteMirror for MemoryMirror {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn fetch(&self, path: &str) -> RemoteResult<Option<RemoteFile>> {
        let mut state = self.lock();
        state.enter(MirrorOp::Fetch)?;
        let tree = state.head_tree();
        Ok(tree.get(path).map(|blob| RemoteFile {
            content: state.blobs[blob].clone(),
            version: blob.clone(),
        }))
    }

    async fn head(&self) -> RemoteResult<Head> {
        let mut state = self.lock();
        state.enter(MirrorOp::Head)?;
        let (tree, _) = state.commits[&state.head].clone();
        Ok(Head {
            commit: state.head.clone(),
            tree,
        })
    }

    async fn create_blob(&self, content: &[u8]) -> RemoteResult<String> {
        let mut state = self.lock();
        state.enter(MirrorOp::CreateBlob)?;
        let id = state.id("blob");
        state.blobs.insert(id.clone(), content.to_vec());
        Ok(id)
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> RemoteResult<String> {
        let mut state = self.lock();
        state.enter(MirrorOp::CreateTree)?;
        let mut tree = state
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| RemoteError::malformed("create tree", "unknown base tree"))?;
        for entry in entries {
            if !state.blobs.contains_key(&entry.blob) {
                return Err(RemoteError::malformed("create tree", "unknown blob"));
            }
            tree.insert(entry.path.clone(), entry.blob.clone());
        }
        let id = state.id("tree");
        state.trees.insert(id.clone(), tree);
        Ok(id)
    }

    async fn create_commit(
        &self,
        _message: &str,
        tree: &str,
        parent: &str,
    ) -> RemoteResult<String> {
        let mut state = self.lock();
        state.enter(MirrorOp::CreateCommit)?;
        if !state.trees.contains_key(tree) || !state.commits.contains_key(parent) {
            return Err(RemoteError::malformed("create commit", "unknown tree or parent"));
        }
        let id = state.id("commit");
        state
            .commits
            .insert(id.clone(), (tree.to_string(), Some(parent.to_string())));
        Ok(id)
    }

    async fn update_ref(&self, commit: &str) -> RemoteResult<()> {
        let mut state = self.lock();
        state.enter(MirrorOp::UpdateRef)?;
        state.take_race();

        let parent = state
            .commits
            .get(commit)
            .map(|(_, parent)| parent.clone())
            .ok_or_else(|| RemoteError::malformed("update ref", "unknown commit"))?;
        if parent.as_deref() != Some(state.head.as_str()) {
            return Err(RemoteError::conflict("not a fast-forward"));
        }

        state.head = commit.to_string();
        state.published_commits += 1;
        Ok(())
    }

    async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        version: Option<&str>,
        _message: &str,
    ) -> RemoteResult<String> {
        let mut state = self.lock();
        state.enter(MirrorOp::PutFile)?;
        state.take_race_on_path(path);

        let current = state.head_tree().get(path).cloned();
        if current.as_deref() != version {
            return Err(RemoteError::conflict(format!("stale version for {}", path)));
        }

        let blob = state.id("blob");
        state.blobs.insert(blob.clone(), content.to_vec());
        let mut tree = state.head_tree();
        tree.insert(path.to_string(), blob);
        let commit = state.commit_tree(tree);
        state.published_commits += 1;
        Ok(commit)
    }
}

impl State {
    /// Single-file variant of the race: the other writer touches the same path
    fn take_race_on_path(&mut self, path: &str) {
        if self.race_next_publish {
            self.race_next_publish = false;
            self.write_directly(path, b"{}\n");
        }
    }
}
