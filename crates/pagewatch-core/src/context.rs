//! Per-run context
//!
//! Holds the dirty set: keys whose snapshot was written during this run and
//! not yet published. Every run starts with a fresh, empty context.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::models::TargetKey;

/// State scoped to one monitoring run
#[derive(Debug, Clone)]
pub struct RunContext {
    dirty: BTreeSet<TargetKey>,
    started_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            dirty: BTreeSet::new(),
            started_at: Utc::now(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Record that a key's snapshot was written
    pub fn mark_dirty(&mut self, key: TargetKey) {
        self.dirty.insert(key);
    }

    /// Mark many keys at once (full reconcile)
    pub fn mark_all(&mut self, keys: impl IntoIterator<Item = TargetKey>) {
        self.dirty.extend(keys);
    }

    pub fn dirty(&self) -> &BTreeSet<TargetKey> {
        &self.dirty
    }

    pub fn is_clean(&self) -> bool {
        self.dirty.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Forget published keys
    pub(crate) fn clear(&mut self) {
        self.dirty.clear();
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
