//! Live progress of running jobs
//!
//! [`ProgressBus`] holds the latest [`ProgressSnapshot`] per job. Entries are transient:
//! nothing here is persisted, and an entry only exists while its job's execution task is
//! running and has seen at least one backend progress line.

use crate::types::{JobId, ProgressSnapshot};
use dashmap::DashMap;

pub mod parser;

pub use parser::{extract_eta, extract_speed};

/// Concurrent map from job id to its latest progress snapshot
///
/// Backed by a sharded map, so ticks from different jobs never contend on a single lock.
/// Each job has one writer (its execution task); readers see whole snapshots, never a
/// partially updated one.
#[derive(Debug, Default)]
pub struct ProgressBus {
    entries: DashMap<JobId, ProgressSnapshot>,
}

impl ProgressBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot for `snapshot.id` (last write wins, no merging)
    pub fn set(&self, snapshot: ProgressSnapshot) {
        self.entries.insert(snapshot.id, snapshot);
    }

    /// Latest snapshot for a job
    pub fn get(&self, id: JobId) -> Option<ProgressSnapshot> {
        self.entries.get(&id).map(|entry| entry.value().clone())
    }

    /// Drop a job's entry, returning the last snapshot if there was one
    pub fn remove(&self, id: JobId) -> Option<ProgressSnapshot> {
        self.entries.remove(&id).map(|(_, snapshot)| snapshot)
    }

    /// Whether a job currently has an entry
    pub fn contains(&self, id: JobId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of jobs with a live entry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no job has a live entry
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every live snapshot
    pub fn all(&self) -> Vec<ProgressSnapshot> {
        self.entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
