//! Snapshot publisher: the process-wide, mutex-protected pool-snapshot
//! list read by the status endpoint.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::model::{Action, PullRequest};

/// Per-subpool outcome published after an iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    #[serde(rename = "Org")]
    pub org: String,
    #[serde(rename = "Repo")]
    pub repo: String,
    #[serde(rename = "Branch")]
    pub branch: String,
    #[serde(rename = "SuccessPRs")]
    pub success_prs: Vec<PullRequest>,
    #[serde(rename = "PendingPRs")]
    pub pending_prs: Vec<PullRequest>,
    #[serde(rename = "MissingPRs")]
    pub missing_prs: Vec<PullRequest>,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Target")]
    pub targets: Vec<PullRequest>,
}

impl PoolSnapshot {
    pub fn from_action(
        org: String,
        repo: String,
        branch: String,
        success_prs: Vec<PullRequest>,
        pending_prs: Vec<PullRequest>,
        missing_prs: Vec<PullRequest>,
        action: &Action,
    ) -> Self {
        Self {
            org,
            repo,
            branch,
            success_prs,
            pending_prs,
            missing_prs,
            action: action.kind().to_string(),
            targets: action.targets().into_iter().cloned().collect(),
        }
    }
}

/// Holds the published list behind a single lock. The control loop builds
/// the next iteration's list locally, subpool by subpool, and swaps it in
/// with one short-lived lock via [`SnapshotStore::publish`]; readers always
/// see a complete prior list, never a partially-built one.
#[derive(Default)]
pub struct SnapshotStore {
    inner: Mutex<Vec<PoolSnapshot>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
        }
    }

    /// Replaces the published list. Called once per iteration, after every
    /// subpool has been synced.
    pub fn publish(&self, snapshots: Vec<PoolSnapshot>) {
        let mut guard = self.inner.lock().expect("snapshot mutex poisoned");
        *guard = snapshots;
    }

    /// Returns a clone of the currently published list.
    pub fn read(&self) -> Vec<PoolSnapshot> {
        self.inner.lock().expect("snapshot mutex poisoned").clone()
    }
}
