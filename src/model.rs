//! Core data model: pull requests, jobs, and the subpool working unit.
//!
//! Everything here is a value type. The controller never mutates a
//! [`PullRequest`] or [`Job`] after construction; each iteration builds a
//! fresh set from freshly-observed input and discards it at the end.

use serde::{Deserialize, Serialize};

/// Identity of a repository on the code-forge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId {
    pub org: String,
    pub repo: String,
}

impl RepoId {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
        }
    }
}

/// An immutable-per-iteration snapshot of a candidate pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub author_login: String,
    pub repo: RepoId,
    pub base_branch: String,
    pub base_ref_prefix: String,
    pub head_oid: String,
    /// Rolled-up status state of the head commit, e.g. `"SUCCESS"`.
    pub head_status: String,
}

impl PullRequest {
    /// Whether this PR's head commit rolled up to the literal string `SUCCESS`.
    pub fn head_is_success(&self) -> bool {
        self.head_status == "SUCCESS"
    }
}

/// The kind of test execution a [`Job`] records. Other forge-reported types
/// exist upstream but are not interpreted by this controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    Presubmit,
    Batch,
    #[serde(other)]
    Other,
}

/// Raw job execution state as reported by the job substrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Triggered,
    Pending,
    Success,
    Failure,
    Error,
    #[serde(other)]
    Other,
}

/// One pull request as referenced from a job's `refs`: its number plus the
/// head oid that was actually tested, which may since have moved on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRef {
    pub number: u64,
    pub sha: String,
}

/// What a job tested: a base commit plus an ordered list of PR heads merged
/// onto it. Two jobs with an identical `Refs` tested the identical input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refs {
    pub org: String,
    pub repo: String,
    pub base_ref: String,
    pub base_sha: String,
    pub pulls: Vec<PullRef>,
}

impl Refs {
    /// Canonical signature used to group batch jobs that tested the same
    /// input: base sha plus the ordered list of (number, sha) pairs.
    pub fn signature(&self) -> String {
        let mut s = format!("{}/{}@{}", self.org, self.repo, self.base_sha);
        for p in &self.pulls {
            s.push(':');
            s.push_str(&p.number.to_string());
            s.push('=');
            s.push_str(&p.sha);
        }
        s
    }
}

/// A record of one test execution against a set of refs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub job_type: JobType,
    pub job_name: String,
    pub state: JobState,
    pub refs: Refs,
}

/// The coarse, three-valued classification lattice shared by the per-PR
/// and batch accumulators. Never downgrades within one aggregation pass:
/// `None` → `Pending` → `Success` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SimpleState {
    None,
    Pending,
    Success,
}

impl SimpleState {
    /// Maps a raw job state onto the coarse lattice.
    pub fn from_job_state(state: JobState) -> Self {
        match state {
            JobState::Triggered | JobState::Pending => SimpleState::Pending,
            JobState::Success => SimpleState::Success,
            JobState::Failure | JobState::Error | JobState::Other => SimpleState::None,
        }
    }

    /// Applies the monotone upgrade rule: only `Pending -> Success` is a
    /// permitted upgrade; anything else leaves `self` unchanged once it has
    /// moved off `None`... except the very first observation always sets
    /// the slot (see doc on callers). This method only ever moves forward
    /// or stays put, never backward.
    pub fn upgrade(self, next: SimpleState) -> Self {
        use SimpleState::*;
        match (self, next) {
            (None, Pending) => Pending,
            (None, Success) => Success,
            (Pending, Success) => Success,
            (s, _) => s,
        }
    }
}

/// The one action a subpool's iteration can select. Closed by
/// construction: no extension point at the type level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Action {
    Wait,
    Trigger { target: PullRequest },
    TriggerBatch { targets: Vec<PullRequest> },
    Merge { target: PullRequest },
    MergeBatch { targets: Vec<PullRequest> },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Wait => "WAIT",
            Action::Trigger { .. } => "TRIGGER",
            Action::TriggerBatch { .. } => "TRIGGER_BATCH",
            Action::Merge { .. } => "MERGE",
            Action::MergeBatch { .. } => "MERGE_BATCH",
        }
    }

    pub fn targets(&self) -> Vec<&PullRequest> {
        match self {
            Action::Wait => vec![],
            Action::Trigger { target } | Action::Merge { target } => vec![target],
            Action::TriggerBatch { targets } | Action::MergeBatch { targets } => {
                targets.iter().collect()
            }
        }
    }
}

/// The transient per-iteration working unit for one (org, repo, branch).
#[derive(Debug, Clone)]
pub struct Subpool {
    pub org: String,
    pub repo: String,
    pub branch: String,
    pub base_sha: String,
    pub prs: Vec<PullRequest>,
    pub jobs: Vec<Job>,
}

impl Subpool {
    pub fn key(&self) -> (String, String, String) {
        (self.org.clone(), self.repo.clone(), self.branch.clone())
    }
}
