//! In-memory fakes for the three collaborator traits, used by unit tests
//! across the crate. The narrow trait-object boundaries exist specifically
//! so the core can be tested against fakes instead of live network services.

#![cfg(test)]

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

use crate::error::MergeOutcome;
use crate::forge::{CodeForge, Page};
use crate::jobs::JobSubstrate;
use crate::model::{Job, PullRequest, RepoId};

/// A scriptable [`CodeForge`]: ref resolutions are pre-seeded, PR search
/// returns one fixed page, and merges are recorded for later assertions.
#[derive(Default)]
pub struct FakeCodeForge {
    refs: HashMap<(String, String, String), String>,
    search_results: Vec<PullRequest>,
    merge_outcomes: HashMap<(String, String, u64), MergeOutcome>,
    merges_called: Mutex<Vec<(String, String, u64, String)>>,
}

impl FakeCodeForge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the response for `resolve_ref(org, repo, branch)`, where
    /// `branch` is the bare branch name (no `refs/heads/` prefix).
    pub fn with_ref(mut self, org: &str, repo: &str, branch: &str, sha: &str) -> Self {
        self.refs.insert(
            (org.to_string(), repo.to_string(), branch.to_string()),
            sha.to_string(),
        );
        self
    }

    /// Seeds the single page returned by `search_pull_requests_page`.
    pub fn with_search_results(mut self, prs: Vec<PullRequest>) -> Self {
        self.search_results = prs;
        self
    }

    /// Seeds the outcome `merge(repo, number, ...)` should return.
    pub fn with_merge_outcome(
        mut self,
        org: &str,
        repo: &str,
        number: u64,
        outcome: MergeOutcome,
    ) -> Self {
        self.merge_outcomes
            .insert((org.to_string(), repo.to_string(), number), outcome);
        self
    }

    /// All `(org, repo, number, head_sha)` tuples passed to `merge` so far.
    pub fn merges_called(&self) -> Vec<(String, String, u64, String)> {
        self.merges_called.lock().unwrap().clone()
    }
}

impl CodeForge for FakeCodeForge {
    fn resolve_ref(&self, org: &str, repo: &str, r#ref: &str) -> Result<String> {
        let branch = r#ref.strip_prefix("heads/").unwrap_or(r#ref);
        self.refs
            .get(&(org.to_string(), repo.to_string(), branch.to_string()))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no seeded ref for {org}/{repo} {ref}"))
    }

    fn search_pull_requests_page(
        &self,
        _query: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PullRequest>> {
        if cursor.is_some() {
            return Ok(Page {
                items: Vec::new(),
                next_cursor: None,
            });
        }
        Ok(Page {
            items: self.search_results.clone(),
            next_cursor: None,
        })
    }

    fn merge(&self, repo: &RepoId, number: u64, head_sha: &str) -> Result<MergeOutcome> {
        self.merges_called.lock().unwrap().push((
            repo.org.clone(),
            repo.repo.clone(),
            number,
            head_sha.to_string(),
        ));
        Ok(self
            .merge_outcomes
            .get(&(repo.org.clone(), repo.repo.clone(), number))
            .cloned()
            .unwrap_or(MergeOutcome::Ok))
    }
}

/// A scriptable [`JobSubstrate`]: returns a fixed job list, records
/// submissions, and echoes each submitted job back as its own response.
#[derive(Default)]
pub struct FakeJobSubstrate {
    jobs: Vec<Job>,
    submitted: Mutex<Vec<Job>>,
}

impl FakeJobSubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(mut self, jobs: Vec<Job>) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn submitted(&self) -> Vec<Job> {
        self.submitted.lock().unwrap().clone()
    }
}

impl JobSubstrate for FakeJobSubstrate {
    fn list_jobs(&self) -> Result<Vec<Job>> {
        Ok(self.jobs.clone())
    }

    fn submit_job(&self, job: &Job) -> Result<Job> {
        self.submitted.lock().unwrap().push(job.clone());
        Ok(job.clone())
    }
}

// `RepoTool` has no in-memory fake here: its `Workspace` wraps a concrete
// `git2::Repository`, so picker tests instead exercise `Git2RepoTool`
// against a real temporary git repository, the same way `repo_tool`'s own
// tests do (see `picker` module tests).
