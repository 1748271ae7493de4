//! Code-forge client: the collaborator interface the core calls against,
//! plus a default HTTP-backed implementation.
//!
//! The teacher (`src/github.rs`) talks to GitHub by shelling out to the `gh`
//! CLI, which is the right call for an interactive one-shot tool reusing the
//! user's own authenticated session. A service that issues these same calls
//! on every tick with no interactive session to reuse is better served by a
//! direct HTTP client, grounded on `tansanrao-nexus`'s `reqwest` dependency.
//! Trait methods are blocking; the control loop runs them inside
//! `spawn_blocking` so the async status endpoint stays responsive.

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::error::MergeOutcome;
use crate::model::{PullRequest, RepoId};

/// One page of paginated results plus an opaque continuation cursor.
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Narrow capability set for the forge operations the core actually calls.
/// Kept trait-object safe so the controller can hold a `dyn CodeForge`
/// built once at startup.
pub trait CodeForge: Send + Sync {
    /// Returns the current commit of `org/repo`'s `ref` (e.g. `heads/main`).
    fn resolve_ref(&self, org: &str, repo: &str, r#ref: &str) -> Result<String>;

    /// Executes one page of a structured PR search. `cursor` is `None` for
    /// the first page and the `next_cursor` from the prior page thereafter.
    fn search_pull_requests_page(
        &self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PullRequest>>;

    /// Requests a merge of `number` at the expected `head_sha`.
    fn merge(&self, repo: &RepoId, number: u64, head_sha: &str) -> Result<MergeOutcome>;
}

/// Runs a search query to exhaustion, following cursors until the forge
/// signals no next page. 100 results per page is the design target; the
/// target itself is chosen by the forge and opaque here.
pub fn search_pull_requests_all(forge: &dyn CodeForge, query: &str) -> Result<Vec<PullRequest>> {
    let mut out = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = forge
            .search_pull_requests_page(query, cursor.as_deref())
            .with_context(|| format!("querying forge for {query:?}"))?;
        out.extend(page.items);
        match page.next_cursor {
            Some(c) => cursor = Some(c),
            None => break,
        }
    }
    Ok(out)
}

/// GraphQL/REST-backed [`CodeForge`] implementation.
pub struct HttpCodeForge {
    client: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

impl HttpCodeForge {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
        }
    }

    fn authed(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        req.bearer_auth(&self.token)
            .header("user-agent", "tide-merge-queue")
    }
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct SearchResponse {
    items: Vec<PullRequestNode>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct PullRequestNode {
    number: u64,
    author_login: String,
    org: String,
    repo: String,
    base_branch: String,
    base_ref_prefix: String,
    head_oid: String,
    head_status: String,
}

impl From<PullRequestNode> for PullRequest {
    fn from(n: PullRequestNode) -> Self {
        PullRequest {
            number: n.number,
            author_login: n.author_login,
            repo: RepoId::new(n.org, n.repo),
            base_branch: n.base_branch,
            base_ref_prefix: n.base_ref_prefix,
            head_oid: n.head_oid,
            head_status: n.head_status,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum MergeResponseOutcome {
    Ok,
    ModifiedHead,
    Unmergeable,
}

#[derive(Deserialize)]
struct MergeResponse {
    outcome: MergeResponseOutcome,
}

impl CodeForge for HttpCodeForge {
    fn resolve_ref(&self, org: &str, repo: &str, r#ref: &str) -> Result<String> {
        let url = format!("{}/repos/{org}/{repo}/git/{ref}", self.api_base);
        let resp = self
            .authed(self.client.get(&url))
            .send()
            .with_context(|| format!("resolving ref {ref} for {org}/{repo}"))?
            .error_for_status()
            .with_context(|| format!("forge rejected ref resolution for {org}/{repo}"))?;
        let body: RefResponse = resp
            .json()
            .with_context(|| format!("decoding ref response for {org}/{repo}"))?;
        Ok(body.object.sha)
    }

    fn search_pull_requests_page(
        &self,
        query: &str,
        cursor: Option<&str>,
    ) -> Result<Page<PullRequest>> {
        let url = format!("{}/search/pulls", self.api_base);
        let mut req = self.authed(self.client.get(&url)).query(&[
            ("q", query),
            ("per_page", "100"),
        ]);
        if let Some(c) = cursor {
            req = req.query(&[("cursor", c)]);
        }
        let resp = req
            .send()
            .with_context(|| format!("searching pull requests for {query:?}"))?
            .error_for_status()
            .with_context(|| format!("forge rejected search {query:?}"))?;
        let body: SearchResponse = resp
            .json()
            .with_context(|| format!("decoding search response for {query:?}"))?;
        Ok(Page {
            items: body.items.into_iter().map(Into::into).collect(),
            next_cursor: body.next_cursor,
        })
    }

    fn merge(&self, repo: &RepoId, number: u64, head_sha: &str) -> Result<MergeOutcome> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/merge",
            self.api_base, repo.org, repo.repo, number
        );
        let resp = self
            .authed(self.client.put(&url))
            .json(&serde_json::json!({ "sha": head_sha }))
            .send()
            .with_context(|| format!("requesting merge of #{number}"))?;
        let status = resp.status();
        if status == reqwest::StatusCode::CONFLICT {
            return Ok(MergeOutcome::ModifiedHead);
        }
        if status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            return Ok(MergeOutcome::Unmergeable);
        }
        let resp = resp
            .error_for_status()
            .with_context(|| format!("forge rejected merge of #{number}"))?;
        let body: Result<MergeResponse, _> = resp.json();
        match body {
            Ok(MergeResponse {
                outcome: MergeResponseOutcome::ModifiedHead,
            }) => Ok(MergeOutcome::ModifiedHead),
            Ok(MergeResponse {
                outcome: MergeResponseOutcome::Unmergeable,
            }) => Ok(MergeOutcome::Unmergeable),
            Ok(MergeResponse {
                outcome: MergeResponseOutcome::Ok,
            }) => Ok(MergeOutcome::Ok),
            Err(_) => {
                bail!("unrecognized merge response for #{number}")
            }
        }
    }
}
