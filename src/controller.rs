//! Orchestrates one full iteration: collector → partitioner → accumulator
//! → action selector → executor → snapshot, following the per-subpool
//! state machine `Start → Accumulate → Select → (Execute | skip if
//! dry-run) → Publish`.
//!
//! All collaborator calls here are blocking; the async driver in `main`
//! runs `run_iteration` inside `spawn_blocking` so the status endpoint
//! stays responsive.

use anyhow::Context;
use tracing::{error, info, info_span};

use crate::accumulator::{classify_batch, classify_per_pr};
use crate::config::Config;
use crate::error::{CoreError, Result};
use crate::executor::execute;
use crate::forge::{search_pull_requests_all, CodeForge};
use crate::jobs::JobSubstrate;
use crate::model::PullRequest;
use crate::partitioner::partition;
use crate::picker::pick;
use crate::repo_tool::RepoTool;
use crate::selector::select;
use crate::snapshot::{PoolSnapshot, SnapshotStore};

/// Collector: unions PRs across all configured queries, tolerating
/// duplicates (deduplication across queries is left unspecified).
pub fn collect(forge: &dyn CodeForge, queries: &[String]) -> Result<Vec<PullRequest>> {
    let mut out = Vec::new();
    for query in queries {
        let prs = search_pull_requests_all(forge, query)
            .map_err(|e| CoreError::Transient(e.context(format!("collecting query {query:?}"))))?;
        out.extend(prs);
    }
    Ok(out)
}

/// Runs exactly one iteration: collects candidates, partitions, decides,
/// executes, and publishes a fresh snapshot list. Returns an error only for
/// a transient or invariant failure that should abort the whole iteration;
/// partial per-subpool work already performed is not rolled back, since the
/// next iteration re-derives everything from freshly observed state anyway.
pub fn run_iteration(
    forge: &dyn CodeForge,
    jobs: &dyn JobSubstrate,
    repo_tool: &dyn RepoTool,
    config: &Config,
    store: &SnapshotStore,
) -> Result<()> {
    let prs = collect(forge, &config.queries)?;
    let all_jobs = jobs
        .list_jobs()
        .map_err(|e| CoreError::Transient(e.context("listing jobs")))?;
    let subpools = partition(forge, prs, all_jobs)
        .map_err(|e| CoreError::Transient(e.context("partitioning candidates")))?;

    // Built up locally and swapped into the store in one call at the end,
    // rather than published incrementally per subpool.
    let mut snapshots = Vec::with_capacity(subpools.len());

    for subpool in &subpools {
        let span = info_span!("subpool", org = %subpool.org, repo = %subpool.repo, branch = %subpool.branch);
        let _enter = span.enter();

        let presubmits: Vec<_> = config
            .presubmits_for(&subpool.org, &subpool.repo)
            .iter()
            .filter(|p| p.runs_against_branch(&subpool.branch))
            .cloned()
            .collect();

        let per_pr = classify_per_pr(subpool, &presubmits);
        let batch = classify_batch(subpool, &presubmits);

        let mut action = select(&per_pr, &batch, subpool.prs.len(), None);
        if action == crate::model::Action::Wait
            && subpool.prs.len() > 1
            && !batch.batch_pending
        {
            match pick(repo_tool, subpool).context("running batch picker") {
                Ok(picked) => {
                    action = select(&per_pr, &batch, subpool.prs.len(), Some(&picked));
                }
                Err(e) => {
                    return Err(CoreError::Transient(e));
                }
            }
        }

        info!(action = action.kind(), "selected action");

        execute(
            forge,
            jobs,
            &subpool.org,
            &subpool.repo,
            &subpool.branch,
            &subpool.base_sha,
            &presubmits,
            &action,
            config.dry_run,
        )?;

        snapshots.push(PoolSnapshot::from_action(
            subpool.org.clone(),
            subpool.repo.clone(),
            subpool.branch.clone(),
            per_pr.successes,
            per_pr.pendings,
            per_pr.nones,
            &action,
        ));
    }

    store.publish(snapshots);
    Ok(())
}

/// Runs `run_iteration` and logs (rather than propagates) a failure, since
/// the outer driver loop continues regardless: the next iteration retries
/// from scratch.
pub fn run_iteration_logged(
    forge: &dyn CodeForge,
    jobs: &dyn JobSubstrate,
    repo_tool: &dyn RepoTool,
    config: &Config,
    store: &SnapshotStore,
) {
    if let Err(e) = run_iteration(forge, jobs, repo_tool, config, store) {
        error!(error = %e, "iteration aborted");
    }
}
