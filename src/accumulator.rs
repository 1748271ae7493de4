//! Classifies pull requests by aggregate presubmit state and detects a
//! still-valid batch result.
//!
//! Both sub-algorithms share the monotone state lattice from
//! [`crate::model::SimpleState`], the single source of correctness for
//! classification.

use std::collections::{BTreeMap, HashMap};

use crate::config::PresubmitConfig;
use crate::model::{Job, JobType, PullRequest, SimpleState, Subpool};

/// The three disjoint per-PR lists produced by aggregate classification.
#[derive(Debug, Default, Clone)]
pub struct PerPrClassification {
    pub successes: Vec<PullRequest>,
    pub pendings: Vec<PullRequest>,
    pub nones: Vec<PullRequest>,
}

/// Folds a sequence of raw job records into one slot's best-known state.
///
/// The first record observed sets the baseline. Every record after that can
/// only move the slot from `Pending` to `Success`, never from `None` to
/// anything, and never downward. A slot with no records at all is `None`.
fn fold_slot(records: impl Iterator<Item = SimpleState>) -> SimpleState {
    let mut acc: Option<SimpleState> = None;
    for state in records {
        acc = Some(match acc {
            None => state,
            Some(SimpleState::Pending) if state == SimpleState::Success => SimpleState::Success,
            Some(prev) => prev,
        });
    }
    acc.unwrap_or(SimpleState::None)
}

/// Computes the best-known slot for `(pr_number, presubmit_name)` among a
/// set of presubmit-type jobs. Only the first pull in a presubmit job's
/// refs is inspected when matching by PR number.
fn presubmit_slot(jobs: &[Job], pr_number: u64, presubmit_name: &str) -> SimpleState {
    fold_slot(
        jobs.iter()
            .filter(|j| j.job_type == JobType::Presubmit)
            .filter(|j| j.job_name == presubmit_name)
            .filter(|j| j.refs.pulls.first().map(|p| p.number) == Some(pr_number))
            .map(|j| SimpleState::from_job_state(j.state)),
    )
}

fn pr_aggregate(slots: &[SimpleState]) -> SimpleState {
    if slots.iter().all(|s| *s == SimpleState::Success) {
        SimpleState::Success
    } else if slots
        .iter()
        .all(|s| matches!(s, SimpleState::Success | SimpleState::Pending))
    {
        SimpleState::Pending
    } else {
        SimpleState::None
    }
}

/// Classifies every PR in `subpool` by aggregate presubmit state.
/// `presubmits` should already be filtered to those configured for the
/// subpool's `(org, repo)` and applicable to its branch.
pub fn classify_per_pr(
    subpool: &Subpool,
    presubmits: &[PresubmitConfig],
) -> PerPrClassification {
    let mut out = PerPrClassification::default();
    for pr in &subpool.prs {
        let slots: Vec<SimpleState> = presubmits
            .iter()
            .map(|p| presubmit_slot(&subpool.jobs, pr.number, &p.name))
            .collect();
        match pr_aggregate(&slots) {
            SimpleState::Success => out.successes.push(pr.clone()),
            SimpleState::Pending => out.pendings.push(pr.clone()),
            SimpleState::None => out.nones.push(pr.clone()),
        }
    }
    out
}

/// Outcome of the batch accumulator.
#[derive(Debug, Clone, Default)]
pub struct BatchClassification {
    /// The PRs of the first mergeable batch group, if any.
    pub mergeable: Vec<PullRequest>,
    /// True iff any batch job (in any group) has simple state `Pending`.
    /// When true, no merge of any kind should proceed this iteration.
    pub batch_pending: bool,
}

/// Detects whether a previously-executed batch job still describes a
/// mergeable set.
pub fn classify_batch(
    subpool: &Subpool,
    presubmits: &[PresubmitConfig],
) -> BatchClassification {
    let batch_jobs: Vec<&Job> = subpool
        .jobs
        .iter()
        .filter(|j| j.job_type == JobType::Batch)
        .collect();

    if batch_jobs
        .iter()
        .any(|j| SimpleState::from_job_state(j.state) == SimpleState::Pending)
    {
        return BatchClassification {
            mergeable: Vec::new(),
            batch_pending: true,
        };
    }

    // Group by refs signature; iterate in sorted signature order so the
    // choice among multiple simultaneously-mergeable groups is stable.
    let mut groups: BTreeMap<String, Vec<&Job>> = BTreeMap::new();
    for job in &batch_jobs {
        groups
            .entry(job.refs.signature())
            .or_default()
            .push(job);
    }

    let pr_by_number: HashMap<u64, &PullRequest> =
        subpool.prs.iter().map(|p| (p.number, p)).collect();

    for (_sig, group_jobs) in groups {
        let refs = &group_jobs[0].refs;
        let valid = refs.pulls.iter().all(|pull| {
            pr_by_number
                .get(&pull.number)
                .is_some_and(|pr| pr.head_oid == pull.sha)
        });
        if !valid {
            continue;
        }

        let mut by_job_name: HashMap<&str, Vec<SimpleState>> = HashMap::new();
        for job in &group_jobs {
            by_job_name
                .entry(job.job_name.as_str())
                .or_default()
                .push(SimpleState::from_job_state(job.state));
        }
        let rolled: HashMap<&str, SimpleState> = by_job_name
            .into_iter()
            .map(|(name, states)| (name, fold_slot(states.into_iter())))
            .collect();

        let mergeable = presubmits
            .iter()
            .all(|p| rolled.get(p.name.as_str()) == Some(&SimpleState::Success));
        if mergeable {
            let targets = refs
                .pulls
                .iter()
                .filter_map(|pull| pr_by_number.get(&pull.number).map(|pr| (*pr).clone()))
                .collect();
            return BatchClassification {
                mergeable: targets,
                batch_pending: false,
            };
        }
    }

    BatchClassification {
        mergeable: Vec::new(),
        batch_pending: false,
    }
}

/// Selects, from `prs`, the PR with the smallest number whose head commit's
/// rolled-up status is the literal string `SUCCESS`.
pub fn smallest_passing(prs: &[PullRequest]) -> Option<PullRequest> {
    prs.iter()
        .filter(|pr| pr.head_is_success())
        .min_by_key(|pr| pr.number)
        .cloned()
}
