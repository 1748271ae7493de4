//! Executor: turns a selected [`Action`] into side effects. Under dry-run,
//! the action and targets are still returned for snapshot reporting, but
//! no forge- or substrate-mutating call is made.

use tracing::{info, warn};

use crate::config::PresubmitConfig;
use crate::error::{CoreError, MergeOutcome, Result};
use crate::forge::CodeForge;
use crate::jobs::JobSubstrate;
use crate::model::{Action, Job, JobType, PullRef, Refs};

/// Executes `action` against `(org, repo, branch=base_ref, base_sha)`.
/// `presubmits` should already be filtered to those applicable to the
/// branch; each that is `always_run` and not `skip_report` is triggered.
pub fn execute(
    forge: &dyn CodeForge,
    jobs: &dyn JobSubstrate,
    org: &str,
    repo: &str,
    base_ref: &str,
    base_sha: &str,
    presubmits: &[PresubmitConfig],
    action: &Action,
    dry_run: bool,
) -> Result<()> {
    match action {
        Action::Wait => Ok(()),
        Action::Trigger { target } => {
            trigger(jobs, org, repo, base_ref, base_sha, presubmits, &[target.clone()], dry_run)
        }
        Action::TriggerBatch { targets } => {
            trigger(jobs, org, repo, base_ref, base_sha, presubmits, targets, dry_run)
        }
        Action::Merge { target } => merge_one(forge, &crate::model::RepoId::new(org, repo), target.number, &target.head_oid, dry_run),
        Action::MergeBatch { targets } => {
            for target in targets {
                merge_one(
                    forge,
                    &crate::model::RepoId::new(org, repo),
                    target.number,
                    &target.head_oid,
                    dry_run,
                )?;
            }
            Ok(())
        }
    }
}

fn trigger(
    jobs: &dyn JobSubstrate,
    org: &str,
    repo: &str,
    base_ref: &str,
    base_sha: &str,
    presubmits: &[PresubmitConfig],
    targets: &[crate::model::PullRequest],
    dry_run: bool,
) -> Result<()> {
    let pulls: Vec<PullRef> = targets
        .iter()
        .map(|pr| PullRef {
            number: pr.number,
            sha: pr.head_oid.clone(),
        })
        .collect();
    let job_type = if pulls.len() == 1 {
        JobType::Presubmit
    } else {
        JobType::Batch
    };

    for presubmit in presubmits {
        if !presubmit.always_run || presubmit.skip_report {
            continue;
        }
        let job = Job {
            job_type,
            job_name: presubmit.name.clone(),
            state: crate::model::JobState::Triggered,
            refs: Refs {
                org: org.to_string(),
                repo: repo.to_string(),
                base_ref: base_ref.to_string(),
                base_sha: base_sha.to_string(),
                pulls: pulls.clone(),
            },
        };
        if dry_run {
            info!(presubmit = %presubmit.name, ?job_type, "dry-run: would submit job");
            continue;
        }
        jobs.submit_job(&job)
            .map_err(|e| CoreError::Transient(e.context("submitting triggered job")))?;
    }
    Ok(())
}

fn merge_one(
    forge: &dyn CodeForge,
    repo: &crate::model::RepoId,
    number: u64,
    head_sha: &str,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        info!(number, "dry-run: would request merge");
        return Ok(());
    }
    match forge.merge(repo, number, head_sha) {
        Ok(MergeOutcome::Ok) => {
            info!(number, "merged");
            Ok(())
        }
        Ok(MergeOutcome::ModifiedHead) => {
            warn!(number, "merge skipped: head changed since observation");
            Ok(())
        }
        Ok(MergeOutcome::Unmergeable) => {
            warn!(number, "merge skipped: forge reports unmergeable");
            Ok(())
        }
        Err(e) => Err(CoreError::Transient(e.context(format!("requesting merge of #{number}")))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PullRequest, RepoId};
    use crate::testutil::{FakeCodeForge, FakeJobSubstrate};
    use std::collections::HashMap;

    fn presubmit(name: &str, always_run: bool, skip_report: bool) -> PresubmitConfig {
        PresubmitConfig {
            name: name.to_string(),
            always_run,
            skip_report,
            branches: vec![],
            labels: HashMap::new(),
        }
    }

    fn pr(number: u64) -> PullRequest {
        PullRequest {
            number,
            author_login: "alice".into(),
            repo: RepoId::new("acme", "widgets"),
            base_branch: "main".into(),
            base_ref_prefix: "refs/heads/".into(),
            head_oid: format!("sha{number}"),
            head_status: "SUCCESS".into(),
        }
    }

    #[test]
    fn wait_performs_no_side_effects() {
        let forge = FakeCodeForge::new();
        let jobs = FakeJobSubstrate::new();
        execute(
            &forge, &jobs, "acme", "widgets", "main", "base", &[], &Action::Wait, false,
        )
        .unwrap();
        assert!(jobs.submitted().is_empty());
        assert!(forge.merges_called().is_empty());
    }

    #[test]
    fn trigger_submits_one_job_per_always_run_presubmit() {
        let forge = FakeCodeForge::new();
        let jobs = FakeJobSubstrate::new();
        let presubmits = vec![
            presubmit("p1", true, false),
            presubmit("p2", false, false),
            presubmit("p3", true, true),
        ];
        let action = Action::Trigger { target: pr(7) };
        execute(
            &forge, &jobs, "acme", "widgets", "main", "base123", &presubmits, &action, false,
        )
        .unwrap();
        let submitted = jobs.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].job_name, "p1");
        assert_eq!(submitted[0].job_type, JobType::Presubmit);
        assert_eq!(submitted[0].refs.pulls.len(), 1);
        assert_eq!(submitted[0].refs.pulls[0].number, 7);
    }

    #[test]
    fn trigger_batch_uses_batch_job_type_for_multiple_targets() {
        let forge = FakeCodeForge::new();
        let jobs = FakeJobSubstrate::new();
        let presubmits = vec![presubmit("p1", true, false)];
        let action = Action::TriggerBatch {
            targets: vec![pr(9), pr(12)],
        };
        execute(
            &forge, &jobs, "acme", "widgets", "main", "base123", &presubmits, &action, false,
        )
        .unwrap();
        let submitted = jobs.submitted();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].job_type, JobType::Batch);
        assert_eq!(submitted[0].refs.pulls.len(), 2);
    }

    #[test]
    fn dry_run_trigger_submits_nothing() {
        let forge = FakeCodeForge::new();
        let jobs = FakeJobSubstrate::new();
        let presubmits = vec![presubmit("p1", true, false)];
        let action = Action::Trigger { target: pr(7) };
        execute(
            &forge, &jobs, "acme", "widgets", "main", "base123", &presubmits, &action, true,
        )
        .unwrap();
        assert!(jobs.submitted().is_empty());
    }

    #[test]
    fn merge_swallows_modified_head_and_continues() {
        let forge = FakeCodeForge::new().with_merge_outcome(
            "acme",
            "widgets",
            5,
            MergeOutcome::ModifiedHead,
        );
        let jobs = FakeJobSubstrate::new();
        let action = Action::Merge { target: pr(5) };
        let result = execute(
            &forge, &jobs, "acme", "widgets", "main", "base123", &[], &action, false,
        );
        assert!(result.is_ok());
        assert_eq!(forge.merges_called().len(), 1);
    }

    #[test]
    fn dry_run_merge_requests_nothing() {
        let forge = FakeCodeForge::new();
        let jobs = FakeJobSubstrate::new();
        let action = Action::Merge { target: pr(5) };
        execute(
            &forge, &jobs, "acme", "widgets", "main", "base123", &[], &action, true,
        )
        .unwrap();
        assert!(forge.merges_called().is_empty());
    }
}
