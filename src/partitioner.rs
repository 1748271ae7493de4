//! Groups candidate PRs into per-(org, repo, branch) subpools and discards
//! stale jobs.

use std::collections::HashMap;

use anyhow::Result;

use crate::forge::CodeForge;
use crate::model::{Job, JobType, PullRequest, Subpool};

/// Builds subpools from the candidate PR set and the full live job set.
///
/// For each distinct `(org, repo, branch)` key, resolves the branch's
/// current head commit via `<prefix><branch-name>` stripped of the leading
/// `refs/`, which becomes the subpool's `base_sha`. A job is kept only if
/// its own `(org, repo, base_ref)` matches a known subpool key and its
/// `refs.base_sha` equals that subpool's resolved sha. This is what keeps
/// a stale batch from influencing a decision after the branch has moved.
pub fn partition(
    forge: &dyn CodeForge,
    prs: Vec<PullRequest>,
    jobs: Vec<Job>,
) -> Result<Vec<Subpool>> {
    let mut by_key: HashMap<(String, String, String), Subpool> = HashMap::new();

    for pr in prs {
        let key = (
            pr.repo.org.clone(),
            pr.repo.repo.clone(),
            pr.base_branch.clone(),
        );
        let base_sha = match by_key.get(&key) {
            Some(sp) => sp.base_sha.clone(),
            None => {
                let r#ref = format!("{}{}", pr.base_ref_prefix, pr.base_branch);
                let stripped = r#ref.strip_prefix("refs/").unwrap_or(&r#ref);
                forge.resolve_ref(&pr.repo.org, &pr.repo.repo, stripped)?
            }
        };
        by_key
            .entry(key.clone())
            .or_insert_with(|| Subpool {
                org: pr.repo.org.clone(),
                repo: pr.repo.repo.clone(),
                branch: pr.base_branch.clone(),
                base_sha,
                prs: Vec::new(),
                jobs: Vec::new(),
            })
            .prs
            .push(pr);
    }

    for job in jobs {
        if !matches!(job.job_type, JobType::Presubmit | JobType::Batch) {
            continue;
        }
        let key = (
            job.refs.org.clone(),
            job.refs.repo.clone(),
            job.refs.base_ref.clone(),
        );
        if let Some(sp) = by_key.get_mut(&key) {
            if sp.base_sha == job.refs.base_sha {
                sp.jobs.push(job);
            }
        }
    }

    Ok(by_key.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JobState, PullRef, RepoId, Refs};
    use crate::testutil::FakeCodeForge;

    fn pr(number: u64, org: &str, repo: &str, branch: &str, head_oid: &str) -> PullRequest {
        PullRequest {
            number,
            author_login: "alice".into(),
            repo: RepoId::new(org, repo),
            base_branch: branch.into(),
            base_ref_prefix: "refs/heads/".into(),
            head_oid: head_oid.into(),
            head_status: "SUCCESS".into(),
        }
    }

    #[test]
    fn groups_by_org_repo_branch_and_resolves_base_sha() {
        let forge = FakeCodeForge::new().with_ref("acme", "widgets", "main", "base123");
        let prs = vec![pr(1, "acme", "widgets", "main", "h1")];
        let pools = partition(&forge, prs, vec![]).unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].base_sha, "base123");
        assert_eq!(pools[0].prs.len(), 1);
    }

    #[test]
    fn discards_jobs_with_stale_base_sha() {
        let forge = FakeCodeForge::new().with_ref("acme", "widgets", "main", "base123");
        let prs = vec![pr(1, "acme", "widgets", "main", "h1")];
        let stale_job = Job {
            job_type: JobType::Presubmit,
            job_name: "p1".into(),
            state: JobState::Success,
            refs: Refs {
                org: "acme".into(),
                repo: "widgets".into(),
                base_ref: "main".into(),
                base_sha: "stale-sha".into(),
                pulls: vec![PullRef {
                    number: 1,
                    sha: "h1".into(),
                }],
            },
        };
        let pools = partition(&forge, prs, vec![stale_job]).unwrap();
        assert_eq!(pools[0].jobs.len(), 0);
    }

    #[test]
    fn discards_jobs_for_unknown_key() {
        let forge = FakeCodeForge::new().with_ref("acme", "widgets", "main", "base123");
        let prs = vec![pr(1, "acme", "widgets", "main", "h1")];
        let unrelated_job = Job {
            job_type: JobType::Presubmit,
            job_name: "p1".into(),
            state: JobState::Success,
            refs: Refs {
                org: "acme".into(),
                repo: "other".into(),
                base_ref: "main".into(),
                base_sha: "base123".into(),
                pulls: vec![PullRef {
                    number: 1,
                    sha: "h1".into(),
                }],
            },
        };
        let pools = partition(&forge, prs, vec![unrelated_job]).unwrap();
        assert_eq!(pools[0].jobs.len(), 0);
    }
}
