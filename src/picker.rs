//! Batch picker: constructs a candidate speculative batch by simulating
//! merges locally against a scratch clone.

use anyhow::Result;

use crate::model::{PullRequest, Subpool};
use crate::repo_tool::RepoTool;

/// The PRs a picker run would include in a speculative batch, in subpool
/// order. A result of size ≤ 1 is not itself a batch; the action selector
/// enforces the `>1` guard from rule 4.
#[derive(Debug, Clone, Default)]
pub struct PickedBatch {
    pub prs: Vec<PullRequest>,
}

/// Simulates merging each `SUCCESS`-headed PR in `subpool.prs`, in order,
/// onto a scratch clone checked out at the subpool's base-sha. A PR whose
/// merge conflicts is skipped; any other merge error aborts the picker.
pub fn pick(repo_tool: &dyn RepoTool, subpool: &Subpool) -> Result<PickedBatch> {
    let workspace = repo_tool.scoped_clone(&subpool.org, &subpool.repo, &subpool.base_sha)?;

    let mut included = Vec::new();
    for pr in &subpool.prs {
        if !pr.head_is_success() {
            continue;
        }
        if workspace.merge(&pr.head_oid)? {
            included.push(pr.clone());
        }
    }

    Ok(PickedBatch { prs: included })
}
