//! Action selector: picks exactly one action per subpool per iteration by
//! a fixed-precedence rule table.

use crate::accumulator::{smallest_passing, BatchClassification, PerPrClassification};
use crate::model::Action;
use crate::picker::PickedBatch;

/// Applies the five rules in order and returns the first that fires,
/// falling back to `Wait`.
///
/// `picked_batch` is only consulted by rule 4 and should already reflect
/// the picker's output for this subpool when the rule's other guards hold;
/// callers may pass an empty batch when they know rule 4 cannot fire (e.g.
/// a subpool of one PR) to avoid running the picker needlessly.
pub fn select(
    per_pr: &PerPrClassification,
    batch: &BatchClassification,
    total_prs: usize,
    picked_batch: Option<&PickedBatch>,
) -> Action {
    // Rule 1: MergeBatch.
    if !batch.mergeable.is_empty() {
        return Action::MergeBatch {
            targets: batch.mergeable.clone(),
        };
    }

    // Rule 2: Merge. Requires no batch pending, since merging a single PR
    // would move the base and invalidate any in-flight batch result.
    if !per_pr.successes.is_empty() && !batch.batch_pending {
        if let Some(target) = smallest_passing(&per_pr.successes) {
            return Action::Merge { target };
        }
    }

    // Rule 3: Trigger. Reserved for an otherwise-idle subpool.
    if !per_pr.nones.is_empty() && per_pr.pendings.is_empty() && per_pr.successes.is_empty() {
        if let Some(target) = smallest_passing(&per_pr.nones) {
            return Action::Trigger { target };
        }
    }

    // Rule 4: TriggerBatch.
    if total_prs > 1 && !batch.batch_pending {
        if let Some(picked) = picked_batch {
            if picked.prs.len() > 1 {
                return Action::TriggerBatch {
                    targets: picked.prs.clone(),
                };
            }
        }
    }

    Action::Wait
}
