//! History compaction: folding acknowledged operations into baselines.

use super::State;
use crate::clock::Timestamp;
use crate::oid::ObjectId;
use crate::patch::apply_patch;
use crate::store::Baseline;
use crate::sync::RebaseEvent;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Folds every operation at or below `watermark` into baselines and deletes
/// the folded rows.
///
/// New baselines are stamped with the maximum operation timestamp actually
/// observed below the watermark (`t_max`), not the watermark itself. That is
/// the contract: an operation inserted between the scan and the write with a
/// stamp in `(t_max, watermark]` is retained and folds on a later pass.
///
/// Runs inside the caller's state lock, so it observes a consistent cut of the
/// operation table. The `closed` flag short-circuits future work at the top
/// and between per-OID iterations; the iteration in flight completes.
pub(super) fn run_rebase(
    state: &mut State,
    watermark: &Timestamp,
    closed: &AtomicBool,
) -> Option<RebaseEvent> {
    if closed.load(Ordering::Acquire) {
        tracing::debug!("rebase skipped: store is closed");
        return None;
    }

    let mut touched: BTreeSet<ObjectId> = BTreeSet::new();
    let mut t_max: Option<Timestamp> = None;
    state.operations.for_each(Some(watermark), |stored| {
        touched.insert(stored.oid().clone());
        if t_max.as_ref() < Some(stored.timestamp()) {
            t_max = Some(stored.timestamp().clone());
        }
    });
    let t_max = t_max?;

    tracing::debug!(
        watermark = %watermark,
        t_max = %t_max,
        entities = touched.len(),
        "rebasing operations into baselines"
    );

    let mut baselines = Vec::new();
    for oid in touched {
        if closed.load(Ordering::Acquire) {
            tracing::debug!("rebase interrupted: store closed mid-pass");
            break;
        }
        if let Some(baseline) = rebase_entity(state, &oid, &t_max) {
            baselines.push(baseline);
        }
    }

    Some(RebaseEvent { baselines })
}

/// Folds one sub-object's operations up to `t_max` and rewrites its baseline.
///
/// Returns the new baseline if one was written; `None` means the object ended
/// deleted with no live operations left, so its baseline was dropped instead.
fn rebase_entity(state: &mut State, oid: &ObjectId, t_max: &Timestamp) -> Option<Baseline> {
    let baseline_time = state.baselines.get(oid).map(|b| b.timestamp.clone());
    let mut current = state.baselines.get(oid).and_then(|b| b.snapshot.clone());

    let mut folded = Vec::new();
    state
        .operations
        .for_each_for_entity(oid, Some(t_max), |stored| {
            folded.push(stored.operation.clone());
        });
    if folded.is_empty() {
        return None;
    }

    for operation in &folded {
        // Re-skip anything the baseline already incorporates.
        let already_folded = baseline_time
            .as_ref()
            .is_some_and(|bt| &operation.timestamp <= bt);
        if !already_folded {
            match apply_patch(current.clone(), &operation.oid, &operation.data) {
                Ok(next) => current = next,
                Err(err) => {
                    // Failing here would leave compaction half-done; drop the
                    // offending patch and keep folding.
                    tracing::error!(
                        oid = %operation.oid,
                        timestamp = %operation.timestamp,
                        error = %err,
                        "skipping unappliable operation during rebase"
                    );
                }
            }
        }
        state.operations.remove(&operation.oid, &operation.timestamp);
    }

    match current {
        Some(snapshot) => {
            let baseline = Baseline::new(oid.clone(), snapshot, t_max.clone());
            state.baselines.set(baseline.clone());
            Some(baseline)
        }
        None if state.operations.has_entity(oid) => {
            // Deleted, but live operations remain: keep the deletion on record.
            let baseline = Baseline::tombstone(oid.clone(), t_max.clone());
            state.baselines.set(baseline.clone());
            Some(baseline)
        }
        None => {
            state.baselines.remove(oid);
            None
        }
    }
}
