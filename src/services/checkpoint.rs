use crate::error::Result;
use crate::model::batch::BatchPlan;
use crate::services::store;

use std::collections::BTreeSet;
use std::path::Path;

/// Plan after a checkpoint scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub plan: BatchPlan,

    /// False when no artifact for the run was found at all.
    pub prior_progress: bool,
}

/// Completed batch ids for `run_id`, recovered from artifact names.
pub fn scan(run_id: &str, results_dir: &Path) -> Result<BTreeSet<usize>> {
    Ok(store::list_artifacts(results_dir, run_id)?
        .into_iter()
        .map(|a| a.batch_id)
        .collect())
}

/// Marks every plan entry with an artifact on disk as processed.
///
/// Ids found on disk but absent from the plan are ignored.
pub fn match_batch_results(run_id: &str, plan: BatchPlan, results_dir: &Path) -> Result<ScanOutcome> {
    let completed = scan(run_id, results_dir)?;

    if completed.is_empty() {
        tracing::warn!(run_id, "no previous batch results found");
        return Ok(ScanOutcome {
            plan,
            prior_progress: false,
        });
    }

    let mut plan = plan;
    for batch_id in completed {
        if plan.get(batch_id).is_none() {
            tracing::debug!(run_id, batch_id, "ignoring artifact outside current plan");
            continue;
        }
        plan = plan.with_processed(batch_id);
    }

    tracing::info!(
        run_id,
        completed = plan.processed_ids().len(),
        total = plan.len(),
        "resuming from previous batch results"
    );

    Ok(ScanOutcome {
        plan,
        prior_progress: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::classification::BatchRecords;
    use crate::services::batches::define_batches;
    use crate::services::store::{artifact_path, write_artifact};

    fn touch(dir: &Path, run: &str, id: usize) {
        write_artifact(&artifact_path(dir, run, id), &BatchRecords::new()).unwrap();
    }

    #[test]
    fn marks_completed_batches() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "run1", 0);
        touch(dir.path(), "run1", 1);
        touch(dir.path(), "other", 2);

        let out = match_batch_results("run1", define_batches(25, 10), dir.path()).unwrap();
        assert!(out.prior_progress);
        assert_eq!(out.plan.processed_ids(), vec![0, 1]);
        assert_eq!(out.plan.pending_ids(), vec![2]);
    }

    #[test]
    fn scanning_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "run1", 1);

        let once = match_batch_results("run1", define_batches(30, 10), dir.path()).unwrap();
        let twice = match_batch_results("run1", once.plan.clone(), dir.path()).unwrap();
        assert_eq!(once.plan, twice.plan);
    }

    #[test]
    fn stale_ids_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "run1", 0);
        touch(dir.path(), "run1", 9);

        let out = match_batch_results("run1", define_batches(20, 10), dir.path()).unwrap();
        assert_eq!(out.plan.processed_ids(), vec![0]);
        assert_eq!(out.plan.len(), 2);
    }

    #[test]
    fn no_artifacts_returns_plan_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let plan = define_batches(12, 5);

        let out = match_batch_results("run1", plan.clone(), dir.path()).unwrap();
        assert!(!out.prior_progress);
        assert_eq!(out.plan, plan);
    }
}
