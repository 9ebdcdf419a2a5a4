use crate::error::{CoreError, Result};
use crate::model::batch::BatchPlan;
use crate::model::config::RunConfig;
use crate::model::report::ReportTable;
use crate::services::{
    ai::{ChatClassifier, Classifier},
    batches, checkpoint, config,
    consolidate::{self, ConsolidatedResult},
    driver::ClassificationDriver,
    reports,
    run_id::run_id_for,
    store,
};

use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
pub struct ScanReport {
    pub run_id: String,
    pub item_count: usize,
    pub plan: BatchPlan,
    pub prior_progress: bool,
}

#[derive(Debug, Serialize)]
pub struct ConsolidationReport {
    pub run_id: String,
    pub artifacts_merged: usize,
    pub classified_rows: usize,
    pub placeholder_rows: usize,

    /// Absent when no artifact was found for the run.
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: String,
    pub item_count: usize,
    pub batch_count: usize,
    pub batches_processed: usize,
    pub batches_skipped: usize,
    pub items_classified: usize,
    pub halted_by_ceiling: bool,
    pub plan: BatchPlan,
    pub consolidation: ConsolidationReport,
}

/// Plans batches for the configured source and marks what is already on disk.
pub fn scan(cfg: &RunConfig) -> Result<ScanReport> {
    let table = reports::load_reports(&cfg.source_path, &cfg.remark_column)?;
    let run_id = run_id_for(&cfg.source_path);

    let plan = batches::define_batches(table.len(), cfg.batch_size);
    let outcome = checkpoint::match_batch_results(&run_id, plan, &cfg.results_dir)?;

    Ok(ScanReport {
        run_id,
        item_count: table.len(),
        plan: outcome.plan,
        prior_progress: outcome.prior_progress,
    })
}

/// Full run against the configured HTTP classifier.
pub fn run(cfg: &RunConfig) -> Result<PipelineReport> {
    let classifier = ChatClassifier::from_config(cfg)?;
    run_with(cfg, &classifier)
}

/// Plan, resume, classify, then consolidate.
pub fn run_with<C: Classifier>(cfg: &RunConfig, classifier: &C) -> Result<PipelineReport> {
    config::validate(cfg)?;

    let taxonomy = reports::read_taxonomy(&cfg.taxonomy_path)?;
    let table = reports::load_reports(&cfg.source_path, &cfg.remark_column)?;
    let run_id = run_id_for(&cfg.source_path);

    let plan = batches::define_batches(table.len(), cfg.batch_size);
    let batch_count = plan.len();

    tracing::info!(
        source = %cfg.source_path.display(),
        run_id = %run_id,
        reports = table.len(),
        batches = batch_count,
        "processing report file"
    );

    let plan = checkpoint::match_batch_results(&run_id, plan, &cfg.results_dir)?.plan;
    let batch_size = plan.batch_size;

    let items = table.remarks();
    let driver = ClassificationDriver::new(classifier, &taxonomy, &cfg.results_dir, cfg.retry_policy());
    let report = driver.run(plan, &items, &run_id).map_err(CoreError::from)?;

    let result = consolidate::consolidate(&run_id, &cfg.results_dir, table.len(), batch_size)?;
    let consolidation = write_consolidated(cfg, &run_id, &table, &result)?;

    Ok(PipelineReport {
        run_id,
        item_count: table.len(),
        batch_count,
        batches_processed: report.batches_processed,
        batches_skipped: report.batches_skipped,
        items_classified: report.items_classified,
        halted_by_ceiling: report.halted_by_ceiling,
        plan: report.plan,
        consolidation,
    })
}

/// Rebuilds the classified CSV from whatever artifacts exist.
pub fn consolidate_only(cfg: &RunConfig) -> Result<ConsolidationReport> {
    config::validate(cfg)?;

    let table = reports::load_reports(&cfg.source_path, &cfg.remark_column)?;
    let run_id = run_id_for(&cfg.source_path);
    let batch_size = batches::define_batches(table.len(), cfg.batch_size).batch_size;

    let result = consolidate::consolidate(&run_id, &cfg.results_dir, table.len(), batch_size)?;
    write_consolidated(cfg, &run_id, &table, &result)
}

fn write_consolidated(
    cfg: &RunConfig,
    run_id: &str,
    table: &ReportTable,
    result: &ConsolidatedResult,
) -> Result<ConsolidationReport> {
    let output_path = if result.is_empty() {
        None
    } else {
        let path = store::classified_csv_path(&cfg.results_dir, run_id);
        consolidate::write_csv(&path, table, result)?;
        tracing::info!(path = %path.display(), "wrote classified reports");
        Some(path)
    };

    Ok(ConsolidationReport {
        run_id: run_id.to_string(),
        artifacts_merged: result.artifacts_merged,
        classified_rows: result.classified_rows(),
        placeholder_rows: result.placeholder_rows(),
        output_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifyError;
    use std::cell::Cell;
    use std::fs;
    use std::path::Path;

    /// Fails the nth call (1-based) with a transient error, answers SEVERE otherwise.
    struct FlakyClassifier {
        calls: Cell<usize>,
        fail_on: Vec<usize>,
    }

    impl Classifier for FlakyClassifier {
        fn classify(&self, _instruction: &str, _input: &str) -> std::result::Result<String, ClassifyError> {
            let n = self.calls.get() + 1;
            self.calls.set(n);
            if self.fail_on.contains(&n) {
                return Err(ClassifyError::Api("boom".into()));
            }
            Ok(r#"{"MINOR": 0, "MODERATE": 0, "SERIOUS": 0, "SEVERE": 100, "CATASTROPHIC": 0}
Flooded homes."#
                .into())
        }
    }

    fn setup(dir: &Path, reports: usize) -> RunConfig {
        let mut csv = String::from("office,remark\n");
        for i in 0..reports {
            csv.push_str(&format!("LWX,report {i}\n"));
        }
        fs::write(dir.join("lsrs.csv"), csv).unwrap();
        fs::write(dir.join("ffsi.txt"), "Classify flash flood impacts.").unwrap();

        RunConfig {
            source_path: dir.join("lsrs.csv"),
            taxonomy_path: dir.join("ffsi.txt"),
            results_dir: dir.join("results"),
            batch_size: 2,
            wait_secs: 0,
            cooldown_secs: 0,
            ..RunConfig::default()
        }
    }

    #[test]
    fn fatal_failure_then_resume_completes_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = setup(dir.path(), 5);

        // batch 0 ok (calls 1-2), batch 1 fails on call 3 and on its retry (call 4)
        let flaky = FlakyClassifier {
            calls: Cell::new(0),
            fail_on: vec![3, 4],
        };
        let err = run_with(&cfg, &flaky).unwrap_err();
        assert!(matches!(err, CoreError::BatchAborted { batch_id: 1, .. }));

        let scanned = scan(&cfg).unwrap();
        assert!(scanned.prior_progress);
        assert_eq!(scanned.plan.processed_ids(), vec![0]);

        let healthy = FlakyClassifier {
            calls: Cell::new(0),
            fail_on: vec![],
        };
        let report = run_with(&cfg, &healthy).unwrap();

        assert_eq!(report.batches_skipped, 1);
        assert_eq!(report.batches_processed, 2);
        assert_eq!(healthy.calls.get(), 3);
        assert_eq!(report.consolidation.placeholder_rows, 0);

        let out = report.consolidation.output_path.unwrap();
        let text = fs::read_to_string(out).unwrap();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().nth(5).unwrap().starts_with("LWX,report 4,0,0,0,1,0,4,Flooded homes."));
    }

    #[test]
    fn consolidate_without_artifacts_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = setup(dir.path(), 3);

        let report = consolidate_only(&cfg).unwrap();
        assert_eq!(report.artifacts_merged, 0);
        assert!(report.output_path.is_none());
        assert!(!store::classified_csv_path(&cfg.results_dir, &report.run_id).exists());
    }

    #[test]
    fn unbatched_run_uses_single_batch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = RunConfig {
            batch_size: 0,
            ..setup(dir.path(), 4)
        };
        let classifier = FlakyClassifier {
            calls: Cell::new(0),
            fail_on: vec![],
        };

        let report = run_with(&cfg, &classifier).unwrap();
        assert_eq!(report.batch_count, 1);
        assert_eq!(report.consolidation.classified_rows, 4);
    }
}
