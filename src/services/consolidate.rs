use crate::error::{CoreError, Result};
use crate::model::batch::global_index;
use crate::model::classification::{ClassificationRecord, SeverityClass};
use crate::model::report::ReportTable;
use crate::services::store;

use csv::WriterBuilder;
use serde::Serialize;
use std::path::Path;

const SCORE_COLUMN: &str = "FFSI";
const EXTRA_COLUMN: &str = "EXTRA";

/// Classification columns of one output row, probabilities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedColumns {
    pub probabilities: [f64; 5],
    pub score: f64,
    pub extra: String,
}

impl ClassifiedColumns {
    fn from_record(record: &ClassificationRecord) -> Self {
        Self {
            probabilities: record.probabilities.ordered().map(|p| p / 100.0),
            score: record.severity_score,
            extra: record.extra_text.clone(),
        }
    }
}

/// Full output table; `None` rows have no artifact yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedResult {
    pub rows: Vec<Option<ClassifiedColumns>>,
    pub artifacts_merged: usize,
}

impl ConsolidatedResult {
    pub fn is_empty(&self) -> bool {
        self.artifacts_merged == 0
    }

    pub fn classified_rows(&self) -> usize {
        self.rows.iter().filter(|r| r.is_some()).count()
    }

    pub fn placeholder_rows(&self) -> usize {
        self.rows.len() - self.classified_rows()
    }
}

/// Merges every artifact of `run_id` into a table ordered like the source items.
///
/// Global row = `batch_id * batch_size + local_index`.
pub fn consolidate(
    run_id: &str,
    results_dir: &Path,
    item_count: usize,
    batch_size: usize,
) -> Result<ConsolidatedResult> {
    let artifacts = store::list_artifacts(results_dir, run_id)?;
    let mut rows: Vec<Option<ClassifiedColumns>> = vec![None; item_count];

    if artifacts.is_empty() {
        tracing::warn!(run_id, "no batch result files found for run");
        return Ok(ConsolidatedResult {
            rows,
            artifacts_merged: 0,
        });
    }

    let mut artifacts_merged = 0;

    for artifact in &artifacts {
        let records = store::read_artifact(&artifact.path)?;
        for (&local_index, record) in &records {
            let idx = global_index(batch_size, artifact.batch_id, local_index);
            match rows.get_mut(idx) {
                Some(slot) => *slot = Some(ClassifiedColumns::from_record(record)),
                None => tracing::debug!(
                    batch_id = artifact.batch_id,
                    local_index,
                    "record outside report range, skipped"
                ),
            }
        }

        artifacts_merged += 1;
    }

    let result = ConsolidatedResult {
        rows,
        artifacts_merged,
    };

    tracing::info!(
        run_id,
        artifacts = artifacts_merged,
        classified = result.classified_rows(),
        placeholders = result.placeholder_rows(),
        "consolidated batch results"
    );

    Ok(result)
}

/// Writes the source columns followed by the classification columns.
pub fn write_csv(path: &Path, reports: &ReportTable, result: &ConsolidatedResult) -> Result<()> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    let mut headers = reports.headers.clone();
    headers.extend(SeverityClass::ALL.iter().map(|c| c.label().to_string()));
    headers.push(SCORE_COLUMN.to_string());
    headers.push(EXTRA_COLUMN.to_string());
    writer.write_record(&headers)?;

    for (row, columns) in reports.rows.iter().zip(&result.rows) {
        let mut out = row.clone();
        match columns {
            Some(c) => {
                out.extend(c.probabilities.iter().map(|p| p.to_string()));
                out.push(c.score.to_string());
                out.push(c.extra.clone());
            }
            None => out.resize(out.len() + 7, String::new()),
        }
        writer.write_record(&out)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| CoreError::io(path, e.into_error()))?;

    store::write_atomic(path, &bytes)
}
