use crate::error::{CoreError, Result};
use crate::model::batch::{BatchEntry, BatchPlan};
use crate::model::classification::{BatchRecords, ClassProbabilities, ClassificationRecord};
use crate::model::config::RetryPolicy;
use crate::services::ai::Classifier;
use crate::services::response::{parse_response, ParsedResponse};
use crate::services::score::{ffsi_score, probabilities_from_map};
use crate::services::store;

use std::path::Path;
use std::{thread, time::Duration};
use thiserror::Error;

const NO_REMARK_EXTRA: &str = "NO REMARK FOR THIS LSR!";

#[derive(Debug)]
pub struct DriverReport {
    pub plan: BatchPlan,
    pub batches_processed: usize,
    pub batches_skipped: usize,
    pub items_classified: usize,

    /// True when the batch ceiling stopped the loop with work left.
    pub halted_by_ceiling: bool,

    /// Records of the last batch classified in this invocation.
    pub last_batch: Option<(usize, BatchRecords)>,
}

/// A batch that could not be completed. `plan` keeps every earlier completion.
#[derive(Debug, Error)]
#[error("batch {batch_id} failed: {cause}")]
pub struct BatchFailure {
    pub batch_id: usize,
    pub plan: BatchPlan,
    #[source]
    pub cause: CoreError,
}

impl From<BatchFailure> for CoreError {
    fn from(f: BatchFailure) -> Self {
        CoreError::BatchAborted {
            batch_id: f.batch_id,
            cause: Box::new(f.cause),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pause {
    /// Between two consecutive classifier calls.
    RateLimit,
    /// Before retrying a batch after a transient failure.
    Cooldown,
}

impl Pause {
    fn label(self) -> &'static str {
        match self {
            Pause::RateLimit => "rate limit pause",
            Pause::Cooldown => "retry cooldown",
        }
    }
}

/// Tracks whether a classifier call already happened, so the next one is paced.
#[derive(Default)]
struct Pacer {
    called: bool,
}

impl Pacer {
    fn needs_pause(&mut self) -> bool {
        std::mem::replace(&mut self.called, true)
    }

    fn reset(&mut self) {
        self.called = false;
    }
}

fn sleep_for(duration: Duration, pause: Pause) {
    if duration.is_zero() {
        return;
    }
    tracing::debug!(
        secs = duration.as_secs_f64(),
        reason = pause.label(),
        "waiting before querying the API again"
    );
    thread::sleep(duration);
}

pub struct ClassificationDriver<'a, C: Classifier> {
    classifier: &'a C,
    taxonomy: &'a str,
    results_dir: &'a Path,
    policy: RetryPolicy,
    waiter: Box<dyn Fn(Duration, Pause) + 'a>,
}

impl<'a, C: Classifier> ClassificationDriver<'a, C> {
    pub fn new(classifier: &'a C, taxonomy: &'a str, results_dir: &'a Path, policy: RetryPolicy) -> Self {
        Self {
            classifier,
            taxonomy,
            results_dir,
            policy,
            waiter: Box::new(sleep_for),
        }
    }

    /// Replaces the thread sleep used for rate-limit pauses and retry cooldowns.
    #[cfg(test)]
    pub fn with_waiter(mut self, waiter: impl Fn(Duration, Pause) + 'a) -> Self {
        self.waiter = Box::new(waiter);
        self
    }

    fn pause(&self, pause: Pause) {
        let duration = match pause {
            Pause::RateLimit => self.policy.wait,
            Pause::Cooldown => self.policy.cooldown,
        };
        (self.waiter)(duration, pause);
    }

    /// Classifies every unprocessed batch in id order and persists one artifact per batch.
    pub fn run(
        &self,
        plan: BatchPlan,
        items: &[String],
        run_id: &str,
    ) -> std::result::Result<DriverReport, BatchFailure> {
        let mut plan = plan;
        let mut pacer = Pacer::default();

        let mut batches_processed = 0usize;
        let mut batches_skipped = 0usize;
        let mut items_classified = 0usize;
        let mut last_batch = None;
        let mut halted_by_ceiling = false;

        let total = plan.len();
        let ids: Vec<usize> = plan.iter().map(|(id, _)| id).collect();

        for batch_id in ids {
            let Some(entry) = plan.get(batch_id).copied() else {
                continue;
            };

            if entry.processed {
                batches_skipped += 1;
                tracing::info!(batch = batch_id + 1, total, "skipping batch, already processed");
                continue;
            }

            if let Some(max) = self.policy.max_batches {
                if batches_processed >= max {
                    tracing::warn!(max_batches = max, "batch ceiling reached, halting");
                    halted_by_ceiling = true;
                    break;
                }
            }

            tracing::info!(
                batch = batch_id + 1,
                total,
                start = entry.start_index,
                end = entry.end_index,
                "processing batch"
            );

            let records = match self.attempt_with_retry(batch_id, &entry, items, &mut pacer) {
                Ok(records) => records,
                Err(cause) => {
                    tracing::error!(batch_id, error = %cause, "batch failed, halting run");
                    return Err(BatchFailure {
                        batch_id,
                        plan,
                        cause,
                    });
                }
            };

            let path = store::artifact_path(self.results_dir, run_id, batch_id);
            if let Err(cause) = store::write_artifact(&path, &records) {
                return Err(BatchFailure {
                    batch_id,
                    plan,
                    cause,
                });
            }
            tracing::info!(path = %path.display(), "wrote partial results file");

            plan = plan.with_processed(batch_id);
            batches_processed += 1;
            items_classified += records.len();

            tracing::info!(batch = batch_id + 1, total, items = records.len(), "batch complete");
            last_batch = Some((batch_id, records));
        }

        tracing::info!(
            run_id,
            batches_processed,
            batches_skipped,
            items_classified,
            total,
            "classification run finished"
        );

        Ok(DriverReport {
            plan,
            batches_processed,
            batches_skipped,
            items_classified,
            halted_by_ceiling,
            last_batch,
        })
    }

    fn attempt_with_retry(
        &self,
        batch_id: usize,
        entry: &BatchEntry,
        items: &[String],
        pacer: &mut Pacer,
    ) -> Result<BatchRecords> {
        match self.classify_batch(entry, items, pacer) {
            Err(CoreError::Classify(e)) if e.is_transient() => {
                tracing::warn!(
                    batch_id,
                    error = %e,
                    cooldown_secs = self.policy.cooldown.as_secs_f64(),
                    "transient classifier failure, retrying batch once"
                );
                self.pause(Pause::Cooldown);
                pacer.reset();
                self.classify_batch(entry, items, pacer)
            }
            other => other,
        }
    }

    fn classify_batch(&self, entry: &BatchEntry, items: &[String], pacer: &mut Pacer) -> Result<BatchRecords> {
        let slice = items.get(entry.start_index..=entry.end_index).ok_or_else(|| {
            CoreError::InvalidInput(format!(
                "batch range {}..={} exceeds {} items",
                entry.start_index,
                entry.end_index,
                items.len()
            ))
        })?;

        let mut records = BatchRecords::new();

        for (local_index, text) in slice.iter().enumerate() {
            let record = if text.trim().is_empty() {
                no_remark_record(text)
            } else {
                if pacer.needs_pause() {
                    self.pause(Pause::RateLimit);
                }
                tracing::debug!(local_index, remark = %text, "remark sent");
                let reply = self.classifier.classify(self.taxonomy, text)?;
                tracing::debug!(local_index, reply = %reply, "result received");
                record_from_reply(text, &reply)
            };

            records.insert(local_index, record);
        }

        Ok(records)
    }
}

fn no_remark_record(text: &str) -> ClassificationRecord {
    zero_record(text, NO_REMARK_EXTRA.to_string())
}

fn zero_record(text: &str, extra_text: String) -> ClassificationRecord {
    ClassificationRecord {
        original_text: text.to_string(),
        probabilities: ClassProbabilities::zero(),
        severity_score: 0.0,
        extra_text,
    }
}

/// Builds a record from a classifier reply; replies without a usable object become all-zero.
pub fn record_from_reply(text: &str, reply: &str) -> ClassificationRecord {
    match parse_response(reply) {
        ParsedResponse::Parsed {
            probabilities,
            extra,
        } => match probabilities_from_map(&probabilities) {
            Ok(probabilities) => ClassificationRecord {
                original_text: text.to_string(),
                probabilities,
                severity_score: ffsi_score(&probabilities, false),
                extra_text: extra,
            },
            Err(e) => {
                tracing::warn!(reply = %reply.trim(), error = %e, "unusable classification in response, recording zeros");
                zero_record(text, reply.trim().to_string())
            }
        },
        ParsedResponse::Unparsed { raw } => {
            tracing::warn!(reply = %raw, "no classification in response, recording zeros");
            zero_record(text, raw)
        }
    }
}
