//! Batch runner: one invocation drives
//! `Idle → Checking → (NoNewData | Processing) → Committing → Idle`, with
//! `Processing → Failed → Idle` on unrecoverable error. Per-record failures
//! are excluded from output (fail-open); a batch where every attempted
//! record failed is treated as a provider outage and fails wholesale
//! (fail-closed), leaving the cursor unadvanced for the next trigger.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use serde::Serialize;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::config::PipelineConfig;
use crate::cursor::CursorStore;
use crate::enrich::{Enricher, RecordOutcome, SkipReason};
use crate::interaction::EnrichedInteraction;
use crate::notify::{EventKind, NotificationEvent, NotifierMux};
use crate::provider::DynProvider;
use crate::sink::EnrichedSink;
use crate::source::InteractionSource;
use crate::taxonomy;

/// Counters for one completed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Raw records consumed (cursor moved past them).
    pub consumed: usize,
    /// Enriched rows handed to the sink.
    pub enriched: usize,
    /// Rows the sink actually wrote (lower on replay).
    pub persisted: usize,
    /// Deliberate exclusions (filter, label policy).
    pub skipped: usize,
    /// Per-record provider failures excluded fail-open.
    pub failed: usize,
    /// Cursor position after commit.
    pub cursor: u64,
}

/// Structured cause for a failed batch; the cursor did not move.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub cause: String,
    /// Records that failed at a provider stage, when the failure was an
    /// outage; zero for infrastructure failures (source/sink/taxonomy).
    pub failed_records: usize,
}

/// Typed terminal status of one runner invocation, returned to the
/// scheduler and to the manual trigger.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(BatchReport),
    NoNewData,
    Failed(BatchFailure),
}

impl RunOutcome {
    /// Terminal status string for invokers that only want the word.
    pub fn status(&self) -> &'static str {
        match self {
            RunOutcome::Completed(_) => "success",
            RunOutcome::NoNewData => "no-new-data",
            RunOutcome::Failed(_) => "error",
        }
    }
}

pub struct BatchRunner {
    source: Arc<dyn InteractionSource>,
    sink: Arc<dyn EnrichedSink>,
    cursor: CursorStore,
    enricher: Arc<Enricher>,
    notifier: Arc<NotifierMux>,
    config: PipelineConfig,
    taxonomy_path: Option<PathBuf>,
    /// Serializes invocations: the scheduler tick and the manual HTTP
    /// trigger share one runner, and no two batches may run for the same
    /// cursor.
    run_lock: Mutex<()>,
}

impl BatchRunner {
    pub fn new(
        source: Arc<dyn InteractionSource>,
        sink: Arc<dyn EnrichedSink>,
        cursor: CursorStore,
        provider: DynProvider,
        notifier: Arc<NotifierMux>,
        config: PipelineConfig,
    ) -> Self {
        let enricher = Arc::new(Enricher::new(provider, &config));
        Self {
            source,
            sink,
            cursor,
            enricher,
            notifier,
            config,
            taxonomy_path: None,
            run_lock: Mutex::new(()),
        }
    }

    /// Use an explicit taxonomy file instead of the default lookup chain.
    pub fn with_taxonomy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.taxonomy_path = Some(path.into());
        self
    }

    /// Run one batch to its terminal status. Never panics on provider or
    /// I/O trouble; every abnormal path collapses into `RunOutcome`.
    pub async fn run_once(&self) -> RunOutcome {
        let _guard = self.run_lock.lock().await;
        counter!("pipeline_runs_total").increment(1);

        let outcome = self.run_inner().await;
        match &outcome {
            RunOutcome::Completed(report) => {
                counter!("pipeline_records_enriched_total").increment(report.enriched as u64);
                counter!("pipeline_records_skipped_total").increment(report.skipped as u64);
                counter!("pipeline_records_failed_total").increment(report.failed as u64);
                tracing::info!(
                    consumed = report.consumed,
                    enriched = report.enriched,
                    persisted = report.persisted,
                    skipped = report.skipped,
                    failed = report.failed,
                    cursor = report.cursor,
                    "batch committed"
                );
            }
            RunOutcome::NoNewData => {
                tracing::info!("no new interactions since last cursor position");
            }
            RunOutcome::Failed(failure) => {
                counter!("pipeline_runs_failed_total").increment(1);
                tracing::error!(cause = %failure.cause, "batch failed; cursor unchanged");
                self.notifier
                    .notify(&NotificationEvent {
                        kind: EventKind::BatchFailed,
                        detail: failure.cause.clone(),
                        ts: Utc::now(),
                    })
                    .await;
            }
        }
        outcome
    }

    async fn run_inner(&self) -> RunOutcome {
        // --- Checking ---
        let cursor = match self.cursor.load() {
            Ok(c) => c,
            Err(e) => return infra_failure("cursor state", e),
        };
        let latest = match self.source.latest_seq().await {
            Ok(v) => v,
            Err(e) => return infra_failure("source head", e),
        };
        if latest <= cursor.last_seq {
            return RunOutcome::NoNewData;
        }

        // --- Processing ---
        let batch = match self
            .source
            .fetch_after(cursor.last_seq, self.config.batch_size_limit)
            .await
        {
            Ok(b) => b,
            Err(e) => return infra_failure("source read", e),
        };
        if batch.is_empty() {
            return RunOutcome::NoNewData;
        }
        let high_seq = batch.last().map(|r| r.seq).unwrap_or(cursor.last_seq);

        // Taxonomy snapshot, captured once and shared by every record in
        // the batch.
        let snapshot = match &self.taxonomy_path {
            Some(p) => taxonomy::load_from(p),
            None => taxonomy::load_default(),
        };
        let snapshot = match snapshot {
            Ok(s) => Arc::new(s),
            Err(e) => return infra_failure("taxonomy", e),
        };

        let total = batch.len();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut tasks: JoinSet<RecordOutcome> = JoinSet::new();
        for raw in batch {
            let enricher = Arc::clone(&self.enricher);
            let snapshot = Arc::clone(&snapshot);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                enricher.enrich(&snapshot, &raw).await
            });
        }

        let mut rows: Vec<EnrichedInteraction> = Vec::with_capacity(total);
        let mut skipped = 0usize;
        let mut failed = 0usize;
        // Provider answered for these records even though policy dropped
        // them; they count against the outage rule below.
        let mut label_skips = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(RecordOutcome::Enriched(row)) => rows.push(*row),
                Ok(RecordOutcome::Skipped { seq, reason }) => {
                    skipped += 1;
                    match reason {
                        SkipReason::TooShort => {
                            tracing::debug!(seq, "transcript under minimum length, dropped")
                        }
                        SkipReason::UnknownLabel { stage, label } => {
                            label_skips += 1;
                            tracing::warn!(
                                seq,
                                stage = stage.as_str(),
                                label = %label,
                                "record excluded by unknown-label policy"
                            );
                        }
                    }
                }
                Ok(RecordOutcome::Failed(failure)) => {
                    failed += 1;
                    tracing::warn!(
                        seq = failure.seq,
                        stage = failure.stage.as_str(),
                        error = %format!("{:#}", failure.error),
                        "record failed, excluded from batch"
                    );
                }
                Err(join_err) => {
                    // A panicked enrichment task is a bug, not provider
                    // weather; fail the batch loudly.
                    return infra_failure("enrichment task", anyhow::anyhow!(join_err));
                }
            }
        }

        // Outage rule: every record that reached the provider failed there.
        if failed > 0 && rows.is_empty() && label_skips == 0 {
            return RunOutcome::Failed(BatchFailure {
                cause: format!("provider outage: all {failed} attempted records failed"),
                failed_records: failed,
            });
        }

        // --- Committing ---
        // Fan-in order is arbitrary; restore arrival order for a stable,
        // replayable sink layout.
        rows.sort_by_key(|r| r.source_seq);
        let persisted = match self.sink.append_batch(&rows).await {
            Ok(n) => n,
            Err(e) => return infra_failure("sink write", e),
        };
        if let Err(e) = self.cursor.advance(high_seq) {
            // The sink write is idempotent per source record, so replaying
            // this window after the next trigger is safe.
            return infra_failure("cursor advance", e);
        }

        RunOutcome::Completed(BatchReport {
            consumed: total,
            enriched: rows.len(),
            persisted,
            skipped,
            failed,
            cursor: high_seq,
        })
    }
}

fn infra_failure(what: &str, err: anyhow::Error) -> RunOutcome {
    RunOutcome::Failed(BatchFailure {
        cause: format!("{what}: {err:#}"),
        failed_records: 0,
    })
}
