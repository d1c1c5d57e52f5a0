//! Concurrent batch processing of pending rows.
//!
//! Workers on a dedicated rayon pool claim rows from a [`WorkQueue`] and send
//! outcomes over a channel to the collector running on the calling thread. The
//! collector is the only code that touches the [`Dataset`]: it commits rows,
//! advances the progress bar and writes periodic checkpoints.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::Instant;

use anyhow::Context;
use indicatif::ProgressBar;
use songci_core::{
    RateLimiter, RetryPolicy, WorkQueue, fmt_num, is_shutdown_requested, retry_with_backoff,
};

use crate::classifier::SentimentClassifier;
use crate::client::ChatBackend;
use crate::dataset::{Dataset, DatasetStore};
use crate::model::{ClassificationResult, WorkItem};
use crate::stats::RunSummary;

/// Outcome of one row, sent from a worker to the collector
struct Completion {
    index: usize,
    result: ClassificationResult,
}

/// Drives one annotation pass over a dataset.
pub struct BatchScheduler<'a> {
    store: &'a DatasetStore,
    checkpoint: PathBuf,
    pool_size: usize,
    save_interval: usize,
    save_policy: RetryPolicy,
    shutdown: Option<&'a AtomicBool>,
}

impl<'a> BatchScheduler<'a> {
    pub fn new(
        store: &'a DatasetStore,
        checkpoint: impl Into<PathBuf>,
        pool_size: usize,
        save_interval: usize,
    ) -> Self {
        Self {
            store,
            checkpoint: checkpoint.into(),
            pool_size: pool_size.max(1),
            save_interval: save_interval.max(1),
            save_policy: RetryPolicy::default(),
            shutdown: None,
        }
    }

    /// Retry policy for the final checkpoint save
    pub fn with_save_policy(mut self, policy: RetryPolicy) -> Self {
        self.save_policy = policy;
        self
    }

    /// Stop flag polled by workers before claiming a row, in place of the
    /// process-wide signal flag
    pub fn with_shutdown_flag(mut self, flag: &'a AtomicBool) -> Self {
        self.shutdown = Some(flag);
        self
    }

    fn stop_requested(&self) -> bool {
        self.shutdown
            .map_or_else(is_shutdown_requested, |f| f.load(Ordering::Relaxed))
    }

    pub fn checkpoint(&self) -> &Path {
        &self.checkpoint
    }

    /// Classify every unprocessed row of `dataset`, then save it.
    ///
    /// Processed rows are never resubmitted. Blank rows become `skip` without
    /// touching the limiter or the backend. A failing periodic save is logged
    /// and the run continues; a failing final save is returned as an error,
    /// leaving `dataset` with every committed outcome.
    pub fn run<B: ChatBackend>(
        &self,
        dataset: &mut Dataset,
        classifier: &SentimentClassifier<B>,
        limiter: &RateLimiter,
        pb: &ProgressBar,
    ) -> anyhow::Result<RunSummary> {
        let start = Instant::now();
        let pending = dataset.pending_indices();
        let mut summary = RunSummary {
            total_rows: dataset.len(),
            already_processed: dataset.len() - pending.len(),
            ..Default::default()
        };
        log::info!(
            "{} rows, {} already processed, {} pending",
            fmt_num(summary.total_rows),
            fmt_num(summary.already_processed),
            fmt_num(pending.len())
        );

        let mut items = Vec::with_capacity(pending.len());
        for index in pending {
            let text = dataset.content(index);
            if text.trim().is_empty() {
                self.commit(dataset, index, ClassificationResult::skip(), &mut summary, pb);
            } else {
                items.push(WorkItem {
                    index,
                    text: text.to_string(),
                });
            }
        }

        let queue = WorkQueue::new(items);
        if !queue.is_empty() {
            let workers = self.pool_size.min(queue.total());
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("classify-{i}"))
                .build()
                .context("Failed to build worker pool")?;
            log::debug!("Dispatching {} rows to {workers} workers", queue.total());

            let (tx, rx) = mpsc::channel::<Completion>();
            let queue = &queue;
            pool.in_place_scope(|s| {
                for _ in 0..workers {
                    let tx = tx.clone();
                    s.spawn(move |_| {
                        while !self.stop_requested() {
                            let Some(item) = queue.next() else {
                                break;
                            };
                            let result = classify_guarded(classifier, item, limiter);
                            if tx.send(Completion { index: item.index, result }).is_err() {
                                break;
                            }
                        }
                    });
                }
                // Channel closes once every worker has exited
                drop(tx);

                for Completion { index, result } in rx {
                    self.commit(dataset, index, result, &mut summary, pb);
                }
            });
        }

        summary.interrupted = self.stop_requested();
        summary.remaining = dataset.len() - dataset.processed_count();
        if summary.interrupted {
            log::warn!(
                "Interrupted: {} rows left for the next run",
                fmt_num(summary.remaining)
            );
        }

        retry_with_backoff("save checkpoint", &self.save_policy, |_| {
            self.store.save(dataset, &self.checkpoint)
        })
        .with_context(|| format!("Failed to save checkpoint {}", self.checkpoint.display()))?;
        log::info!(
            "checkpoint saved ({}/{})",
            fmt_num(summary.processed_total()),
            fmt_num(summary.total_rows)
        );

        summary.elapsed = start.elapsed();
        Ok(summary)
    }

    /// Record one terminal outcome; saves every `save_interval` completions.
    fn commit(
        &self,
        dataset: &mut Dataset,
        index: usize,
        result: ClassificationResult,
        summary: &mut RunSummary,
        pb: &ProgressBar,
    ) {
        log::debug!("row {index}: {}", result.sentiment_class);
        summary.record(result.sentiment_class);
        dataset.commit(index, result);
        pb.inc(1);

        if summary.completed % self.save_interval != 0 {
            return;
        }
        match self.store.save(dataset, &self.checkpoint) {
            Ok(()) => log::info!(
                "checkpoint saved ({}/{})",
                fmt_num(summary.processed_total()),
                fmt_num(summary.total_rows)
            ),
            Err(e) => log::error!("Periodic checkpoint failed, continuing: {e}"),
        }
    }
}

/// Classify one item; a panic inside classification becomes an error row.
fn classify_guarded<B: ChatBackend>(
    classifier: &SentimentClassifier<B>,
    item: &WorkItem,
    limiter: &RateLimiter,
) -> ClassificationResult {
    catch_unwind(AssertUnwindSafe(|| classifier.classify(&item.text, limiter))).unwrap_or_else(
        |payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("row {}: worker panicked: {reason}", item.index);
            ClassificationResult::worker_failure(format!("worker panicked: {reason}"))
        },
    )
}
