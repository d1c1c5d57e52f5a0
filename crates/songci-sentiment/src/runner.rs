//! Main runner for the sentiment annotation pipeline

use anyhow::{Context, Result};
use songci_core::{RateLimiter, SharedProgress};

use crate::classifier::SentimentClassifier;
use crate::client::{ChatBackend, ChatClient};
use crate::config::Config;
use crate::dataset::DatasetStore;
use crate::scheduler::BatchScheduler;
use crate::stats::RunSummary;

/// Annotate `config.input` against the configured remote endpoint.
pub fn run(config: &Config, progress: &SharedProgress) -> Result<RunSummary> {
    config.validate_remote()?;
    let client = ChatClient::new(config.api.clone()).context("Failed to build HTTP client")?;
    log::info!("Model {} at {}", config.api.model, config.api.base_url);
    run_with_backend(config, client, progress)
}

/// Annotate `config.input` through any [`ChatBackend`].
///
/// Loads the checkpoint when present (raw input otherwise), classifies every
/// pending row and saves the result to `config.checkpoint`.
pub fn run_with_backend<B: ChatBackend>(
    config: &Config,
    backend: B,
    progress: &SharedProgress,
) -> Result<RunSummary> {
    config.validate()?;

    let store = DatasetStore::new(&config.content_column);
    let mut dataset = store
        .load(&config.input, &config.checkpoint)
        .context("Failed to load dataset")?;

    log::info!(
        "Processing with {} workers at {} requests/min, checkpoint every {} rows",
        config.workers,
        config.requests_per_minute,
        config.save_interval
    );

    let limiter = RateLimiter::new(config.requests_per_minute);
    let classifier = SentimentClassifier::new(backend, config.retry_policy(), config.max_chars);
    let pb = progress.row_bar("sentiment", dataset.len(), dataset.processed_count());

    let result = BatchScheduler::new(
        &store,
        &config.checkpoint,
        config.workers,
        config.save_interval,
    )
    .run(&mut dataset, &classifier, &limiter, &pb);
    pb.finish_and_clear();
    let summary = result?;

    if progress.is_tty() {
        summary.print();
    } else {
        summary.log();
    }
    Ok(summary)
}
