//! Songci Sentiment - concurrent sentiment annotation of a poetry corpus
//!
//! Loads the corpus CSV (or a checkpoint of a previous run), classifies every
//! unprocessed poem through a remote chat model under a shared rate limit, and
//! checkpoints progress so an interrupted run resumes where it stopped.

pub mod classifier;
pub mod client;
pub mod config;
pub mod dataset;
pub mod model;
pub mod prompt;
pub mod runner;
pub mod scheduler;
pub mod stats;

// Re-exports
pub use classifier::SentimentClassifier;
pub use client::{ChatBackend, ChatClient, ClassifyError};
pub use config::{ApiConfig, Config};
pub use dataset::{Dataset, DatasetError, DatasetRow, DatasetStore};
pub use model::{ClassificationResult, SentimentClass, WorkItem};
pub use runner::{run, run_with_backend};
pub use scheduler::BatchScheduler;
pub use stats::{DatasetSummary, RunSummary};
