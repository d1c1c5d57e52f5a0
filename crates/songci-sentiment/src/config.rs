//! Annotation run configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use songci_core::RetryPolicy;

/// Remote endpoint settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// OpenAI-compatible base URL, without the `/chat/completions` suffix
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: String::new(),
            temperature: 0.1,
            max_tokens: 500,
            timeout: Duration::from_secs(15),
        }
    }
}

/// Runtime configuration for one annotation run
#[derive(Debug, Clone)]
pub struct Config {
    /// Raw corpus CSV
    pub input: PathBuf,
    /// Output CSV, doubling as checkpoint
    pub checkpoint: PathBuf,
    /// Column holding the poem text
    pub content_column: String,
    /// Concurrent remote calls
    pub workers: usize,
    pub requests_per_minute: u32,
    /// Completed rows between checkpoint saves
    pub save_interval: usize,
    /// Attempts per row, first one included
    pub max_retries: u32,
    /// Sleep after the first failed attempt; doubles per further failure
    pub backoff_base: Duration,
    /// Characters of poem text sent to the model
    pub max_chars: usize,
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from("quansongci.csv"),
            checkpoint: PathBuf::from("quansongci_sentiment.csv"),
            content_column: "content".to_string(),
            workers: 32,
            requests_per_minute: 500,
            save_interval: 150,
            max_retries: 3,
            backoff_base: Duration::from_secs(1),
            max_chars: 300,
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Reject settings that would stall or divide by zero, before any remote call.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.workers > 0, "workers must be at least 1");
        anyhow::ensure!(
            self.requests_per_minute > 0,
            "requests_per_minute must be at least 1"
        );
        anyhow::ensure!(self.save_interval > 0, "save_interval must be at least 1");
        anyhow::ensure!(self.max_retries > 0, "max_retries must be at least 1");
        anyhow::ensure!(self.max_chars > 0, "max_chars must be at least 1");
        anyhow::ensure!(
            !self.content_column.is_empty(),
            "content_column must not be empty"
        );
        Ok(())
    }

    /// Like [`validate`](Self::validate), plus the credentials a real endpoint needs.
    pub fn validate_remote(&self) -> anyhow::Result<()> {
        self.validate()?;
        anyhow::ensure!(
            !self.api.api_key.trim().is_empty(),
            "API key missing: set DEEPSEEK_API_KEY or [api].api_key in songci.toml"
        );
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.backoff_base)
    }
}

/// Default checkpoint path: `<stem>_sentiment.csv` beside the input.
pub fn default_checkpoint_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());
    input.with_file_name(format!("{stem}_sentiment.csv"))
}
