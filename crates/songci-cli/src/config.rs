//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Environment variable holding the API key when the file sets none
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Global configuration for songci
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiSection,
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub model: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        let api = songci_sentiment::ApiConfig::default();
        Self {
            base_url: api.base_url,
            model: api.model,
            api_key: std::env::var(API_KEY_ENV).ok(),
            temperature: api.temperature,
            max_tokens: api.max_tokens,
            timeout_secs: api.timeout.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    pub workers: usize,
    pub requests_per_minute: u32,
    pub save_interval: usize,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub max_chars: usize,
    pub content_column: String,
}

impl Default for PipelineSection {
    fn default() -> Self {
        let run = songci_sentiment::Config::default();
        Self {
            workers: run.workers,
            requests_per_minute: run.requests_per_minute,
            save_interval: run.save_interval,
            max_retries: run.max_retries,
            backoff_base_ms: run.backoff_base.as_millis() as u64,
            max_chars: run.max_chars,
            content_column: run.content_column,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./songci.toml (current directory)
    /// 2. ~/.config/songci/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("songci.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "songci") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Endpoint settings for the classifier client
    pub fn api_config(&self) -> songci_sentiment::ApiConfig {
        songci_sentiment::ApiConfig {
            base_url: self.api.base_url.clone(),
            model: self.api.model.clone(),
            api_key: self.api.api_key.clone().unwrap_or_default(),
            temperature: self.api.temperature,
            max_tokens: self.api.max_tokens,
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }

    /// Run configuration for `input`, before CLI overrides
    pub fn run_config(&self, input: PathBuf, checkpoint: PathBuf) -> songci_sentiment::Config {
        let p = &self.pipeline;
        songci_sentiment::Config {
            input,
            checkpoint,
            content_column: p.content_column.clone(),
            workers: p.workers,
            requests_per_minute: p.requests_per_minute,
            save_interval: p.save_interval,
            max_retries: p.max_retries,
            backoff_base: Duration::from_millis(p.backoff_base_ms),
            max_chars: p.max_chars,
            api: self.api_config(),
        }
    }
}

/// Show only the first and last characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}…{tail}")
}
