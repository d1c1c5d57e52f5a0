//! Annotate subcommand - classify a corpus CSV

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use songci_core::SharedProgress;
use songci_sentiment::config::default_checkpoint_path;

use crate::config::Config;

/// Exit code after an interrupted run, matching SIGINT convention
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Args, Debug)]
pub struct AnnotateArgs {
    /// Corpus CSV with a content column
    pub input: PathBuf,

    /// Output CSV, also used as checkpoint (default: <input>_sentiment.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Number of concurrent requests
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Requests per minute across all workers
    #[arg(long)]
    pub rpm: Option<u32>,

    /// Completed rows between checkpoint saves
    #[arg(long)]
    pub save_interval: Option<usize>,

    /// Attempts per poem before it is marked as error
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Column holding the poem text
    #[arg(long)]
    pub content_column: Option<String>,
}

impl AnnotateArgs {
    /// Merge file configuration with CLI overrides
    fn into_run_config(self, config: &Config) -> songci_sentiment::Config {
        let checkpoint = self
            .output
            .unwrap_or_else(|| default_checkpoint_path(&self.input));
        let mut run = config.run_config(self.input, checkpoint);
        if let Some(workers) = self.workers {
            run.workers = workers;
        }
        if let Some(rpm) = self.rpm {
            run.requests_per_minute = rpm;
        }
        if let Some(save_interval) = self.save_interval {
            run.save_interval = save_interval;
        }
        if let Some(max_retries) = self.max_retries {
            run.max_retries = max_retries;
        }
        if let Some(column) = self.content_column {
            run.content_column = column;
        }
        run
    }
}

pub fn run(args: AnnotateArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let run_config = args.into_run_config(config);

    log::info!("Annotating {}", run_config.input.display());
    log::info!("  Output: {}", run_config.checkpoint.display());
    log::info!("  Workers: {}", run_config.workers);
    log::info!("  Rate limit: {} requests/min", run_config.requests_per_minute);

    songci_core::install_signal_handlers().context("Failed to install signal handlers")?;

    let summary = songci_sentiment::run(&run_config, progress)?;

    if summary.interrupted {
        log::warn!(
            "Run interrupted; rerun the same command to resume from {}",
            run_config.checkpoint.display()
        );
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    Ok(ExitCode::SUCCESS)
}
