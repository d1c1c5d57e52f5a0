//! Status subcommand - summarize a checkpoint

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use songci_sentiment::{DatasetStore, DatasetSummary};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Checkpoint CSV written by `annotate`
    pub checkpoint: PathBuf,

    /// Number of rhythmic (tune pattern) groups to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

pub fn run(args: StatusArgs, config: &Config) -> Result<()> {
    let store = DatasetStore::new(&config.pipeline.content_column);
    let dataset = store
        .load_checkpoint(&args.checkpoint)
        .with_context(|| format!("Failed to read checkpoint {}", args.checkpoint.display()))?;

    let summary = DatasetSummary::compute(&dataset, args.top);
    eprintln!("{}", summary.format_table());
    Ok(())
}
