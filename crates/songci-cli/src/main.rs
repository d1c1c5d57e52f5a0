//! songci - Sentiment annotation for classical Chinese ci poetry
//!
//! Classifies every poem of a corpus CSV through a chat-completions model and
//! writes the results to a resumable checkpoint CSV.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "songci")]
#[command(about = "Sentiment annotation for classical Chinese ci poetry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./songci.toml or ~/.config/songci/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Classify every unprocessed poem of a corpus CSV
    Annotate(cmd::annotate::AnnotateArgs),
    /// Summarize a checkpoint CSV
    Status(cmd::status::StatusArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(songci_core::ProgressContext::new());

    // Logging:
    //   TTY:     quiet (warn) unless --debug, the row bar shows activity
    //   non-TTY: info unless --debug, logs are the only progress indicator
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    songci_core::init_logging(quiet, cli.debug, multi).context("Failed to install logger")?;

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Annotate(args) => cmd::annotate::run(args, &config, &progress),
        Command::Status(args) => cmd::status::run(args, &config).map(|()| ExitCode::SUCCESS),
        Command::Config => {
            cmd::print_config(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}
