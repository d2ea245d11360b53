//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `run`: the migration pipeline
//! - `sources`: discovery only
//! - `buckets`: bucket listing for the configured profile

mod buckets;
mod run;
mod sources;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::{self, RunConfig};
use crate::logging;

pub use buckets::cmd_buckets;
pub use run::cmd_run;
pub use sources::cmd_sources;

/// Re-path audio objects in a bucket by their tags
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: <config dir>/sortie/config.toml)
    #[arg(short, long, global = true, env = "SORTIE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Download, re-path and re-upload the configured sources
    Run {
        /// Stage and resolve only - nothing is uploaded, deleted or purged
        #[arg(long)]
        dry_run: bool,
        /// Write the resolved source/target plan to this JSON file
        #[arg(long)]
        plan: Option<PathBuf>,
    },
    /// List the sources the configured discovery mode finds
    Sources,
    /// List the buckets visible to the configured profile
    Buckets,
}

impl Cli {
    /// Config file to load.
    pub fn config_path(&self) -> anyhow::Result<PathBuf> {
        self.config
            .clone()
            .or_else(config::config_path)
            .ok_or_else(|| anyhow!("Could not determine config directory; pass --config"))
    }
}

/// Load the config, install logging and run the selected command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let config = RunConfig::from_file(&cli.config_path()?)?;
    logging::init(&config.logging)?;

    let rt = Runtime::new().map_err(|e| anyhow!("Failed to start async runtime: {e}"))?;

    match &cli.command {
        Commands::Run { dry_run, plan } => cmd_run(&rt, &config, *dry_run, plan.as_ref()),
        Commands::Sources => cmd_sources(&rt, &config),
        Commands::Buckets => cmd_buckets(&rt, &config),
    }
}
