//! CLI command definitions and handlers.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;

pub mod schema;
pub mod status;
pub mod sync;

/// Directory to graph synchronization
#[derive(Parser)]
#[command(name = "idgraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (defaults to the user config dir's idgraph/config.toml)
    #[arg(short, long, global = true, env = "IDGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one sync of the directory into the graph
    Sync(sync::SyncArgs),

    /// Show per-label and per-relationship counts and the latest run tag
    Status,

    /// Create constraints and indexes for every managed label
    InitSchema,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = AppConfig::load(self.config.as_deref())?;

        match self.command {
            Commands::Sync(args) => sync::execute(args, config).await,
            Commands::Status => status::execute(&config).await,
            Commands::InitSchema => schema::execute(&config).await,
        }
    }
}
