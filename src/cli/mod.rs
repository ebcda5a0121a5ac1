pub mod commands;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use crate::config::Config;
use crate::error::Result;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "feed-store")]
#[command(about = "Inspect and manage the local feed cache")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "FEED_STORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default configuration file
    Init,

    /// Show the cached feed
    Show {
        /// Print the cache as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replace the cached feed with images read from a JSON file
    Insert {
        /// JSON file containing an array of images
        input: PathBuf,

        /// Cache timestamp (RFC 3339), defaults to now
        #[arg(short, long)]
        timestamp: Option<DateTime<Utc>>,
    },

    /// Delete the cached feed
    Delete,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_file = match self.config {
            Some(path) => path,
            None => Config::default_config_file()?,
        };

        if let Commands::Init = self.command {
            let _guard = commands::init_logging(self.debug, self.verbose, &Default::default())?;
            return commands::init(config_file).await;
        }

        let config = Config::load_or_default(&config_file)?;
        let _guard = commands::init_logging(self.debug, self.verbose, &config.logging)?;

        match self.command {
            Commands::Init => Ok(()),
            Commands::Show { json } => commands::show(&config, json).await,
            Commands::Insert { input, timestamp } => {
                commands::insert(&config, input, timestamp.unwrap_or_else(Utc::now)).await
            }
            Commands::Delete => commands::delete(&config).await,
        }
    }
}
