use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the db-backup tool.
///
/// Everything here overrides the corresponding value of the YAML
/// configuration; anything not given falls back to it.
#[derive(Parser, Debug)]
#[clap(name = "db-backup", about = "Database snapshot, upload and notify pipeline")]
pub struct Args {
    /// Path to configuration YAML file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Database connection URL (overrides database.url)
    #[clap(long)]
    pub database_url: Option<String>,

    /// Export formats to produce, in order (comma-separated: sql,json,xlsx)
    #[clap(short = 'f', long)]
    pub formats: Option<String>,

    /// S3 bucket for uploading artifacts
    #[clap(short, long)]
    pub bucket: Option<String>,

    /// Key prefix for uploaded artifacts
    #[clap(short, long)]
    pub prefix: Option<String>,

    /// AWS region for S3 uploads
    #[clap(long)]
    pub region: Option<String>,

    /// AWS profile to use for S3 uploads
    #[clap(long)]
    pub profile: Option<String>,

    /// Local directory for artifacts between packaging and upload
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Skip gzip compression of sql and json artifacts
    #[clap(long)]
    pub no_compress: bool,

    /// Write the run summary as JSON to this path
    #[clap(long)]
    pub summary: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a default configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "backup_config.yaml")]
        path: PathBuf,
    },

    /// Load and validate the configuration, then print it
    CheckConfig,
}
