use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use rust_db_backup::cli::{Args, Commands};
use rust_db_backup::cloud::client::create_s3_client;
use rust_db_backup::cloud::S3Store;
use rust_db_backup::config::{load_or_create_config, BackupConfig, CompressionConfig};
use rust_db_backup::export::Exporter;
use rust_db_backup::localfs::DiskFs;
use rust_db_backup::notify::{LogNotifier, Notifier, OutboxNotifier};
use rust_db_backup::orchestrator::{BackupOrchestrator, RunReport};
use rust_db_backup::utils::summary::RunSummary;

fn main() -> Result<()> {
    // Parse arguments
    let args = Args::parse();

    // Initialize logging
    initialize_logging(args.verbose)?;

    // Handle subcommands
    if let Some(cmd) = &args.command {
        return handle_subcommand(cmd, &args);
    }

    let config = load_and_process_config(&args)?;

    let runtime = Runtime::new().context("Failed to create tokio runtime")?;
    let report = runtime.block_on(run_backup(config))?;

    if let Some(path) = &args.summary {
        // the backup already happened; a missing summary file must not change its verdict
        if let Err(e) = write_summary(path, &report.summary) {
            error!("{:#}", e);
        }
    }

    info!(
        "Backup run {} finished with status {}",
        report.summary.run_id,
        report.status()
    );
    std::process::exit(report.exit_code());
}

/// Initialize logging with the specified verbosity level
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands (init-config and check-config)
fn handle_subcommand(cmd: &Commands, args: &Args) -> Result<()> {
    match cmd {
        Commands::InitConfig { path } => {
            info!("Creating default configuration file at {}", path.display());
            BackupConfig::create_default_config_file(path)?;
            info!("Configuration created successfully");
            Ok(())
        }
        Commands::CheckConfig => {
            let config = load_and_process_config(args)?;
            let yaml = serde_yaml::to_string(&config).context("Failed to serialize config to YAML")?;
            println!("{}", rust_db_backup::security::scrub_credentials(&yaml));
            info!("Configuration is valid");
            Ok(())
        }
    }
}

/// Load configuration, expand environment variables, apply command-line
/// overrides and validate the result
fn load_and_process_config(args: &Args) -> Result<BackupConfig> {
    let mut config = load_or_create_config(args.config.as_deref())?;
    apply_overrides(&mut config, args)?;
    config.process_environment_variables()?;
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut BackupConfig, args: &Args) -> Result<()> {
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    if let Some(formats) = &args.formats {
        config.set_formats_from_list(formats)?;
    }
    if let Some(bucket) = &args.bucket {
        config.storage.bucket = bucket.clone();
    }
    if let Some(prefix) = &args.prefix {
        config.storage.prefix = prefix.clone();
    }
    if args.region.is_some() {
        config.storage.region = args.region.clone();
    }
    if args.profile.is_some() {
        config.storage.profile = args.profile.clone();
    }
    if let Some(output) = &args.output {
        config.output_dir = PathBuf::from(output);
    }
    if args.no_compress {
        config.compression = CompressionConfig::disabled();
    }
    Ok(())
}

#[cfg(feature = "postgres")]
fn build_exporter(config: &BackupConfig) -> Result<Arc<dyn Exporter>> {
    use rust_db_backup::export::postgres::{PostgresConfig, PostgresSource};
    use rust_db_backup::export::TableExporter;

    let mut pg = PostgresConfig::new(&config.database.url);
    pg.acquire_timeout = config.timeouts.connect();
    pg.name_override = config.database.name.clone();

    let source = PostgresSource::connect_lazy(pg)?;
    Ok(Arc::new(TableExporter::new(source)))
}

#[cfg(not(feature = "postgres"))]
fn build_exporter(_config: &BackupConfig) -> Result<Arc<dyn Exporter>> {
    anyhow::bail!("This binary was built without a database driver (enable the `postgres` feature)")
}

fn build_notifier(config: &BackupConfig) -> Arc<dyn Notifier> {
    match &config.notifications.outbox_dir {
        Some(dir) => {
            info!("Spooling notifications to {}", dir.display());
            Arc::new(OutboxNotifier::new(dir.clone()))
        }
        None => Arc::new(LogNotifier::new()),
    }
}

async fn run_backup(config: BackupConfig) -> Result<RunReport> {
    let exporter = build_exporter(&config)?;

    let client = create_s3_client(
        config.storage.region.as_deref(),
        config.storage.profile.as_deref(),
    )?;
    let store = Arc::new(S3Store::new(client, &config.storage.bucket));
    let notifier = build_notifier(&config);

    let mut orchestrator =
        BackupOrchestrator::new(config, exporter, store, notifier, Arc::new(DiskFs::new()));
    orchestrator.run().await
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory {}", parent.display()))?;
        }
    }
    let json = summary.to_json_pretty()?;
    fs::write(path, json).context(format!("Failed to write run summary to {}", path.display()))?;
    info!("Wrote run summary to {}", path.display());
    Ok(())
}
