//! Leakprobe provisioner
//!
//! Drops and recreates the sampler's table and fills it with identical
//! 10,000-character rows, 100 rows per transaction by default.
//!
//! Usage:
//!   leakprobe-setup [--records N] [--batch-size N]

use anyhow::{Context, Result};
use clap::Parser;
use leakprobe_core::config::ProvisionerSettings;
use leakprobe_core::{global_ledger, init_tracing, HarnessConfig, Provisioner, SqliteConnector};
use std::path::PathBuf;
use tracing::{info, Level};

/// Provisioner command-line arguments
#[derive(Parser)]
#[command(name = "leakprobe-setup")]
#[command(about = "Create and populate the table the sampler reads")]
#[command(version)]
struct Args {
    /// Configuration file
    #[arg(long, env = "LEAKPROBE_CONFIG", default_value = "leakprobe.toml")]
    config: PathBuf,

    /// Database path (overrides config and LEAKPROBE_DB_PATH)
    #[arg(long)]
    db_path: Option<String>,

    /// Table name (overrides config and LEAKPROBE_TABLE)
    #[arg(long)]
    table: Option<String>,

    /// Rows to insert
    #[arg(long)]
    records: Option<usize>,

    /// Rows per insert transaction
    #[arg(long)]
    batch_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Provisioner settings from the CLI, falling back to the configured values
fn provisioner_settings(args: &Args, config: &HarnessConfig) -> ProvisionerSettings {
    ProvisionerSettings {
        total_records: args.records.unwrap_or(config.provisioner.total_records),
        records_per_batch: args
            .batch_size
            .unwrap_or(config.provisioner.records_per_batch),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing("leakprobe_setup", &args.log_level, Level::INFO);

    let config = HarnessConfig::load(&args.config)
        .and_then(HarnessConfig::with_env_overrides)
        .and_then(|c| c.with_overrides(args.db_path.clone(), args.table.clone()))
        .context("Failed to load configuration")?;
    let settings = provisioner_settings(&args, &config);

    info!("Provisioning {}", config.database.path.display());

    let connector = SqliteConnector::new(&config.database.path, global_ledger().clone());
    let provisioner = Provisioner::new(&connector, &config.database.table)?;

    let stdout = std::io::stdout();
    provisioner.run(&settings, &mut stdout.lock())?;

    Ok(())
}
