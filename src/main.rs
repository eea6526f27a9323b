//! Leakprobe sampler
//!
//! Runs one allocation pattern on each of the first NUM_EXEC iterations,
//! then only the collection point, printing resident memory before and after
//! every iteration. Runs until killed.
//!
//! Usage:
//!   leakprobe <PATTERN> [NUM_EXEC]
//!
//! Examples:
//!   leakprobe 2 3               # leak: memory stays up once idle
//!   leakprobe 14 3              # streaming workaround: memory settles
//!   leakprobe --list-patterns   # show the catalog

use anyhow::{Context, Result};
use clap::Parser;
use leakprobe_core::{
    global_ledger, init_tracing, select_query, Dispatcher, HarnessConfig, LedgerCollector,
    Pattern, PsProbe, Sampler, SamplerOptions, SqliteConnector,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};

#[cfg(feature = "profiling")]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Sampler command-line arguments
#[derive(Parser)]
#[command(name = "leakprobe")]
#[command(about = "Repeat one allocation pattern and print resident memory")]
#[command(version)]
struct Cli {
    /// Pattern id (0-16; empty for no-op)
    #[arg(default_value = "")]
    pattern: String,

    /// Iterations that run the pattern before switching to collection only
    num_exec: Option<u64>,

    /// Configuration file
    #[arg(long, env = "LEAKPROBE_CONFIG", default_value = "leakprobe.toml")]
    config: PathBuf,

    /// Database path (overrides config and LEAKPROBE_DB_PATH)
    #[arg(long)]
    db_path: Option<String>,

    /// Table name (overrides config and LEAKPROBE_TABLE)
    #[arg(long)]
    table: Option<String>,

    /// Seconds to sleep between iterations
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Prefix sample lines with the local time
    #[arg(long)]
    timestamps: bool,

    /// Print allocation ledger counters after each sample
    #[arg(long)]
    stats: bool,

    /// Print the pattern catalog and exit
    #[arg(long)]
    list_patterns: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

fn print_catalog() {
    println!("{:<4} {:<10} {:<10} DESCRIPTION", "ID", "QUERY", "EXPECTED");
    for pattern in Pattern::ALL {
        let id = if pattern.id().is_empty() {
            "\"\""
        } else {
            pattern.id()
        };
        println!(
            "{:<4} {:<10} {:<10} {}",
            id,
            format!("{:?}", pattern.query_mode()).to_lowercase(),
            pattern.expected_retention().to_string(),
            pattern.description()
        );
    }
}

/// Loop options from the CLI, falling back to the configured values
fn sampler_options(cli: &Cli, config: &HarnessConfig) -> SamplerOptions {
    SamplerOptions {
        num_exec: cli.num_exec.unwrap_or(config.sampler.num_exec),
        interval: cli
            .interval_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.sampler.interval()),
        timestamps: cli.timestamps,
        stats: cli.stats,
    }
}

fn run(cli: Cli) -> Result<()> {
    if cli.list_patterns {
        print_catalog();
        return Ok(());
    }

    // Unknown ids fail before anything touches the database
    let pattern = Pattern::from_id(&cli.pattern)?;

    let config = HarnessConfig::load(&cli.config)
        .and_then(HarnessConfig::with_env_overrides)
        .and_then(|c| c.with_overrides(cli.db_path.clone(), cli.table.clone()))
        .context("Failed to load configuration")?;
    let options = sampler_options(&cli, &config);

    let ledger = global_ledger().clone();
    let connector = SqliteConnector::new(&config.database.path, ledger.clone());
    let dispatcher = Dispatcher::new(
        &connector,
        ledger.clone(),
        select_query(&config.database.table, config.sampler.row_limit),
    );
    let probe = PsProbe::current();
    let collector = LedgerCollector::new(ledger);

    let stdout = std::io::stdout();
    let mut sampler = Sampler::new(
        dispatcher,
        &probe,
        &collector,
        pattern,
        options,
        stdout.lock(),
    );

    // Never cancelled: the operator stops the process.
    let cancel = CancellationToken::new();
    sampler.run_loop(&cancel)?;

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing("leakprobe", &cli.log_level, Level::WARN);

    debug!("leakprobe v{} starting...", env!("CARGO_PKG_VERSION"));

    run(cli)
}
