//! Crypto data feed - main entry point
//!
//! This binary provides three subcommands:
//! - stream: Run a feed and log every delivered bar
//! - download: Download a historical range into the bar cache and/or a CSV file
//! - import: Load a CSV file into the bar cache

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "crypto-feed")]
#[command(about = "Incremental OHLCV and tick data feed for crypto exchanges", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (defaults are used when missing)
    #[arg(short, long, global = true, default_value = "configs/feed.json")]
    config: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream bars (or ticks) and log each one
    Stream {
        /// Instrument symbol (overrides config file). E.g., "BTCUSDT"
        #[arg(short, long)]
        symbol: Option<String>,

        /// Timeframe unit: seconds, minutes, days, weeks, months
        #[arg(short, long)]
        timeframe: Option<String>,

        /// Number of timeframe units per bar
        #[arg(long)]
        compression: Option<u32>,

        /// Backfill start (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        from: Option<String>,

        /// End bound (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        to: Option<String>,

        /// Stream individual trades instead of bars
        #[arg(long)]
        ticks: bool,

        /// Stop after the historical part
        #[arg(long)]
        historical: bool,
    },

    /// Download a historical range of bars
    Download {
        /// Instrument symbol. E.g., "BTCUSDT"
        #[arg(short, long)]
        symbol: Option<String>,

        /// Timeframe unit: seconds, minutes, days, weeks, months
        #[arg(short, long)]
        timeframe: Option<String>,

        /// Number of timeframe units per bar
        #[arg(long)]
        compression: Option<u32>,

        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        to: String,

        /// Bars per request
        #[arg(long, default_value = "1000")]
        limit: u32,

        /// Also write the bars to this CSV file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import bars from a CSV file into the cache
    Import {
        /// Instrument symbol. E.g., "BTCUSDT"
        #[arg(short, long)]
        symbol: String,

        /// Exchange granularity token. E.g., "1m", "4h", "1d"
        #[arg(short, long)]
        granularity: String,

        /// CSV file with timestamp,open,high,low,close,volume columns
        #[arg(short, long)]
        input: String,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // Create log file with naming pattern: {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // File layer - same format but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Stream { .. } => "stream",
        Commands::Download { .. } => "download",
        Commands::Import { .. } => "import",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Stream {
            symbol,
            timeframe,
            compression,
            from,
            to,
            ticks,
            historical,
        } => commands::stream::run(
            cli.config,
            commands::FeedOverrides {
                symbol,
                timeframe,
                compression,
            },
            from,
            to,
            ticks,
            historical,
        ),

        Commands::Download {
            symbol,
            timeframe,
            compression,
            from,
            to,
            limit,
            output,
        } => commands::download::run(
            cli.config,
            commands::FeedOverrides {
                symbol,
                timeframe,
                compression,
            },
            from,
            to,
            limit,
            output,
        ),

        Commands::Import {
            symbol,
            granularity,
            input,
        } => commands::import::run(cli.config, symbol, granularity, input),
    }
}
