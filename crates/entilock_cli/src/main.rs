//! EntiLock CLI
//!
//! Command-line tools for exercising the EntiLock entity locker.
//!
//! # Commands
//!
//! - `stress` - Hammer a locker from many threads and check exclusion
//! - `contend` - Hold keys while workers time out or get cancelled
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use commands::contend::ContendArgs;
use commands::stress::Mode;
use entilock_testkit::stress::StressConfig;
use tracing_subscriber::EnvFilter;

/// EntiLock command-line tools.
#[derive(Parser)]
#[command(name = "entilock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a multi-threaded stress workload
    Stress {
        /// Workload to run
        #[arg(short, long, value_enum, default_value = "batches")]
        mode: Mode,

        /// Number of threads
        #[arg(short, long, default_value = "8")]
        threads: usize,

        /// Operations per thread
        #[arg(short, long, default_value = "1000")]
        operations: usize,

        /// Number of distinct keys
        #[arg(short, long, default_value = "16")]
        keys: usize,

        /// Keys per batch
        #[arg(short, long, default_value = "4")]
        batch_size: usize,

        /// Timeout in milliseconds for try-batches
        #[arg(long, default_value = "5")]
        timeout_ms: i64,

        /// Reentrancy depth for the reentrant workload
        #[arg(long, default_value = "3")]
        depth: usize,

        /// Seed for key selection
        #[arg(long, default_value = "24301")]
        seed: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Hold keys while workers contend for them
    Contend {
        /// Keys to hold
        #[arg(short, long, value_delimiter = ',', default_value = "1,2,3")]
        keys: Vec<u64>,

        /// Number of worker threads
        #[arg(short, long, default_value = "4")]
        threads: usize,

        /// How long the holder keeps the keys, in milliseconds
        #[arg(long, default_value = "200")]
        hold_ms: u64,

        /// Worker batch timeout in milliseconds
        #[arg(long, default_value = "100")]
        timeout_ms: i64,

        /// Cancel waiting workers after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Stress {
            mode,
            threads,
            operations,
            keys,
            batch_size,
            timeout_ms,
            depth,
            seed,
            format,
        } => {
            let config = StressConfig {
                operations,
                threads,
                key_count: keys,
                batch_size,
                timeout_millis: timeout_ms,
                seed,
            };
            commands::stress::run(mode, &config, depth, &format)?;
        }
        Commands::Contend {
            keys,
            threads,
            hold_ms,
            timeout_ms,
            cancel_after_ms,
            format,
        } => {
            let args = ContendArgs {
                keys,
                threads,
                hold_millis: hold_ms,
                timeout_millis: timeout_ms,
                cancel_after_millis: cancel_after_ms,
            };
            commands::contend::run(&args, &format)?;
        }
        Commands::Version => {
            println!("EntiLock CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("EntiLock Core v{}", entilock_core::VERSION);
        }
    }

    Ok(())
}
