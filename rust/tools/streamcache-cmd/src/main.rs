use anyhow::Result;
use clap::{Args, Parser, Subcommand};

mod commands;
mod utils;

#[derive(Parser)]
#[command(name = "streamcache-cmd")]
#[command(about = "Command-line utility for spill-to-disk stream caching")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Settings shared by every command, layered over an optional JSON file
#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Path to a JSON stream caching configuration
    #[arg(long)]
    config: Option<String>,

    /// Spool threshold in bytes (negative disables spooling)
    #[arg(long, allow_negative_numbers = true)]
    threshold: Option<i64>,

    /// Spool cipher, e.g. "AES/CTR/NoPadding" or "ChaCha20"
    #[arg(long)]
    cipher: Option<String>,

    /// Spool directory (may contain #uuid# and #pid#)
    #[arg(long)]
    dir: Option<String>,

    /// I/O chunk size in bytes
    #[arg(long)]
    buffer_size: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture a file through a cached output stream and read it back
    Spool {
        #[command(flatten)]
        config: ConfigArgs,

        /// Number of times to read the captured content back
        #[arg(short, long, default_value_t = 2)]
        reads: u32,

        /// Source file to capture
        file: String,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Spool {
            config,
            reads,
            file,
        } => commands::spool::run(config, reads, file),
        Commands::Config { config } => commands::config::run(config),
    }
}
