//! Relay daemon - store-and-forward message relay over WebSockets.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relay_config_and_utils::{init_logging, Config, Paths};

/// Relay daemon command-line interface.
#[derive(Parser)]
#[command(name = "relay-daemon")]
#[command(about = "Store-and-forward message relay over WebSockets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Base directory for runtime files (database, config). Defaults to ~/.relay
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay daemon
    Start,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    match cli.command {
        Some(Commands::Start) | None => {
            app::run_daemon(config, paths).await?;
        }
    }

    Ok(())
}
