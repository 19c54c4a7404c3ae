mod commands;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use agendasync_core::config::AppConfig;

#[derive(Parser)]
#[command(name = "agendasync")]
#[command(about = "Reconcile CRM agendas into local viewing blocks, slots and bookings")]
struct Cli {
    /// Config file (defaults to ~/.config/agendasync/config.toml)
    #[arg(long, global = true, env = "AGENDASYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass over all due integration instances
    Run,
    /// Run immediately, then again on a fixed interval
    Watch {
        /// Seconds between runs, or a duration like "30m" (defaults to sync.interval_secs)
        #[arg(long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },
    /// Sync the status and type vocabulary of one instance and print it
    Vocabulary {
        /// Integration instance id
        #[arg(long)]
        instance: Uuid,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.json_logs);

    let config = AppConfig::load(cli.config.as_deref())?;
    let engine = commands::build_engine(&config)?;

    match cli.command {
        Commands::Run => commands::run::run(&engine).await,
        Commands::Watch { interval } => {
            let interval =
                interval.unwrap_or_else(|| Duration::from_secs(config.sync.interval_secs));
            commands::watch::run(&engine, interval).await
        }
        Commands::Vocabulary { instance } => commands::vocabulary::run(&engine, instance).await,
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_interval(s: &str) -> Result<Duration, String> {
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| format!("Invalid interval '{s}': {e}"))
}
