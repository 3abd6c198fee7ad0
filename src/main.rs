use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use ledge_engine::scheduler::start_sweep_scheduler;
use ledge_engine::SweepRunner;
use ledge_notify::render::Locale;
use ledge_notify::{start_dispatcher, LogSink};
use ledge_store::Database;

/// Loan tracking and alerting backend.
#[derive(Parser, Debug)]
#[command(name = "ledge", version)]
struct Args {
    /// HTTP port to listen on.
    #[arg(long, default_value_t = 9370)]
    port: u16,

    /// Path to the SQLite database. Defaults to ~/.ledge/ledge.db.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Seconds between scheduled alert sweeps.
    #[arg(long, default_value_t = 3600)]
    sweep_interval_secs: u64,

    /// Locale for rendered alert text (fr or en).
    #[arg(long, default_value = "fr")]
    locale: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("starting ledge server");

    let locale: Locale = args
        .locale
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let db_path = match args.db {
        Some(path) => path,
        None => dirs_home().join(".ledge").join("ledge.db"),
    };
    let db = Database::open(&db_path).context("failed to open database")?;

    // Notification pipeline: sweep enqueues, dispatcher consumes.
    let (dispatch_tx, dispatch_rx) = mpsc::channel(1024);
    let _dispatcher = start_dispatcher(db.clone(), Arc::new(LogSink), locale, dispatch_rx);

    let runner = Arc::new(SweepRunner::new(db.clone(), dispatch_tx, locale));
    let _scheduler = start_sweep_scheduler(
        Arc::clone(&runner),
        Duration::from_secs(args.sweep_interval_secs),
    );

    let config = ledge_server::ServerConfig { port: args.port };
    let handle = ledge_server::start(config, db, runner)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "ledge ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("shutting down");
    Ok(())
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}
