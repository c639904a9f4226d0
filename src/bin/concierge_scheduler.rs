//! Runs the due-task scheduler tick on a fixed interval.
//!
//! Usage: `concierge-scheduler [CONFIG]`, where `CONFIG` defaults to
//! `concierge.toml` in the working directory. The tick loop stops on Ctrl-C.

use camino::Utf8PathBuf;
use concierge::config::{ConciergeConfig, ConfigError};
use concierge::queue::{adapters::postgres::PostgresJobStore, services::JobQueue};
use concierge::task::{adapters::postgres::PostgresTaskRepository, services::TaskScheduler};
use concierge::telemetry;
use diesel::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use mockable::DefaultClock;
use std::env;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, warn};

const DEFAULT_CONFIG_PATH: &str = "concierge.toml";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
enum SchedulerBinError {
    #[error("argument is not valid UTF-8")]
    InvalidArgs,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database.url is not set")]
    MissingDatabaseUrl,
    #[error("failed to build connection pool: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

fn config_path() -> Result<Utf8PathBuf, SchedulerBinError> {
    env::args_os().nth(1).map_or_else(
        || Ok(Utf8PathBuf::from(DEFAULT_CONFIG_PATH)),
        |arg| {
            arg.into_string()
                .map(Utf8PathBuf::from)
                .map_err(|_| SchedulerBinError::InvalidArgs)
        },
    )
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    if telemetry::init().is_err() {
        warn!("tracing subscriber already installed");
    }
    if let Err(err) = run().await {
        error!(error = %err, "scheduler stopped");
        return Err(err.into());
    }
    Ok(())
}

async fn run() -> Result<(), SchedulerBinError> {
    let config = ConciergeConfig::load(&config_path()?)?;
    if config.database.url.trim().is_empty() {
        return Err(SchedulerBinError::MissingDatabaseUrl);
    }
    let pool = Pool::builder()
        .max_size(config.database.pool_size)
        .build(ConnectionManager::<PgConnection>::new(&config.database.url))?;

    let clock = Arc::new(DefaultClock);
    let queue = JobQueue::with_settings(
        Arc::new(PostgresJobStore::new(pool.clone())),
        Arc::clone(&clock),
        config.queue_settings(),
    );
    let scheduler = TaskScheduler::new(Arc::new(PostgresTaskRepository::new(pool)), queue, clock)
        .with_batch_limit(config.scheduler.batch_limit);

    let mut ticker = interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval = ?config.tick_interval(), "scheduler started");
    loop {
        tokio::select! {
            _ = ticker.tick() => match scheduler.tick().await {
                Ok(report) => info!(
                    enqueued = report.enqueued_count(),
                    failed = report.failed_count(),
                    "tick complete"
                ),
                Err(err) => error!(error = %err, "tick failed"),
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "failed to listen for Ctrl-C");
                }
                info!("shutting down");
                return Ok(());
            }
        }
    }
}
