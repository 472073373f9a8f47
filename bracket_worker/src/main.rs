//! Bracket worker.
//!
//! Operator CLI over the bracket engine: generates brackets, records results
//! and match changes, prints standings and views, sends match reminders and
//! runs in-memory simulations.

mod commands;
mod config;
mod logging;
mod metrics;

use std::net::SocketAddr;
use std::time::Instant;

use anyhow::Error;
use bracket_engine::{
    BracketEngine,
    db::Database,
    notifications::{LogNotifier, PgNotifier},
};
use pico_args::Arguments;
use tracing::info;

use commands::Command;
use config::{NotifierKind, WorkerConfig};

const HELP: &str = "\
Run bracket engine commands against the tournament database

USAGE:
  bracket_worker [OPTIONS] <COMMAND> [ARGS]

OPTIONS:
  --db-url        URL       Database connection string  [default: env DATABASE_URL]
  --metrics-bind  IP:PORT   Prometheus listener address [default: env METRICS_BIND, disabled]

FLAGS:
  -h, --help                Print help information

COMMANDS:
  migrate                             Create missing tables and indexes
  generate   <TOURNAMENT>             Seed entrants and build every match
  report     <MATCH> <SCORE_A> <SCORE_B>
                                      Record a result and advance the bracket
  start      <MATCH>                  Mark a scheduled match as being played
  cancel     <MATCH>                  Cancel an unfinished round-robin match
  reschedule <MATCH> <RFC3339>        Move a match and notify both players
  standings  <TOURNAMENT>             Print the win/draw/loss table
  progress   <TOURNAMENT>             Print match counts and completion
  bracket    <TOURNAMENT>             Print the bracket view
  remind     [--at RFC3339]           Remind players of tomorrow's matches
  watch                               Send reminders once a day until interrupted
  simulate   --format FORMAT --entrants N [--seeding TYPE] [--pool AMOUNT] [--rng-seed N]
                                      Play a random tournament in memory

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  DB_MAX_CONNECTIONS       Pool size and other DB_* pool settings
  NOTIFIER                 log | database  [default: database]
  REMINDER_INTERVAL_SECS   Poll interval of `watch`  [default: 3600]
  METRICS_BIND             Prometheus listener address
  PRIZE_SPLIT              Winner/runner-up/third percentages  [default: 70/20/10]
  RUST_LOG                 Log filter  [default: info,sqlx=warn]
  (See .env file for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let database_url: Option<String> = pargs.opt_value_from_str("--db-url")?;
    let metrics_bind: Option<SocketAddr> = pargs.opt_value_from_str("--metrics-bind")?;
    let command = Command::parse(&mut pargs)?;
    let remaining = pargs.finish();
    if !remaining.is_empty() {
        anyhow::bail!("Unexpected arguments: {remaining:?}");
    }

    logging::init();

    let config = WorkerConfig::from_env(database_url, metrics_bind)?;
    config.validate()?;

    if let Some(addr) = config.metrics_bind {
        metrics::init_metrics(addr).map_err(Error::msg)?;
        info!("Metrics exporter listening on {addr}");
    }

    let started = Instant::now();
    let result = run(&config, &command).await;
    let elapsed = started.elapsed();

    metrics::command_duration_ms(command.name(), elapsed.as_secs_f64() * 1000.0);
    logging::log_performance(command.name(), elapsed.as_millis() as u64, None);
    if result.is_err() {
        metrics::command_errors_total(command.name());
    }
    result
}

async fn run(config: &WorkerConfig, command: &Command) -> Result<(), Error> {
    if let Command::Simulate(options) = command {
        let summary = commands::simulate(options).await?;
        return commands::print_json(&summary);
    }

    info!("Connecting to database");
    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    info!("Database connected successfully");

    let result = if let Command::Migrate = command {
        db.migrate().await.map_err(Error::from)
    } else {
        match config.notifier {
            NotifierKind::Log => {
                let engine = BracketEngine::new(db.store(), LogNotifier)
                    .with_prize_split(config.prize_split);
                commands::execute(&engine, command, config.reminder_interval).await
            }
            NotifierKind::Database => {
                let engine = BracketEngine::new(db.store(), PgNotifier::new(db.shared_pool()))
                    .with_prize_split(config.prize_split);
                commands::execute(&engine, command, config.reminder_interval).await
            }
        }
    };

    db.close().await;
    result
}
