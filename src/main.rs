use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use worker_lifecycle::{
    init_telemetry, shutdown_telemetry, Database, LifecycleConfig, LifecycleDriver,
    LifecycleMetrics, LifecycleOperation, ShutdownCoordinator, SqlWorkerLifecycle,
    WorkerLifecycle,
};

#[derive(Parser)]
#[command(name = "worker-lifecycle")]
#[command(about = "Drive cluster worker lifecycle transitions")]
#[command(long_about = "Stalls unresponsive workers, deletes expired ephemeral workers, and lands or \
                       retires draining workers once no non-interruptible build depends on them.")]
struct Cli {
    /// Configuration file to layer over worker-lifecycle.toml and the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run lifecycle transitions on the configured interval until interrupted
    Run {
        /// Override the configured interval
        #[arg(long, help = "Seconds between lifecycle ticks")]
        interval_seconds: Option<u64>,
    },
    /// Run every lifecycle transition once and print the affected workers
    Tick,
    /// Print every worker and its current state
    States,
    /// Print the effective configuration
    Config,
    /// Apply database migrations and exit
    Migrate,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = LifecycleConfig::load_env_file();
    let mut config = LifecycleConfig::load(cli.config.as_deref())?;

    if let Commands::Config = cli.command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    init_telemetry(&config.observability)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(async {
        match cli.command {
            Commands::Run { interval_seconds } => {
                if let Some(seconds) = interval_seconds {
                    config.lifecycle.interval_seconds = seconds;
                    config.validate()?;
                }
                run_command(&config).await
            }
            Commands::Tick => tick_command(&config).await,
            Commands::States => states_command(&config).await,
            Commands::Migrate => migrate_command(&config).await,
            Commands::Config => Ok(()),
        }
    });

    shutdown_telemetry();
    result
}

async fn run_command(config: &LifecycleConfig) -> Result<()> {
    let database = Database::connect(&config.database).await?;
    let metrics = Arc::new(LifecycleMetrics::new());
    let driver = LifecycleDriver::new(
        SqlWorkerLifecycle::new(database.pool().clone()),
        metrics.clone(),
    );

    let coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();

    let run = driver.run(config.lifecycle.interval(), signal);
    tokio::pin!(run);

    // Let an in-flight tick finish once Ctrl-C arrives.
    tokio::select! {
        _ = &mut run => {}
        result = coordinator.wait_for_ctrl_c() => {
            result?;
            run.await;
        }
    }

    metrics.log_stats();
    database.shutdown().await;
    Ok(())
}

async fn tick_command(config: &LifecycleConfig) -> Result<()> {
    let database = Database::connect(&config.database).await?;
    let driver = LifecycleDriver::new(
        SqlWorkerLifecycle::new(database.pool().clone()),
        Arc::new(LifecycleMetrics::new()),
    );

    let report = driver.tick().await;

    for operation in [
        LifecycleOperation::DeleteUnresponsiveEphemeralWorkers,
        LifecycleOperation::StallUnresponsiveWorkers,
        LifecycleOperation::LandFinishedLandingWorkers,
        LifecycleOperation::DeleteFinishedRetiringWorkers,
    ] {
        let affected = report.affected(operation);
        if affected.is_empty() {
            println!("{operation}: none");
        } else {
            println!("{operation}: {}", affected.join(", "));
        }
    }

    database.shutdown().await;

    if let Some((operation, error)) = report.errors.into_iter().next() {
        return Err(error).with_context(|| format!("{operation} failed"));
    }
    Ok(())
}

async fn states_command(config: &LifecycleConfig) -> Result<()> {
    let database = Database::connect(&config.database).await?;
    let lifecycle = SqlWorkerLifecycle::new(database.pool().clone());

    let states = lifecycle.worker_state_by_name().await;
    database.shutdown().await;

    let mut states: Vec<_> = states?.into_iter().collect();
    states.sort();

    if states.is_empty() {
        println!("No workers registered");
    }
    for (name, state) in states {
        println!("{name}\t{state}");
    }
    Ok(())
}

async fn migrate_command(config: &LifecycleConfig) -> Result<()> {
    let mut database_config = config.database.clone();
    database_config.auto_migrate = false;

    let database = Database::connect(&database_config).await?;
    database.migrate().await?;
    info!("Database at {} is up to date", database_config.url);
    database.shutdown().await;
    Ok(())
}
