// src/main.rs — modelforge entry point

use std::sync::Arc;

use clap::Parser;

use modelforge::api::{self, ApiState};
use modelforge::core::controller::IterationController;
use modelforge::core::evaluator::{Evaluator, MetricEvaluator};
use modelforge::core::types::EngineConfig;
use modelforge::infra::config::Config;
use modelforge::infra::logger;
use modelforge::provider;
use modelforge::queue;
use modelforge::store;
use modelforge::worker::WorkerPool;

/// Queue-backed worker service for LLM-guided model building.
#[derive(Parser)]
#[command(name = "modelforge", version, about)]
struct Cli {
    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(&cli.log_level);

    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let queue = queue::from_config(&config.queue);
    let store = store::from_config(&config.store);
    let proposer = provider::resolve(&config.provider)?;
    let evaluator: Arc<dyn Evaluator> = Arc::new(MetricEvaluator);

    let controller = Arc::new(IterationController::new(
        proposer,
        evaluator,
        store.clone(),
        EngineConfig::from(&config.build),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let pool = WorkerPool::new(queue.clone(), controller, &config.worker);
    let pool_handle = tokio::spawn(pool.run(shutdown_rx));

    let api_state = ApiState {
        store: store.clone(),
        queue: queue.clone(),
        defaults: config.build.clone(),
        debug: config.api.debug,
    };
    let api_config = config.api.clone();
    tokio::spawn(async move {
        if let Err(e) = api::start_server(&api_config, api_state).await {
            tracing::error!("API server failed: {e}");
        }
    });

    tracing::info!(
        workers = config.worker.concurrency,
        prefetch = config.worker.prefetch_count,
        max_iterations = config.build.max_iterations,
        timeout_secs = config.build.timeout.as_secs(),
        "modelforge running. Press Ctrl+C to stop."
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested, draining workers...");
    let _ = shutdown_tx.send(true);
    pool_handle.await??;
    Ok(())
}
