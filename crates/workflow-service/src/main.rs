use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use platform_core::accounts::InMemoryAccountsRepository;
use platform_core::auth::TokenIssuer;
use platform_core::job::{InMemoryJobStore, JobStore};
use platform_core::ratelimit::KeyedRateLimiter;
use platform_core::redis_job_store::RedisJobStore;
use platform_core::sqlite::SqlitePool;
use tokio_util::sync::CancellationToken;
use workflow_engine::completion::{Completion, HttpCompletion, MockCompletion};
use workflow_engine::engine::Engine;
use workflow_engine::push_bus::PushBus;
use workflow_engine::repository::in_memory::{
    InMemoryEventRepository, InMemoryRunRepository, InMemoryStepRepository, InMemoryWorkflowRepository,
};
use workflow_engine::worker::StepWorker;
use workflow_service::config::AppConfig;
use workflow_service::state::AppState;
use workflow_service::routes;

/// Bounded drain window enforced on shutdown (§5 "Graceful shutdown").
const DRAIN_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Parser)]
#[command(name = "workflow-service")]
#[command(version, about = "AI workflow execution engine HTTP + worker service")]
struct Cli {
    /// Run only the HTTP API plane; do not start the step worker pool.
    #[arg(long)]
    api_only: bool,

    /// Run only the step worker pool; do not bind an HTTP listener.
    #[arg(long)]
    workers_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.common.log_level))
        .json()
        .init();

    let workflows = Arc::new(InMemoryWorkflowRepository::new());
    let runs = Arc::new(InMemoryRunRepository::new());
    let steps = Arc::new(InMemoryStepRepository::new());
    let events = Arc::new(InMemoryEventRepository::new());
    let accounts = Arc::new(InMemoryAccountsRepository::new());

    let job_store: Arc<dyn JobStore> = match RedisJobStore::connect(&config.common.kv_url).await {
        Ok(store) => {
            tracing::info!("connected to redis job store");
            Arc::new(store)
        }
        Err(err) => {
            tracing::warn!(%err, "redis unavailable, falling back to the in-memory job store");
            Arc::new(InMemoryJobStore::new())
        }
    };

    let completion: Arc<dyn Completion> = match &config.completion_api_key {
        Some(key) => Arc::new(HttpCompletion::new("https://api.openai.com/v1/completions", key.clone())),
        None => Arc::new(MockCompletion),
    };

    let push_bus = Arc::new(PushBus::new());
    let engine = Arc::new(Engine::new(
        workflows.clone(),
        runs.clone(),
        steps.clone(),
        events.clone(),
        job_store.clone(),
        completion,
        push_bus.clone(),
    ));

    let db = SqlitePool::open_in_memory().context("failed to open reachability-probe database")?;

    let state = Arc::new(AppState {
        config: config.clone(),
        engine: engine.clone(),
        workflows,
        runs: runs.clone(),
        steps: steps.clone(),
        events,
        accounts,
        job_store: job_store.clone(),
        push_bus,
        tokens: TokenIssuer::new(config.common.jwt_secret.clone()),
        db,
        rate_limiter: KeyedRateLimiter::per_minute(100),
    });

    let shutdown = CancellationToken::new();
    let worker = StepWorker::new(job_store, engine, runs, steps);

    let mut tasks = tokio::task::JoinSet::new();

    if !cli.api_only {
        let worker_shutdown = shutdown.clone();
        tasks.spawn(async move {
            worker.run(worker_shutdown).await;
        });
    }

    if !cli.workers_only {
        let addr = format!("0.0.0.0:{}", config.common.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        tracing::info!(%addr, "workflow-service listening");

        let app = routes::build_router(state);
        let server_shutdown = shutdown.clone();
        tasks.spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await;
            if let Err(err) = result {
                tracing::error!(%err, "http server exited with an error");
            }
        });
    }

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining");
        }
    }
    shutdown.cancel();

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        tracing::error!("drain window exceeded, exiting with non-zero status");
        std::process::exit(1);
    }

    tracing::info!("shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
