//! # adpilotd — adpilot daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (config file, env vars)
//! - Initialize logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository and platform implementations (adapters)
//! - Construct the rule engine and services, injecting adapters via port traits
//! - Run the rule scheduler in the background
//! - Build the axum router, bind to a TCP port and serve
//! - Handle graceful shutdown (SIGTERM/SIGINT) of both server and scheduler
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use adpilot_adapter_http_axum::state::AppState;
use adpilot_adapter_storage_sqlite_sqlx::{
    Config as StorageConfig, SqliteExecutionStore, SqliteRuleRepository,
};
use adpilot_adapter_virtual::{VirtualCampaign, VirtualPlatform};
use adpilot_app::event_bus::InProcessEventBus;
use adpilot_app::executor::ActionExecutor;
use adpilot_app::rule_engine::{EngineSettings, RuleEngine};
use adpilot_app::scheduler::RuleScheduler;
use adpilot_app::services::rule_service::RuleService;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;
    init_tracing(&config.logging.filter);

    // Database
    let db = StorageConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await
    .context("failed to initialise database")?;
    let pool = db.pool().clone();
    tracing::info!("database ready");

    // Platform
    let platform = Arc::new(if config.platform.virtual_enabled {
        VirtualPlatform::demo()
    } else {
        VirtualPlatform::new(Vec::<VirtualCampaign>::new())
    });

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(256));

    // Engine & services
    let trust = config.trust_settings()?;
    let engine = Arc::new(RuleEngine::new(
        SqliteRuleRepository::new(pool.clone()),
        SqliteExecutionStore::new(pool.clone()),
        Arc::clone(&platform),
        Arc::clone(&platform),
        ActionExecutor::new(Arc::clone(&platform), config.action_timeout()),
        Arc::clone(&event_bus),
        EngineSettings {
            trust,
            read_retries: config.engine.read_retries,
        },
    ));
    let rule_service = RuleService::new(
        SqliteRuleRepository::new(pool.clone()),
        SqliteExecutionStore::new(pool.clone()),
        Arc::clone(&event_bus),
        trust,
    );

    // Scheduler
    let scheduler = RuleScheduler::new(SqliteRuleRepository::new(pool), Arc::clone(&engine));
    let (stop_scheduler, stopped) = oneshot::channel::<()>();
    let period = config.poll_interval();
    let scheduler_task = tokio::spawn(async move {
        scheduler
            .run_until(period, async {
                let _ = stopped.await;
            })
            .await;
    });

    // HTTP
    let state = AppState::new(rule_service, engine, event_bus);
    let app = adpilot_adapter_http_axum::router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "adpilotd listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server terminated with error");

    let _ = stop_scheduler.send(());
    if let Err(err) = scheduler_task.await {
        tracing::error!(error = %err, "scheduler task failed");
    }
    tracing::info!("adpilotd stopped");
    served
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|err| {
        eprintln!("invalid log filter {filter:?} ({err}), falling back to info");
        EnvFilter::new("info")
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
