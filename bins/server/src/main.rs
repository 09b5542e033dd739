//! LedgerBridge API server.
//!
//! Serves the HTTP API and runs the import worker pool in the same process.

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerbridge_api::{ApiSettings, AppState, create_router};
use ledgerbridge_core::import::ImportOrchestrator;
use ledgerbridge_core::qbo::StateCodec;
use ledgerbridge_db::{ImportRunRepository, SeaImportStore, connect};
use ledgerbridge_qbo::{QboOAuthClient, QboReportsClient};
use ledgerbridge_shared::AppConfig;
use ledgerbridge_shared::jwt::JwtService;
use ledgerbridge_worker::{ImportQueue, WorkerPool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerbridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let db = connect(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await
    .context("Failed to connect to database")?;
    info!("Connected to database");

    let oauth = Arc::new(QboOAuthClient::from_config(&config.qbo)?);
    let reports = Arc::new(QboReportsClient::from_config(&config.qbo)?);
    if !oauth.is_configured() {
        tracing::warn!("QuickBooks client credentials are not set; imports and linking will fail");
    }

    let orchestrator = ImportOrchestrator::new(
        Arc::new(SeaImportStore::new(db.clone())),
        oauth.clone(),
        reports,
    )
    .with_refresh_skew(
        Duration::try_seconds(config.worker.refresh_skew_secs)
            .context("worker.refresh_skew_secs is out of range")?,
    );

    let (imports, jobs) = ImportQueue::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pool = WorkerPool::from_config(Arc::new(orchestrator), imports.clone(), &config.worker);
    let workers = pool.spawn(jobs, shutdown_rx);
    info!(
        concurrency = config.worker.concurrency,
        max_attempts = config.worker.max_attempts,
        "Import workers started"
    );

    let recovered = ImportRunRepository::new(db.clone())
        .unfinished_jobs()
        .await
        .context("Failed to load unfinished import runs")?;
    if !recovered.is_empty() {
        info!(count = recovered.len(), "Re-dispatching unfinished import runs");
    }
    for job in recovered {
        imports.dispatch(job);
    }

    let state = AppState {
        db,
        jwt_service: Arc::new(JwtService::from_config(&config.jwt)),
        oauth,
        state_codec: Arc::new(StateCodec::new(
            &config.oauth_state.secret,
            config.oauth_state.ttl_secs,
        )?),
        imports,
        settings: Arc::new(ApiSettings::from_config(&config)?),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping import workers");
    shutdown_tx.send(true).ok();
    workers.await.ok();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
