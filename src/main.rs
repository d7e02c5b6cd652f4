//! Rental Deposit service entry point
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌───────────┐    ┌──────────┐
//! │  Config  │───▶│  Store   │───▶│ Lifecycle │◀───│ HTTP API │
//! │  (YAML)  │    │(PG / mem)│    │  Engine   │    │  (axum)  │
//! └──────────┘    └──────────┘    └───────────┘    └──────────┘
//!                                       ▲
//!                                 ┌───────────┐
//!                                 │  Sweeper  │
//!                                 └───────────┘
//! ```
//!
//! Usage: `rental_deposit [--env dev] [--port 8080]`

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use rental_deposit::api::{self, AppState, auth::AdminAuth};
use rental_deposit::clock::SystemClock;
use rental_deposit::config::AppConfig;
use rental_deposit::db::Database;
use rental_deposit::deposit::db::PgDepositStore;
use rental_deposit::deposit::{
    ChannelBuilder, DepositStore, ExpirySweeper, LifecycleEngine, MemoryDepositStore,
    SweeperConfig,
};
use rental_deposit::logging::init_logging;
use rental_deposit::verifier::{GatewayAVerifier, GatewayBVerifier, VerifierSet};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

async fn shutdown_signal(tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
    }
    tracing::info!("Shutdown requested");
    let _ = tx.send(true);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = init_logging(&app_config);

    tracing::info!(
        env = %env,
        git = env!("GIT_HASH"),
        "Starting rental deposit service"
    );

    let (store, pg_db): (Arc<dyn DepositStore>, Option<Arc<Database>>) =
        match &app_config.postgres_url {
            Some(url) => {
                let db = Database::connect(url)
                    .await
                    .context("Failed to connect to PostgreSQL")?;
                db.run_migrations()
                    .await
                    .context("Failed to run migrations")?;
                tracing::info!("Using PostgreSQL transaction store");
                let store = PgDepositStore::new(db.pool().clone());
                (Arc::new(store), Some(Arc::new(db)))
            }
            None => {
                tracing::warn!("postgres_url not set, deposits are kept in memory only");
                (Arc::new(MemoryDepositStore::new()), None)
            }
        };

    let verifiers = Arc::new(VerifierSet::new(
        GatewayAVerifier::new(app_config.providers.gateway_a.clone()),
        GatewayBVerifier::new(app_config.providers.gateway_b.clone()),
    ));
    let channels = ChannelBuilder::new(
        verifiers.clone(),
        app_config.bank.clone(),
        app_config.providers.gateway_a.return_url.clone(),
    );

    let engine = Arc::new(LifecycleEngine::new(
        store,
        Arc::new(SystemClock),
        channels,
        app_config.deposit.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let sweeper = ExpirySweeper::new(engine.clone(), SweeperConfig::from(&app_config.deposit));
    let sweeper_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let state = Arc::new(AppState::new(
        engine,
        verifiers,
        AdminAuth::new(app_config.admin_jwt_secret.clone()),
        pg_db,
    ));

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    let served = api::run_server(
        &app_config.gateway.host,
        port,
        state,
        shutdown_signal(shutdown_tx),
    )
    .await;

    // run_server may fail before ctrl-c; the sender is dropped either way
    if let Err(e) = sweeper_handle.await {
        tracing::error!(error = %e, "Sweeper task panicked");
    }
    tracing::info!("Stopped");
    served
}
