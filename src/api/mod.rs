//! HTTP API
//!
//! Tenant routes are authorized per deposit by the `X-Deposit-Token`
//! header, provider callbacks by their signatures, admin routes by an
//! admin JWT.

pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    let deposit_routes = Router::new()
        .route("/", post(handlers::create_deposit))
        .route("/{code}/status", get(handlers::get_deposit_status))
        .route("/{code}/notify-paid", post(handlers::notify_paid));

    let callback_routes = Router::new()
        .route("/gateway-a", get(handlers::gateway_a_callback))
        .route("/gateway-b", post(handlers::gateway_b_callback));

    let admin_routes = Router::new()
        .route("/review", get(handlers::review_queue))
        .route("/{code}/confirm", post(handlers::confirm_deposit))
        .route("/{code}/cancel", post(handlers::cancel_deposit))
        .route("/{code}/archive", post(handlers::archive_deposit))
        .route("/{code}/resolve-review", post(handlers::resolve_review))
        .route("/{code}/history", get(handlers::deposit_history))
        .layer(from_fn_with_state(
            state.clone(),
            auth::admin_auth_middleware,
        ));

    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        .nest("/api/v1/deposits", deposit_routes)
        .nest("/api/v1/callbacks", callback_routes)
        .nest("/api/v1/admin/deposits", admin_routes)
        .with_state(state)
        // Stateless, added after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Serve until `shutdown` resolves.
pub async fn run_server(
    host: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    info!(addr = %addr, "Deposit API listening");
    info!("API docs: http://{}/docs", addr);

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;
    Ok(())
}
