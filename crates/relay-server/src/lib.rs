pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{delete, get, post};
use axum::Router;
use std::future::Future;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health))
        // Relays
        .route("/api/relays", get(routes::relays::get_status))
        .route(
            "/api/relays/{relay}/toggle",
            post(routes::relays::toggle_relay),
        )
        .route("/api/relays/{relay}/on", post(routes::relays::switch_on))
        .route("/api/relays/{relay}/off", post(routes::relays::switch_off))
        // Config
        .route("/api/config", get(routes::config::get_config))
        .route(
            "/api/config/schedules",
            get(routes::config::list_schedules).post(routes::config::upsert_schedule),
        )
        .route(
            "/api/config/schedules/{id}",
            delete(routes::config::remove_schedule),
        )
        .route(
            "/api/config/relay/{relay}/name",
            post(routes::config::set_relay_name),
        )
        // Events
        .route("/api/events", get(routes::events::list_events))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the relay API server on `addr`, running until `shutdown` resolves.
pub async fn serve(
    app_state: AppState,
    addr: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve_on(app_state, listener, shutdown).await
}

/// Start the relay API server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when port 0 lets
/// the OS pick a free port).
pub async fn serve_on(
    app_state: AppState,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let local = listener.local_addr()?;
    let app = build_router(app_state);

    tracing::info!("pirelay listening on http://{local}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
