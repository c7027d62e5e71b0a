pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use laddrr_core::config::Config;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health))
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Flows
        .route("/api/ai", get(routes::flows::list_flows))
        .route("/api/ai/{flow}", post(routes::flows::run_flow))
        // Surveys
        .route(
            "/api/surveys",
            get(routes::surveys::list_surveys).post(routes::surveys::deploy_survey),
        )
        .route("/api/surveys/active", get(routes::surveys::active_survey))
        .route(
            "/api/surveys/{id}/responses",
            post(routes::surveys::submit_response),
        )
        .route("/api/surveys/{id}/opt-out", post(routes::surveys::opt_out))
        .route("/api/surveys/{id}/close", post(routes::surveys::close_survey))
        // Feedback
        .route("/api/feedback", get(routes::feedback::list_feedback))
        .route("/api/feedback/{id}", get(routes::feedback::get_feedback))
        .route(
            "/api/feedback/{id}/summarize",
            post(routes::feedback::summarize_feedback),
        )
        .route("/api/feedback/{id}/viewed", post(routes::feedback::mark_viewed))
        .route("/api/feedback/{id}/updates", post(routes::feedback::add_update))
        .route("/api/feedback/{id}/resolve", post(routes::feedback::resolve))
        // 1-on-1 history
        .route(
            "/api/one-on-ones",
            get(routes::one_on_ones::list_sessions).post(routes::one_on_ones::record_session),
        )
        .route(
            "/api/one-on-ones/briefing",
            post(routes::one_on_ones::briefing),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the server for the project at `root`, using its config.
pub async fn serve(root: PathBuf, config: &Config, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    serve_on(root, config, listener).await
}

/// Start the server on a pre-bound listener.
///
/// Lets the caller read the actual port first when binding port 0.
pub async fn serve_on(
    root: PathBuf,
    config: &Config,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let app_state = AppState::from_config(root, config)?;
    let port = listener.local_addr()?.port();

    tracing::info!(
        medium = app_state.store.medium_name(),
        model = %app_state.model,
        "laddrr server listening on http://localhost:{port}"
    );

    axum::serve(listener, build_router(app_state)).await?;
    Ok(())
}
