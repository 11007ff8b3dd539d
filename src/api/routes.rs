use crate::api::{handlers, sse, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::health_check))
        .route("/health/ready", get(handlers::health_check))
        // Metrics
        .route("/metrics", get(handlers::metrics))
        // Issue management
        .route("/v1/issues", post(handlers::create_issue))
        .route("/v1/issues/:id", get(handlers::get_issue))
        .route(
            "/v1/issues/:id/transitions",
            post(handlers::execute_transition).get(handlers::list_transitions),
        )
        .route("/v1/transitions/:from", get(handlers::valid_transitions))
        // Live streaming
        .route("/v1/stream/telemetry", get(sse::telemetry_stream))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}
