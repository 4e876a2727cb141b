use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/start", post(handlers::start_session))
        .route("/sessions/:session_id/end", post(handlers::end_session))
        .route("/sessions/:session_id/captions", post(handlers::post_captions))
        // Session queries
        .route("/sessions/:session_id/status", get(handlers::get_session_status))
        .route("/sessions/:session_id/speakers", get(handlers::get_session_speakers))
        .route("/sessions/:session_id/answers", get(handlers::get_session_answers))
        // Live answer delivery (Server-Sent Events)
        .route("/sessions/:session_id/stream", get(handlers::stream_answers))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // Overlay clients run in a browser context
        .layer(CorsLayer::permissive())
        .with_state(state)
}
