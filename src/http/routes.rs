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
        // Rooms
        .route("/rooms", post(handlers::create_room))
        // Session lifecycle
        .route("/session", get(handlers::get_session))
        .route("/session/join", post(handlers::join_room))
        .route("/session/connect", post(handlers::connect))
        .route("/session/disconnect", post(handlers::disconnect))
        .route("/session/transcript", get(handlers::get_transcript))
        .route("/session/participants", get(handlers::get_participants))
        // Recording control
        .route("/session/recording/start", post(handlers::start_recording))
        .route("/session/recording/stop", post(handlers::stop_recording))
        // Transcription agent
        .route(
            "/session/transcription/start",
            post(handlers::start_transcription),
        )
        .route(
            "/session/transcription/stop",
            post(handlers::stop_transcription),
        )
        .route("/session/protocol", get(handlers::get_protocol))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
