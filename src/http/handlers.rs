use super::state::AppState;
use crate::error::SessionError;
use crate::session::{CredentialSource, JoinOutcome, SessionFlags, SessionInfo};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub room_name: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub room_name: String,
    pub participant_name: String,

    /// Join with this token instead of asking the backend for one
    pub token: Option<String>,

    /// Only check that the room exists
    #[serde(default)]
    pub check_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub flags: SessionFlags,
    pub session: Option<SessionInfo>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub status: String,
    pub session: Option<SessionInfo>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn status(status: &str) -> Response {
    (
        StatusCode::OK,
        Json(StatusResponse {
            status: status.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let code = match &self {
            SessionError::RoomNotFound(_) => StatusCode::NOT_FOUND,
            SessionError::InvalidCredential => StatusCode::BAD_REQUEST,
            SessionError::NotConnected => StatusCode::CONFLICT,
            SessionError::NoAudioDevice | SessionError::CaptureFailed(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SessionError::RoomCreationFailed(_)
            | SessionError::TokenRequestFailed(_)
            | SessionError::ConnectionFailed(_)
            | SessionError::ConnectionLost(_)
            | SessionError::BackendRequestFailed(_) => StatusCode::BAD_GATEWAY,
            SessionError::PublishFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (
            code,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /rooms
pub async fn create_room(
    State(state): State<AppState>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<Response, SessionError> {
    info!("Create room requested: {}", req.room_name);
    state.manager.create_room(&req.room_name).await?;
    Ok(status("created"))
}

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    let store = state.manager.store();
    Json(SessionResponse {
        flags: store.flags(),
        session: store.session(),
    })
}

/// POST /session/join
pub async fn join_room(
    State(state): State<AppState>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<Response, SessionError> {
    let source = match (req.check_only, req.token) {
        (true, _) => CredentialSource::ExistenceCheck,
        (false, Some(token)) => CredentialSource::Provided(token),
        (false, None) => CredentialSource::Backend,
    };

    let outcome = state
        .manager
        .join_room(&req.room_name, &req.participant_name, source)
        .await?;

    let (status, session) = match outcome {
        JoinOutcome::Skipped => ("skipped", None),
        JoinOutcome::RoomExists => ("exists", None),
        JoinOutcome::Connected(info) => ("connected", Some(info)),
    };

    Ok(Json(JoinResponse {
        status: status.to_string(),
        session,
    })
    .into_response())
}

/// POST /session/connect
pub async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Response, SessionError> {
    let session = state.manager.join_with_token(&req.url, &req.token).await?;
    Ok(Json(JoinResponse {
        status: "connected".to_string(),
        session: Some(session),
    })
    .into_response())
}

/// POST /session/disconnect
pub async fn disconnect(State(state): State<AppState>) -> impl IntoResponse {
    state.manager.disconnect().await;
    status("disconnected")
}

/// GET /session/transcript
pub async fn get_transcript(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.store().transcript())
}

/// GET /session/participants
pub async fn get_participants(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.manager.store().participants())
}

/// POST /session/recording/start
pub async fn start_recording(State(state): State<AppState>) -> Result<Response, SessionError> {
    state.manager.start_recording().await?;
    let recording = state.manager.store().flags().recording;
    Ok(status(if recording { "recording" } else { "idle" }))
}

/// POST /session/recording/stop
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    state.manager.stop_recording().await;
    status("stopped")
}

/// POST /session/transcription/start
pub async fn start_transcription(
    State(state): State<AppState>,
) -> Result<Response, SessionError> {
    state.manager.start_transcription().await?;
    Ok(status("transcribing"))
}

/// POST /session/transcription/stop
pub async fn stop_transcription(
    State(state): State<AppState>,
) -> Result<Response, SessionError> {
    state.manager.stop_transcription().await?;
    Ok(status("stopped"))
}

/// GET /session/protocol
pub async fn get_protocol(State(state): State<AppState>) -> Result<Response, SessionError> {
    let protocol = state.manager.protocol().await?;
    Ok(Json(protocol).into_response())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
