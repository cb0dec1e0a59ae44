use thiserror::Error;

/// Errors surfaced by session operations.
///
/// Every variant carries a human-readable message; the same text is
/// recorded into the store's `error` flag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Failed to create room: {0}")]
    RoomCreationFailed(String),

    #[error("Room \"{0}\" does not exist. Please create it first.")]
    RoomNotFound(String),

    #[error("Failed to get token: {0}")]
    TokenRequestFailed(String),

    #[error("Failed to connect to room: {0}")]
    ConnectionFailed(String),

    #[error("Connection to room lost: {0}")]
    ConnectionLost(String),

    #[error("URL and token are required")]
    InvalidCredential,

    #[error("No audio track available")]
    NoAudioDevice,

    #[error("Failed to capture audio: {0}")]
    CaptureFailed(String),

    #[error("Failed to publish audio track: {0}")]
    PublishFailed(String),

    #[error("Backend request failed: {0}")]
    BackendRequestFailed(String),

    #[error("Not connected to a room")]
    NotConnected,
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
