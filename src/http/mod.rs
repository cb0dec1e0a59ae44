//! Local HTTP API for driving the session from a UI
//!
//! - GET /health - Health check
//! - POST /rooms - Create a room
//! - GET /session - Flags and live session
//! - POST /session/join - Join (existence check, backend token or provided token)
//! - POST /session/connect - Join with an explicit URL and token
//! - POST /session/disconnect - Leave the room
//! - GET /session/transcript, /session/participants
//! - POST /session/recording/{start,stop}
//! - POST /session/transcription/{start,stop}, GET /session/protocol

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
