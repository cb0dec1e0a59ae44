//! Client for the token-issuing backend
//!
//! Covers the room, token and transcription-control endpoints:
//! - POST /api/rooms - Create a room
//! - GET /api/rooms/{name}/exists - Room existence check
//! - POST /api/token - Exchange room + participant for a credential
//! - POST /api/start-transcription, /api/stop-transcription
//! - GET /api/protocol

mod client;
mod messages;

pub use client::{BackendClient, RoomService};
pub use messages::{CreateRoomRequest, Credential, RoomExistsResponse, TokenRequest};
