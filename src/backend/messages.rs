use serde::{Deserialize, Serialize};

/// Body of `POST /api/token`
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenRequest {
    pub room_name: String,
    pub participant_name: String,
}

/// Connection credential issued by the backend.
///
/// Single-use: consumed by one connection attempt and not retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub url: String,
    pub token: String,
}

/// Body of `POST /api/rooms`
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub room_name: String,
}

/// Response of `GET /api/rooms/{name}/exists`
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomExistsResponse {
    pub exists: bool,
}
