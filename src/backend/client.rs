use super::messages::{CreateRoomRequest, Credential, RoomExistsResponse, TokenRequest};
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use tracing::{debug, info};

/// Backend operations the session manager depends on
#[async_trait]
pub trait RoomService: Send + Sync {
    /// Ask the backend to create a room
    async fn create_room(&self, room_name: &str) -> SessionResult<()>;

    /// Check whether a room exists
    async fn room_exists(&self, room_name: &str) -> SessionResult<bool>;

    /// Exchange room and participant names for a connection credential
    async fn get_token(&self, room_name: &str, participant_name: &str)
        -> SessionResult<Credential>;

    /// Start the transcription agent for a room
    async fn start_transcription(&self, room_name: &str) -> SessionResult<()>;

    /// Stop the transcription agent for a room
    async fn stop_transcription(&self, room_name: &str) -> SessionResult<()>;

    /// Fetch the meeting protocol generated for a room
    async fn protocol(&self, room_name: &str) -> SessionResult<serde_json::Value>;
}

/// HTTP implementation of [`RoomService`]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        info!("Using backend at {}", base_url);

        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build `{base_url}/seg/seg/...`, percent-encoding each segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("invalid backend URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn transcription_control(&self, action: &str, room_name: &str) -> SessionResult<()> {
        let url = self
            .endpoint(&["api", action])
            .map_err(SessionError::BackendRequestFailed)?;

        let response = self
            .http
            .post(url)
            .query(&[("room_name", room_name)])
            .send()
            .await
            .map_err(|e| SessionError::BackendRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::BackendRequestFailed(format!(
                "Failed to {}: {}",
                action.replace('-', " "),
                response.status().as_u16()
            )));
        }

        info!("Backend accepted {} for room {}", action, room_name);
        Ok(())
    }
}

#[async_trait]
impl RoomService for BackendClient {
    async fn create_room(&self, room_name: &str) -> SessionResult<()> {
        let url = self
            .endpoint(&["api", "rooms"])
            .map_err(SessionError::RoomCreationFailed)?;

        let response = self
            .http
            .post(url)
            .json(&CreateRoomRequest {
                room_name: room_name.to_string(),
            })
            .send()
            .await
            .map_err(|e| SessionError::RoomCreationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                format!("status {}", status.as_u16())
            } else {
                body
            };
            return Err(SessionError::RoomCreationFailed(message));
        }

        info!("Created room {}", room_name);
        Ok(())
    }

    async fn room_exists(&self, room_name: &str) -> SessionResult<bool> {
        let url = self
            .endpoint(&["api", "rooms", room_name, "exists"])
            .map_err(SessionError::BackendRequestFailed)?;

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SessionError::BackendRequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                let body: RoomExistsResponse = response
                    .json()
                    .await
                    .map_err(|e| SessionError::BackendRequestFailed(e.to_string()))?;
                debug!("Room {} exists: {}", room_name, body.exists);
                Ok(body.exists)
            }
            status => Err(SessionError::BackendRequestFailed(format!(
                "Failed to check room: {}",
                status.as_u16()
            ))),
        }
    }

    async fn get_token(
        &self,
        room_name: &str,
        participant_name: &str,
    ) -> SessionResult<Credential> {
        let url = self
            .endpoint(&["api", "token"])
            .map_err(SessionError::TokenRequestFailed)?;

        let response = self
            .http
            .post(url)
            .json(&TokenRequest {
                room_name: room_name.to_string(),
                participant_name: participant_name.to_string(),
            })
            .send()
            .await
            .map_err(|e| SessionError::TokenRequestFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(SessionError::RoomNotFound(room_name.to_string())),
            status if !status.is_success() => {
                Err(SessionError::TokenRequestFailed(status.as_u16().to_string()))
            }
            _ => {
                let credential: Credential = response
                    .json()
                    .await
                    .map_err(|e| SessionError::TokenRequestFailed(e.to_string()))?;
                info!("Obtained token for {} in room {}", participant_name, room_name);
                Ok(credential)
            }
        }
    }

    async fn start_transcription(&self, room_name: &str) -> SessionResult<()> {
        self.transcription_control("start-transcription", room_name)
            .await
    }

    async fn stop_transcription(&self, room_name: &str) -> SessionResult<()> {
        self.transcription_control("stop-transcription", room_name)
            .await
    }

    async fn protocol(&self, room_name: &str) -> SessionResult<serde_json::Value> {
        let url = self
            .endpoint(&["api", "protocol"])
            .map_err(SessionError::BackendRequestFailed)?;

        let response = self
            .http
            .get(url)
            .query(&[("room_name", room_name)])
            .send()
            .await
            .map_err(|e| SessionError::BackendRequestFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SessionError::BackendRequestFailed(format!(
                "Failed to get protocol: {}",
                response.status().as_u16()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| SessionError::BackendRequestFailed(e.to_string()))
    }
}
