use anyhow::{Context, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Audio frame of a published local track
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub track_sid: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

impl AudioFrameMessage {
    pub fn new(
        track_sid: &str,
        sequence: u32,
        samples: &[i16],
        sample_rate: u32,
        channels: u16,
        final_frame: bool,
    ) -> Self {
        let pcm_bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        Self {
            track_sid: track_sid.to_string(),
            sequence,
            pcm: STANDARD.encode(pcm_bytes),
            sample_rate,
            channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame,
        }
    }
}

/// Presence announcement on `room.<room>.participant.{joined,left}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantMessage {
    pub identity: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Room permissions inside an access token
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoGrant {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default, rename = "roomJoin")]
    pub room_join: bool,
}

/// Claims of a room access token (JWT payload)
#[derive(Debug, Clone, Deserialize)]
pub struct AccessGrant {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub video: VideoGrant,
}

impl AccessGrant {
    /// Read the claims of `token` without verifying its signature.
    /// Verification is the server's job.
    pub fn from_token(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .context("Access token is not a JWT")?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .context("Access token payload is not base64url")?;

        serde_json::from_slice(&bytes).context("Access token payload is not valid JSON")
    }

    pub fn room(&self) -> Result<&str> {
        self.video
            .room
            .as_deref()
            .filter(|room| !room.is_empty())
            .context("Access token does not grant a room")
    }
}
