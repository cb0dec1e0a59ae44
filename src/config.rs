use crate::audio::WavCapture;
use crate::session::SessionConfig;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Process-wide settings, resolved once at startup.
///
/// Sources, later ones win: built-in defaults, the optional config file,
/// then `ROOM_SCRIBE__<SECTION>__<KEY>` environment variables
/// (e.g. `ROOM_SCRIBE__BACKEND__URL`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub transport: TransportConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "room-scribe".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub url: String,
    /// Start the transcription agent right after connecting
    pub auto_start_transcription: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            auto_start_transcription: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Length of each captured frame in milliseconds
    pub buffer_duration_ms: u64,

    /// WAV file played as the microphone; none means no capture source
    pub file: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            buffer_duration_ms: 100,
            file: None,
        }
    }
}

impl AudioConfig {
    /// Capture source for `file`, if one is configured
    pub fn capture(&self) -> Option<WavCapture> {
        self.file
            .as_ref()
            .map(|path| WavCapture::new(path.clone(), self.buffer_duration_ms))
    }
}

impl Config {
    /// Load from `path` (extension optional, file may be absent) and the environment
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("ROOM_SCRIBE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            transport_url: self.transport.url.clone(),
            auto_start_transcription: self.transport.auto_start_transcription,
        }
    }
}
