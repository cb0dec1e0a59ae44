/// Settings the session manager needs at runtime
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Transport URL used when the caller supplies a bare token
    pub transport_url: String,

    /// Ask the backend to start transcription right after connecting
    pub auto_start_transcription: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport_url: "nats://localhost:4222".to_string(),
            auto_start_transcription: false,
        }
    }
}
