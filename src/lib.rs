pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;

pub use audio::{AudioConstraints, AudioFile, AudioFrame, LocalAudioTrack, MediaDevices, WavCapture};
pub use backend::{BackendClient, Credential, RoomService};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use http::{create_router, AppState};
pub use session::{
    CredentialSource, JoinOutcome, MessageKind, SessionConfig, SessionFlags, SessionInfo,
    SessionManager, SessionStatus, SessionStore, TranscriptMessage,
};
pub use transport::{NatsTransport, NatsTransportFactory, Transport, TransportFactory};
