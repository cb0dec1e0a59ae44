//! Session lifecycle management
//!
//! This module provides the `SessionManager` that turns a room name and a
//! participant name into a connected session, and the `SessionStore` that
//! UI layers observe:
//! - Credential exchange with the backend
//! - Transport connection and event subscriptions
//! - Transcript ingestion from inbound data
//! - Microphone publishing
//! - Teardown on disconnect, replacement or connection loss

mod config;
mod manager;
mod store;
mod transcript;

pub use config::SessionConfig;
pub use manager::{
    CredentialSource, JoinOutcome, SessionManager, AGENT_JOINED, RECORDING_STARTED,
    RECORDING_STOPPED,
};
pub use store::{SessionFlags, SessionInfo, SessionStatus, SessionStore};
pub use transcript::{MessageKind, TranscriptMessage};
