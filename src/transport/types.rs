use crate::audio::TrackHandle;
use anyhow::{Context, Result};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// A room member as seen by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: String,
    pub name: String,
}

impl Participant {
    pub fn new(identity: impl Into<String>, name: Option<String>) -> Self {
        let identity = identity.into();
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| identity.clone());
        Self { identity, name }
    }
}

/// What a successful connect yields
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room: String,
    pub local: Participant,
    /// Participants already present when we joined
    pub remote: Vec<Participant>,
}

/// Event kinds a caller can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ParticipantJoined,
    ParticipantLeft,
    DataReceived,
    ConnectionLost,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::ParticipantJoined,
        EventKind::ParticipantLeft,
        EventKind::DataReceived,
        EventKind::ConnectionLost,
    ];
}

/// Inbound transport event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    DataReceived {
        payload: Vec<u8>,
        /// Identity of the sender, when the transport knows it
        from: Option<String>,
    },
    ConnectionLost {
        reason: String,
    },
}

pub type EventStream = BoxStream<'static, TransportEvent>;

/// A local track that has been published to the room
#[derive(Debug)]
pub struct PublishedTrack {
    handle: TrackHandle,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl PublishedTrack {
    pub fn new(handle: TrackHandle) -> Self {
        Self {
            handle,
            stop_tx: None,
            task: None,
        }
    }

    /// Attach the task forwarding frames to the transport.
    /// The task must exit once `stop_tx` fires or is dropped.
    pub fn with_task(mut self, stop_tx: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        self.stop_tx = Some(stop_tx);
        self.task = Some(task);
        self
    }

    pub fn sid(&self) -> &str {
        self.handle.sid()
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }

    /// Stop the underlying capture and wait for the forwarding task
    pub async fn stop(&mut self) -> Result<()> {
        debug!("Stopping track {}", self.handle.sid());
        self.handle.stop();

        if let Some(stop_tx) = self.stop_tx.take() {
            // The task may already be gone.
            let _ = stop_tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.await.context("Track publishing task panicked")?;
        }

        Ok(())
    }
}
