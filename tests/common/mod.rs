// In-memory collaborators for session manager tests
//
// FakeRoom is shared by every transport a FakeTransportFactory hands out,
// so tests can inject events and inspect what the manager did.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use room_scribe::audio::{
    AudioConstraints, AudioFrame, LocalAudioTrack, MediaDevices, MediaStream, TrackHandle,
};
use room_scribe::backend::{Credential, RoomService};
use room_scribe::transport::{
    EventKind, EventStream, Participant, PublishedTrack, RoomInfo, Transport, TransportEvent,
    TransportFactory,
};
use room_scribe::{SessionConfig, SessionError, SessionManager, SessionResult, SessionStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

// ============================================================================
// Transport
// ============================================================================

#[derive(Default)]
pub struct FakeRoom {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub fail_connect: Mutex<Option<String>>,
    pub fail_publish: AtomicBool,
    /// Connect never completes while set
    pub stall_connect: AtomicBool,
    pub remote: Mutex<Vec<Participant>>,
    pub published: Mutex<Vec<TrackHandle>>,
    /// Open subscriptions seen by each disconnect call
    pub open_at_disconnect: Mutex<Vec<usize>>,
    senders: Mutex<Vec<(EventKind, mpsc::UnboundedSender<TransportEvent>)>>,
}

impl FakeRoom {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn kind_of(event: &TransportEvent) -> EventKind {
        match event {
            TransportEvent::ParticipantJoined(_) => EventKind::ParticipantJoined,
            TransportEvent::ParticipantLeft(_) => EventKind::ParticipantLeft,
            TransportEvent::DataReceived { .. } => EventKind::DataReceived,
            TransportEvent::ConnectionLost { .. } => EventKind::ConnectionLost,
        }
    }

    /// Deliver `event` to every open subscription of its kind
    pub fn emit(&self, event: TransportEvent) {
        let kind = Self::kind_of(&event);
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|(_, tx)| !tx.is_closed());
        for (_, tx) in senders.iter().filter(|(k, _)| *k == kind) {
            let _ = tx.send(event.clone());
        }
    }

    pub fn data(&self, text: &str) {
        self.emit(TransportEvent::DataReceived {
            payload: text.as_bytes().to_vec(),
            from: Some("agent-transcriber".to_string()),
        });
    }

    pub fn open_subscriptions(&self) -> usize {
        self.senders
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

pub struct FakeTransport {
    room: Arc<FakeRoom>,
}

#[async_trait]
impl Transport for FakeTransport {
    /// Tokens look like `room:identity`
    async fn connect(&mut self, _url: &str, token: &str) -> Result<RoomInfo> {
        self.room.connects.fetch_add(1, Ordering::SeqCst);
        if self.room.stall_connect.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = self.room.fail_connect.lock().unwrap().clone() {
            bail!(reason);
        }

        let (room, identity) = token.split_once(':').unwrap_or(("alpha", token));
        Ok(RoomInfo {
            room: room.to_string(),
            local: Participant::new(identity, None),
            remote: self.room.remote.lock().unwrap().clone(),
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        let open = self.room.open_subscriptions();
        self.room.open_at_disconnect.lock().unwrap().push(open);
        self.room.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish_local_audio(&self, track: LocalAudioTrack) -> Result<PublishedTrack> {
        if self.room.fail_publish.load(Ordering::SeqCst) {
            bail!("publish rejected");
        }
        let handle = track.handle();
        self.room.published.lock().unwrap().push(handle.clone());
        Ok(PublishedTrack::new(handle))
    }

    async fn subscribe(&self, kind: EventKind) -> Result<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.room.senders.lock().unwrap().push((kind, tx));
        Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|e| (e, rx)) }).boxed())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct FakeTransportFactory {
    pub room: Arc<FakeRoom>,
}

impl TransportFactory for FakeTransportFactory {
    fn create(&self) -> Box<dyn Transport> {
        Box::new(FakeTransport {
            room: Arc::clone(&self.room),
        })
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Default)]
pub struct FakeBackend {
    pub calls: Mutex<Vec<String>>,
    /// Rooms the backend answers 404 for
    pub missing_rooms: Mutex<Vec<String>>,
    pub fail_create: Mutex<Option<String>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn is_missing(&self, room: &str) -> bool {
        self.missing_rooms.lock().unwrap().iter().any(|r| r == room)
    }
}

#[async_trait]
impl RoomService for FakeBackend {
    async fn create_room(&self, room_name: &str) -> SessionResult<()> {
        self.record(format!("create:{}", room_name));
        match self.fail_create.lock().unwrap().clone() {
            Some(msg) => Err(SessionError::RoomCreationFailed(msg)),
            None => Ok(()),
        }
    }

    async fn room_exists(&self, room_name: &str) -> SessionResult<bool> {
        self.record(format!("exists:{}", room_name));
        Ok(!self.is_missing(room_name))
    }

    async fn get_token(
        &self,
        room_name: &str,
        participant_name: &str,
    ) -> SessionResult<Credential> {
        self.record(format!("token:{}:{}", room_name, participant_name));
        if self.is_missing(room_name) {
            return Err(SessionError::RoomNotFound(room_name.to_string()));
        }
        Ok(Credential {
            url: "nats://fake:4222".to_string(),
            token: format!("{}:{}", room_name, participant_name),
        })
    }

    async fn start_transcription(&self, room_name: &str) -> SessionResult<()> {
        self.record(format!("start-transcription:{}", room_name));
        Ok(())
    }

    async fn stop_transcription(&self, room_name: &str) -> SessionResult<()> {
        self.record(format!("stop-transcription:{}", room_name));
        Ok(())
    }

    async fn protocol(&self, room_name: &str) -> SessionResult<serde_json::Value> {
        self.record(format!("protocol:{}", room_name));
        Ok(serde_json::json!({ "room": room_name, "summary": "standup" }))
    }
}

// ============================================================================
// Microphone
// ============================================================================

pub struct FakeMicrophone {
    pub tracks: usize,
    pub requests: Mutex<Vec<AudioConstraints>>,
    /// Keeps frame channels open for the lifetime of the test
    pub feeds: Mutex<Vec<mpsc::Sender<AudioFrame>>>,
}

impl FakeMicrophone {
    pub fn with_tracks(tracks: usize) -> Arc<Self> {
        Arc::new(Self {
            tracks,
            requests: Mutex::new(Vec::new()),
            feeds: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<AudioConstraints> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDevices for FakeMicrophone {
    async fn get_user_media(&self, constraints: AudioConstraints) -> Result<MediaStream> {
        self.requests.lock().unwrap().push(constraints);

        let mut audio_tracks = Vec::new();
        for _ in 0..self.tracks {
            let (tx, rx) = mpsc::channel(16);
            self.feeds.lock().unwrap().push(tx);
            audio_tracks.push(LocalAudioTrack::new(rx, Arc::new(AtomicBool::new(true))));
        }
        Ok(MediaStream { audio_tracks })
    }

    fn name(&self) -> &str {
        "fake-mic"
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub manager: Arc<SessionManager>,
    pub store: Arc<SessionStore>,
    pub room: Arc<FakeRoom>,
    pub backend: Arc<FakeBackend>,
    pub mic: Arc<FakeMicrophone>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_mic(FakeMicrophone::with_tracks(1))
    }

    pub fn with_mic(mic: Arc<FakeMicrophone>) -> Self {
        Self::build(mic, SessionConfig::default())
    }

    pub fn build(mic: Arc<FakeMicrophone>, config: SessionConfig) -> Self {
        let store = Arc::new(SessionStore::new());
        let room = FakeRoom::new();
        let backend = FakeBackend::new();

        let manager = Arc::new(SessionManager::new(
            Arc::clone(&store),
            backend.clone(),
            Arc::new(FakeTransportFactory {
                room: Arc::clone(&room),
            }),
            mic.clone(),
            config,
        ));

        Self {
            manager,
            store,
            room,
            backend,
            mic,
        }
    }
}

/// Poll `check` until it holds, panicking after two seconds
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give spawned listeners a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
