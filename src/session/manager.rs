use super::config::SessionConfig;
use super::store::{Activity, Session, SessionInfo, SessionStatus, SessionStore, Subscription};
use super::transcript::TranscriptMessage;
use crate::audio::{AudioConstraints, MediaDevices};
use crate::backend::RoomService;
use crate::error::{SessionError, SessionResult};
use crate::transport::{EventKind, EventStream, Participant, TransportEvent, TransportFactory};
use futures::stream::StreamExt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Emitted once per session, before the first transcription
pub const AGENT_JOINED: &str = "agent joined";
pub const RECORDING_STARTED: &str = "Recording started - speak to see transcriptions!";
pub const RECORDING_STOPPED: &str = "Recording stopped.";

/// Where `join_room` gets its credential from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Only verify that the room exists; do not connect
    ExistenceCheck,
    /// Request a credential from the backend token endpoint
    Backend,
    /// Use this token with the configured transport URL
    Provided(String),
}

/// Result of `join_room`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Blank input, nothing happened
    Skipped,
    /// Existence check passed
    RoomExists,
    Connected(SessionInfo),
}

/// Orchestrates backend, transport and media capture into store transitions
pub struct SessionManager {
    store: Arc<SessionStore>,
    backend: Arc<dyn RoomService>,
    transports: Arc<dyn TransportFactory>,
    media: Arc<dyn MediaDevices>,
    config: SessionConfig,
    /// Serializes connect/disconnect transitions
    transition: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        store: Arc<SessionStore>,
        backend: Arc<dyn RoomService>,
        transports: Arc<dyn TransportFactory>,
        media: Arc<dyn MediaDevices>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            backend,
            transports,
            media,
            config,
            transition: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Record `err` into the store and hand it back to the caller
    fn fail<T>(&self, err: SessionError) -> SessionResult<T> {
        error!("{}", err);
        self.store.set_error(Some(err.to_string()));
        Err(err)
    }

    /// Ask the backend to create `room_name`. Blank names are ignored.
    pub async fn create_room(&self, room_name: &str) -> SessionResult<()> {
        let room_name = room_name.trim();
        if room_name.is_empty() {
            debug!("create_room called with a blank name, ignoring");
            return Ok(());
        }

        let _creating = self.store.begin(Activity::Creating);
        self.store.set_error(None);

        match self.backend.create_room(room_name).await {
            Ok(()) => Ok(()),
            Err(SessionError::RoomCreationFailed(msg)) => {
                self.fail(SessionError::RoomCreationFailed(msg))
            }
            Err(other) => self.fail(SessionError::RoomCreationFailed(other.to_string())),
        }
    }

    /// Join `room_name` as `participant_name`. Blank names are ignored.
    pub async fn join_room(
        &self,
        room_name: &str,
        participant_name: &str,
        source: CredentialSource,
    ) -> SessionResult<JoinOutcome> {
        let room_name = room_name.trim();
        let participant_name = participant_name.trim();
        if room_name.is_empty() || participant_name.is_empty() {
            debug!("join_room called with a blank name, ignoring");
            return Ok(JoinOutcome::Skipped);
        }
        if let CredentialSource::Provided(token) = &source {
            if token.trim().is_empty() {
                debug!("join_room called with a blank token, ignoring");
                return Ok(JoinOutcome::Skipped);
            }
        }

        let _joining = self.store.begin(Activity::Joining);
        self.store.set_error(None);

        info!("Joining room {} as {}", room_name, participant_name);

        match source {
            CredentialSource::ExistenceCheck => match self.backend.room_exists(room_name).await {
                Ok(true) => Ok(JoinOutcome::RoomExists),
                Ok(false) => self.fail(SessionError::RoomNotFound(room_name.to_string())),
                Err(e) => self.fail(e),
            },
            CredentialSource::Backend => {
                let credential = match self.backend.get_token(room_name, participant_name).await
                {
                    Ok(credential) => credential,
                    Err(e) => return self.fail(e),
                };
                self.join_with_token(&credential.url, &credential.token)
                    .await
                    .map(JoinOutcome::Connected)
            }
            CredentialSource::Provided(token) => {
                let url = self.config.transport_url.clone();
                self.join_with_token(&url, &token)
                    .await
                    .map(JoinOutcome::Connected)
            }
        }
    }

    /// Connect with an explicit credential and make it the live session.
    ///
    /// Any previous session is torn down once the new one is installed.
    pub async fn join_with_token(&self, url: &str, token: &str) -> SessionResult<SessionInfo> {
        let url = url.trim();
        let token = token.trim();
        if url.is_empty() || token.is_empty() {
            return self.fail(SessionError::InvalidCredential);
        }

        let _transition = self.transition.lock().await;
        let _connecting = self.store.begin(Activity::Connecting);
        self.store.set_error(None);

        let mut transport = self.transports.create();
        info!("Connecting to {} via {}", url, transport.name());

        let room = match transport.connect(url, token).await {
            Ok(room) => room,
            Err(e) => return self.fail(SessionError::ConnectionFailed(format!("{:#}", e))),
        };

        let mut streams = Vec::with_capacity(EventKind::ALL.len());
        for kind in EventKind::ALL {
            match transport.subscribe(kind).await {
                Ok(stream) => streams.push((kind, stream)),
                Err(e) => {
                    drop(streams);
                    if let Err(release_err) = transport.disconnect().await {
                        warn!("Failed to release transport after subscribe error: {}", release_err);
                    }
                    return self.fail(SessionError::ConnectionFailed(format!("{:#}", e)));
                }
            }
        }

        let session_id = self.store.next_session_id();
        let mut participants = vec![room.local.clone()];
        participants.extend(room.remote.iter().cloned());

        let session = Session {
            id: session_id,
            room: room.room.clone(),
            local: room.local.clone(),
            participants,
            transcription_active: false,
            recording: false,
            transport: Arc::new(Mutex::new(transport)),
            subscriptions: Vec::new(),
            tracks: Vec::new(),
        };

        if self.store.reset_after_loss() {
            debug!("Discarded state left by a lost session");
        }
        let previous = self.store.replace(session);

        // Listeners start after install so no event is applied to a stale id
        let mut pending: Option<Vec<Subscription>> = Some(
            streams
                .into_iter()
                .map(|(kind, events)| self.listen(session_id, kind, events))
                .collect(),
        );
        let attached = self.store.update(session_id, |session| {
            session.subscriptions = pending.take().unwrap_or_default();
        });
        if attached.is_none() {
            warn!("Session {} ended before its listeners were attached", session_id);
            for subscription in pending.into_iter().flatten() {
                subscription.revoke().await;
            }
        }

        if let Some(previous) = previous {
            info!("Replacing session {} in room {}", previous.id, previous.room);
            teardown(previous).await;
        }

        info!("Connected to room {} as {}", room.room, room.local.identity);

        if self.config.auto_start_transcription {
            if let Err(e) = self.backend.start_transcription(&room.room).await {
                warn!("Failed to start transcription: {}", e);
            }
        }

        self.store.session().ok_or_else(|| {
            SessionError::ConnectionFailed("session closed while connecting".to_string())
        })
    }

    /// Spawn the task applying `events` to session `session_id`
    fn listen(&self, session_id: u64, kind: EventKind, mut events: EventStream) -> Subscription {
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move {
            debug!("Listening for {:?} on session {}", kind, session_id);
            while let Some(event) = events.next().await {
                apply_event(&store, session_id, event);
            }
            debug!("{:?} stream ended for session {}", kind, session_id);
        });
        Subscription { kind, task }
    }

    /// Capture the microphone and publish it. No-op without a session.
    pub async fn start_recording(&self) -> SessionResult<()> {
        let Some((session_id, transport)) = self
            .store
            .update_live(|s| (s.id, Arc::clone(&s.transport)))
        else {
            debug!("start_recording without a session, ignoring");
            return Ok(());
        };

        info!("Requesting microphone from {}", self.media.name());

        let stream = match self.media.get_user_media(AudioConstraints::speech()).await {
            Ok(stream) => stream,
            Err(e) => return self.fail(SessionError::CaptureFailed(format!("{:#}", e))),
        };
        let Some(track) = stream.audio_tracks.into_iter().next() else {
            return self.fail(SessionError::NoAudioDevice);
        };
        let handle = track.handle();

        let published = {
            let transport = transport.lock().await;
            transport.publish_local_audio(track).await
        };
        let mut published = match published {
            Ok(published) => published,
            Err(e) => {
                handle.stop();
                return self.fail(SessionError::PublishFailed(format!("{:#}", e)));
            }
        };

        let sid = published.sid().to_string();
        let mut slot = Some(published);
        let installed = self.store.update(session_id, |session| {
            if let Some(track) = slot.take() {
                session.tracks.push(track);
            }
            session.recording = true;
        });

        if installed.is_none() {
            // Session went away while we were publishing
            if let Some(track) = slot.as_mut() {
                if let Err(e) = track.stop().await {
                    warn!("Failed to stop orphaned track: {}", e);
                }
            }
            return Ok(());
        }

        self.store
            .append(session_id, vec![TranscriptMessage::system(RECORDING_STARTED)]);
        info!("Recording started (track {})", sid);
        Ok(())
    }

    /// Stop every published local track. Never fails; no-op without a session.
    pub async fn stop_recording(&self) {
        let Some((session_id, tracks)) = self.store.update_live(|session| {
            session.recording = false;
            (session.id, std::mem::take(&mut session.tracks))
        }) else {
            debug!("stop_recording without a session, ignoring");
            return;
        };
        self.store
            .append(session_id, vec![TranscriptMessage::system(RECORDING_STOPPED)]);

        for mut track in tracks {
            if let Err(e) = track.stop().await {
                error!("Stop recording error: {}", e);
            }
        }

        info!("Recording stopped");
    }

    /// Leave the room. Idempotent; never fails.
    ///
    /// After a connection loss there is no session left, but the lost
    /// session's transcript, error and status are cleared here.
    pub async fn disconnect(&self) {
        let _transition = self.transition.lock().await;

        let Some(session) = self.store.clear(SessionStatus::Idle) else {
            if self.store.reset_after_loss() {
                info!("Cleared state left by a lost session");
            } else {
                debug!("disconnect without a session, nothing to do");
            }
            return;
        };

        info!("Disconnecting from room {}", session.room);
        teardown(session).await;
        self.store.clear_transcript();
    }

    /// Start the transcription agent for the live room
    pub async fn start_transcription(&self) -> SessionResult<()> {
        let room = self.live_room()?;
        match self.backend.start_transcription(&room).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    /// Stop the transcription agent for the live room
    pub async fn stop_transcription(&self) -> SessionResult<()> {
        let room = self.live_room()?;
        match self.backend.stop_transcription(&room).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail(e),
        }
    }

    /// Fetch the meeting protocol for the live room
    pub async fn protocol(&self) -> SessionResult<serde_json::Value> {
        let room = self.live_room()?;
        match self.backend.protocol(&room).await {
            Ok(protocol) => Ok(protocol),
            Err(e) => self.fail(e),
        }
    }

    fn live_room(&self) -> SessionResult<String> {
        self.store
            .session()
            .map(|s| s.room)
            .ok_or(SessionError::NotConnected)
    }
}

/// Release everything a session holds.
///
/// Listeners are revoked before the transport is released so no event is
/// applied mid-teardown. Errors are logged, never returned.
async fn teardown(mut session: Session) {
    for subscription in session.subscriptions.drain(..) {
        subscription.revoke().await;
    }

    for mut track in session.tracks.drain(..) {
        if let Err(e) = track.stop().await {
            warn!("Failed to stop track {}: {}", track.sid(), e);
        }
    }

    let mut transport = session.transport.lock().await;
    if let Err(e) = transport.disconnect().await {
        warn!("Failed to disconnect transport: {}", e);
    }

    info!("Session {} torn down", session.id);
}

/// Apply one transport event to session `session_id`, if still live
fn apply_event(store: &Arc<SessionStore>, session_id: u64, event: TransportEvent) {
    match event {
        TransportEvent::ParticipantJoined(participant) => {
            if let Some(message) =
                store.update(session_id, |session| participant_joined(session, participant))
            {
                store.append(session_id, vec![message]);
            }
        }
        TransportEvent::ParticipantLeft(participant) => {
            if let Some(message) =
                store.update(session_id, |session| participant_left(session, &participant))
            {
                store.append(session_id, vec![message]);
            }
        }
        TransportEvent::DataReceived { payload, from } => {
            if let Some(messages) =
                store.update(session_id, |session| classify_data(session, &payload, from))
            {
                store.append(session_id, messages);
            }
        }
        TransportEvent::ConnectionLost { reason } => {
            let Some(session) = store.clear_if(session_id, SessionStatus::DisconnectedUnexpectedly)
            else {
                return;
            };
            warn!("Session {} lost its connection: {}", session_id, reason);
            store.set_error(Some(SessionError::ConnectionLost(reason).to_string()));
            // Teardown revokes this very listener, so it runs elsewhere
            tokio::spawn(teardown(session));
        }
    }
}

fn participant_joined(session: &mut Session, participant: Participant) -> TranscriptMessage {
    info!("{} joined the room", participant.identity);
    let message = TranscriptMessage::system(format!("{} joined the room.", participant.identity));
    session.participants.push(participant);
    message
}

fn participant_left(session: &mut Session, participant: &Participant) -> TranscriptMessage {
    info!("{} left the room", participant.identity);
    session
        .participants
        .retain(|p| p.identity != participant.identity);
    TranscriptMessage::system(format!("{} left the room.", participant.identity))
}

/// Turn an inbound data payload into transcript messages.
///
/// The first payload of a session announces the transcription agent.
fn classify_data(
    session: &mut Session,
    payload: &[u8],
    from: Option<String>,
) -> Vec<TranscriptMessage> {
    let text = String::from_utf8_lossy(payload).into_owned();
    let mut messages = Vec::with_capacity(2);

    if !session.transcription_active {
        session.transcription_active = true;
        messages.push(TranscriptMessage::system(AGENT_JOINED));
    }
    messages.push(TranscriptMessage::transcription(text, from));

    messages
}
