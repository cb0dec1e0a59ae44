use super::transcript::{TranscriptBuffer, TranscriptMessage};
use crate::transport::{EventKind, Participant, PublishedTrack, Transport};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::debug;

/// Lifecycle state of the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Connected,
    /// The transport dropped without a `disconnect()` call
    DisconnectedUnexpectedly,
}

/// Flags observed by UI consumers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionFlags {
    pub creating: bool,
    pub joining: bool,
    pub connecting: bool,
    pub connected: bool,
    pub recording: bool,
    pub transcription_active: bool,
    pub error: Option<String>,
    pub status: SessionStatus,
    pub room: Option<String>,
}

/// Public description of the live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub session_id: u64,
    pub room: String,
    pub local: Participant,
    pub participants: Vec<Participant>,
}

/// Flags raised for the duration of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activity {
    Creating,
    Joining,
    Connecting,
}

/// Listener task bound to one event subscription
#[derive(Debug)]
pub(crate) struct Subscription {
    pub kind: EventKind,
    pub task: JoinHandle<()>,
}

impl Subscription {
    /// Abort the listener and wait until it can no longer run
    pub async fn revoke(self) {
        self.task.abort();
        // Cancelled is the expected outcome
        let _ = self.task.await;
        debug!("Revoked {:?} subscription", self.kind);
    }
}

/// One connected room membership
pub(crate) struct Session {
    pub id: u64,
    pub room: String,
    pub local: Participant,
    pub participants: Vec<Participant>,
    pub transcription_active: bool,
    pub recording: bool,
    pub transport: Arc<tokio::sync::Mutex<Box<dyn Transport>>>,
    pub subscriptions: Vec<Subscription>,
    pub tracks: Vec<PublishedTrack>,
}

impl Session {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id,
            room: self.room.clone(),
            local: self.local.clone(),
            participants: self.participants.clone(),
        }
    }
}

#[derive(Default)]
struct StoreInner {
    session: Option<Session>,
    transcript: TranscriptBuffer,
    creating: bool,
    joining: bool,
    connecting: bool,
    error: Option<String>,
    status: SessionStatus,
}

impl StoreInner {
    fn flags(&self) -> SessionFlags {
        let session = self.session.as_ref();
        SessionFlags {
            creating: self.creating,
            joining: self.joining,
            connecting: self.connecting,
            connected: session.is_some(),
            recording: session.map(|s| s.recording).unwrap_or(false),
            transcription_active: session.map(|s| s.transcription_active).unwrap_or(false),
            error: self.error.clone(),
            status: self.status,
            room: session.map(|s| s.room.clone()),
        }
    }
}

/// Holds the single live session and everything UI layers observe
///
/// The store does no I/O. Only the session manager mutates it; everyone
/// else reads snapshots or subscribes to changes. The lock is never held
/// across an await point.
pub struct SessionStore {
    inner: Mutex<StoreInner>,
    next_id: AtomicU64,
    flags_tx: watch::Sender<SessionFlags>,
    transcript_tx: broadcast::Sender<TranscriptMessage>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (flags_tx, _) = watch::channel(SessionFlags::default());
        let (transcript_tx, _) = broadcast::channel(256);

        Self {
            inner: Mutex::new(StoreInner::default()),
            next_id: AtomicU64::new(1),
            flags_tx,
            transcript_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &StoreInner) {
        self.flags_tx.send_replace(inner.flags());
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    pub fn flags(&self) -> SessionFlags {
        self.lock().flags()
    }

    /// Receiver that sees every flag change
    pub fn watch(&self) -> watch::Receiver<SessionFlags> {
        self.flags_tx.subscribe()
    }

    /// Receiver that sees every appended transcript message
    pub fn subscribe_transcript(&self) -> broadcast::Receiver<TranscriptMessage> {
        self.transcript_tx.subscribe()
    }

    pub fn transcript(&self) -> Vec<TranscriptMessage> {
        self.lock().transcript.messages().to_vec()
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.participants.clone())
            .unwrap_or_default()
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.lock().session.as_ref().map(Session::info)
    }

    pub fn is_live(&self) -> bool {
        self.lock().session.is_some()
    }

    // ------------------------------------------------------------------
    // Write side (session manager only)
    // ------------------------------------------------------------------

    pub(crate) fn next_session_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn set_activity(&self, activity: Activity, on: bool) {
        let mut inner = self.lock();
        match activity {
            Activity::Creating => inner.creating = on,
            Activity::Joining => inner.joining = on,
            Activity::Connecting => inner.connecting = on,
        }
        self.publish(&inner);
    }

    /// Raise `activity` until the returned guard drops
    pub(crate) fn begin(&self, activity: Activity) -> ActivityGuard<'_> {
        self.set_activity(activity, true);
        ActivityGuard {
            store: self,
            activity,
        }
    }

    pub(crate) fn set_error(&self, error: Option<String>) {
        let mut inner = self.lock();
        inner.error = error;
        self.publish(&inner);
    }

    /// Install `session` as the live one, returning whatever it replaced
    pub(crate) fn replace(&self, session: Session) -> Option<Session> {
        let mut inner = self.lock();
        let previous = inner.session.replace(session);
        inner.status = SessionStatus::Connected;
        self.publish(&inner);
        previous
    }

    /// Remove the live session (if any) and record why
    pub(crate) fn clear(&self, status: SessionStatus) -> Option<Session> {
        let mut inner = self.lock();
        let session = inner.session.take();
        if session.is_some() {
            inner.status = status;
            self.publish(&inner);
        }
        session
    }

    /// Remove the session only if `id` is still the live one
    pub(crate) fn clear_if(&self, id: u64, status: SessionStatus) -> Option<Session> {
        let mut inner = self.lock();
        if inner.session.as_ref().map(|s| s.id) != Some(id) {
            return None;
        }
        let session = inner.session.take();
        inner.status = status;
        self.publish(&inner);
        session
    }

    pub(crate) fn clear_transcript(&self) {
        let mut inner = self.lock();
        inner.transcript.clear();
        self.publish(&inner);
    }

    /// Forget what a lost session left behind.
    ///
    /// Only acts when no session is live and the last one ended with a
    /// connection loss. Returns whether anything was reset.
    pub(crate) fn reset_after_loss(&self) -> bool {
        let mut inner = self.lock();
        if inner.session.is_some() || inner.status != SessionStatus::DisconnectedUnexpectedly {
            return false;
        }
        inner.transcript.clear();
        inner.status = SessionStatus::Idle;
        inner.error = None;
        self.publish(&inner);
        true
    }

    /// Run `f` against the session `id` if it is still live
    pub(crate) fn update<R>(&self, id: u64, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut inner = self.lock();
        let session = inner.session.as_mut().filter(|s| s.id == id)?;
        let result = f(session);
        self.publish(&inner);
        Some(result)
    }

    /// Like [`update`](Self::update) for whichever session is live
    pub(crate) fn update_live<R>(&self, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let mut inner = self.lock();
        let session = inner.session.as_mut()?;
        let result = f(session);
        self.publish(&inner);
        Some(result)
    }

    /// Append `messages` in order while session `id` is still live
    pub(crate) fn append(&self, id: u64, messages: Vec<TranscriptMessage>) -> bool {
        let mut inner = self.lock();
        if inner.session.as_ref().map(|s| s.id) != Some(id) {
            return false;
        }
        for message in messages {
            inner.transcript.push(message.clone());
            // No receivers is fine
            let _ = self.transcript_tx.send(message);
        }
        true
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowers its activity flag on drop, whatever the exit path
pub(crate) struct ActivityGuard<'a> {
    store: &'a SessionStore,
    activity: Activity,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.store.set_activity(self.activity, false);
    }
}
