use super::messages::{AccessGrant, AudioFrameMessage, ParticipantMessage};
use super::traits::{Transport, TransportFactory};
use super::types::{EventKind, EventStream, Participant, PublishedTrack, RoomInfo, TransportEvent};
use crate::audio::LocalAudioTrack;
use anyhow::{Context, Result};
use async_nats::{Client, ConnectOptions, Event, HeaderMap};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tracing::{error, info, warn};

/// Header carrying the sender identity on data messages
pub const IDENTITY_HEADER: &str = "Participant-Identity";

/// Upper bound for each step of releasing a connection.
///
/// async-nats queues commands while it is reconnecting.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(2);

struct Connection {
    client: Client,
    room: String,
    local: Participant,
}

/// Room transport over NATS subjects
///
/// Subjects:
/// - `room.<room>.participant.joined` / `.left` - presence (JSON)
/// - `room.<room>.data` - inbound data (raw bytes)
/// - `room.<room>.audio.<identity>` - published audio frames (JSON)
pub struct NatsTransport {
    connection: Option<Connection>,
    lost_tx: broadcast::Sender<String>,
}

impl NatsTransport {
    pub fn new() -> Self {
        let (lost_tx, _) = broadcast::channel(4);
        Self {
            connection: None,
            lost_tx,
        }
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().context("NATS transport is not connected")
    }

    async fn announce(connection: &Connection, event: &str) -> Result<()> {
        let subject = format!("room.{}.participant.{}", connection.room, event);
        let message = ParticipantMessage {
            identity: connection.local.identity.clone(),
            name: Some(connection.local.name.clone()),
        };
        let payload = serde_json::to_vec(&message)?;

        connection
            .client
            .publish(subject, payload.into())
            .await
            .context("Failed to publish presence")?;
        Ok(())
    }
}

impl Default for NatsTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for NatsTransport {
    async fn connect(&mut self, url: &str, token: &str) -> Result<RoomInfo> {
        let grant = AccessGrant::from_token(token).context("Malformed access token")?;
        let room = grant.room()?.to_string();
        let local = Participant::new(grant.sub.clone(), grant.name.clone());

        info!("Connecting to NATS at {} (room={}, identity={})", url, room, local.identity);

        let lost_tx = self.lost_tx.clone();
        let client = ConnectOptions::with_token(token.to_string())
            .name(format!("room-scribe-{}", local.identity))
            .event_callback(move |event| {
                let lost_tx = lost_tx.clone();
                async move {
                    match event {
                        Event::Disconnected => {
                            warn!("NATS connection lost");
                            // Nobody listening is fine.
                            let _ = lost_tx.send("connection to transport lost".to_string());
                        }
                        Event::Connected => info!("NATS connection (re)established"),
                        other => info!("NATS event: {}", other),
                    }
                }
            })
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        let connection = Connection {
            client,
            room: room.clone(),
            local: local.clone(),
        };
        Self::announce(&connection, "joined").await?;
        self.connection = Some(connection);

        info!("Connected to NATS room {}", room);

        Ok(RoomInfo {
            room,
            local,
            remote: Vec::new(),
        })
    }

    async fn disconnect(&mut self) -> Result<()> {
        let Some(connection) = self.connection.take() else {
            return Ok(());
        };

        info!("Closing NATS connection for room {}", connection.room);

        let departure = Self::announce(&connection, "left");
        if let Err(e) = bounded(RELEASE_TIMEOUT, "departure announcement", departure).await {
            warn!("Failed to announce departure: {}", e);
        }
        bounded(RELEASE_TIMEOUT, "flush", async {
            connection
                .client
                .flush()
                .await
                .context("Failed to flush NATS connection")
        })
        .await?;

        // async-nats closes the connection once the last client handle drops
        Ok(())
    }

    async fn publish_local_audio(&self, track: LocalAudioTrack) -> Result<PublishedTrack> {
        let connection = self.connection()?;
        let client = connection.client.clone();
        let subject = format!("room.{}.audio.{}", connection.room, connection.local.identity);

        let (handle, mut frames) = track.into_parts();
        let live = handle.clone();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        info!("Publishing track {} to {}", handle.sid(), subject);

        let task = tokio::spawn(async move {
            let mut sequence = 0u32;
            let mut format = (16000, 1);

            loop {
                let frame = tokio::select! {
                    frame = frames.recv() => frame,
                    _ = &mut stop_rx => None,
                };
                let Some(frame) = frame else { break };
                if !live.is_live() {
                    break;
                }

                format = (frame.sample_rate, frame.channels);
                let message = AudioFrameMessage::new(
                    live.sid(),
                    sequence,
                    &frame.samples,
                    frame.sample_rate,
                    frame.channels,
                    false,
                );

                match serde_json::to_vec(&message) {
                    Ok(payload) => {
                        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                            error!("Failed to publish audio frame: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to encode audio frame: {}", e),
                }

                sequence += 1;
            }

            // Final frame marks the end of the track
            let last = AudioFrameMessage::new(live.sid(), sequence, &[], format.0, format.1, true);
            if let Ok(payload) = serde_json::to_vec(&last) {
                if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                    error!("Failed to send final frame: {}", e);
                }
            }

            info!("Track {} unpublished after {} frames", live.sid(), sequence);
        });

        Ok(PublishedTrack::new(handle).with_task(stop_tx, task))
    }

    async fn subscribe(&self, kind: EventKind) -> Result<EventStream> {
        if kind == EventKind::ConnectionLost {
            let rx = self.lost_tx.subscribe();
            let events = stream::unfold(rx, |mut rx| async move {
                loop {
                    match rx.recv().await {
                        Ok(reason) => return Some((TransportEvent::ConnectionLost { reason }, rx)),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            });
            return Ok(events.boxed());
        }

        let connection = self.connection()?;
        let room = &connection.room;
        let subject = match kind {
            EventKind::ParticipantJoined => format!("room.{}.participant.joined", room),
            EventKind::ParticipantLeft => format!("room.{}.participant.left", room),
            _ => format!("room.{}.data", room),
        };

        info!("Subscribing to {}", subject);

        let subscriber = connection
            .client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        let local_identity = connection.local.identity.clone();

        let events = subscriber.filter_map(move |msg| {
            let event = match kind {
                EventKind::DataReceived => Some(TransportEvent::DataReceived {
                    payload: msg.payload.to_vec(),
                    from: sender_identity(msg.headers.as_ref()),
                }),
                _ => match serde_json::from_slice::<ParticipantMessage>(&msg.payload) {
                    Ok(p) if p.identity == local_identity => None,
                    Ok(p) => {
                        let participant = Participant::new(p.identity, p.name);
                        Some(if kind == EventKind::ParticipantJoined {
                            TransportEvent::ParticipantJoined(participant)
                        } else {
                            TransportEvent::ParticipantLeft(participant)
                        })
                    }
                    Err(e) => {
                        warn!("Failed to parse presence message: {}", e);
                        None
                    }
                },
            };
            futures::future::ready(event)
        });

        Ok(events.boxed())
    }

    fn name(&self) -> &str {
        "nats"
    }
}

/// Run `step`, giving up with a warning once `limit` has passed
async fn bounded<F>(limit: Duration, what: &str, step: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result,
        Err(_) => {
            warn!("NATS {} did not finish within {:?}, abandoning it", what, limit);
            Ok(())
        }
    }
}

fn sender_identity(headers: Option<&HeaderMap>) -> Option<String> {
    headers
        .and_then(|h| h.get(IDENTITY_HEADER))
        .map(|v| v.to_string())
        .filter(|identity| !identity.is_empty())
}

/// Hands out a fresh [`NatsTransport`] per connection attempt
#[derive(Debug, Default, Clone, Copy)]
pub struct NatsTransportFactory;

impl TransportFactory for NatsTransportFactory {
    fn create(&self) -> Box<dyn Transport> {
        Box::new(NatsTransport::new())
    }
}
