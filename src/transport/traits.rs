use super::types::{EventKind, EventStream, PublishedTrack, RoomInfo};
use crate::audio::LocalAudioTrack;
use anyhow::Result;

/// Real-time room transport
///
/// Any implementation of this contract can back a session. One instance
/// serves exactly one connection; a new session gets a new instance from a
/// [`TransportFactory`].
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the room granted by `token`
    async fn connect(&mut self, url: &str, token: &str) -> Result<RoomInfo>;

    /// Leave the room and release the connection
    async fn disconnect(&mut self) -> Result<()>;

    /// Publish a local audio track to the room
    async fn publish_local_audio(&self, track: LocalAudioTrack) -> Result<PublishedTrack>;

    /// Subscribe to one kind of room event.
    ///
    /// Dropping the returned stream revokes the subscription.
    async fn subscribe(&self, kind: EventKind) -> Result<EventStream>;

    /// Transport name for logging
    fn name(&self) -> &str;
}

/// Creates a fresh, unconnected transport per connection attempt
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn Transport>;
}
