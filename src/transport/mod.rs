//! Room transport abstraction
//!
//! A transport connects to a room, publishes local audio and delivers room
//! events as streams. `NatsTransport` is the shipped implementation.

pub mod messages;
mod nats;
mod traits;
mod types;

pub use messages::{AccessGrant, AudioFrameMessage, ParticipantMessage, VideoGrant};
pub use nats::{NatsTransport, NatsTransportFactory, IDENTITY_HEADER};
pub use traits::{Transport, TransportFactory};
pub use types::{
    EventKind, EventStream, Participant, PublishedTrack, RoomInfo, TransportEvent,
};
