//! Wire protocol and shared documents for roomsync.
//!
//! This crate defines the "language" that clients and the coordinator
//! speak, plus the room document every other layer reads and writes:
//!
//! - **Identity** ([`UserId`], [`RoomId`], [`EventId`]) — transparent
//!   newtypes that serialize as plain numbers.
//! - **Room document** ([`Room`], [`Membership`], [`RoomStatus`], ...) —
//!   the versioned lobby document owned by the store.
//! - **Messages** ([`ClientMessage`], [`ServerMessage`], [`ServerEvent`],
//!   [`Envelope`]) — what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//!
//! # Architecture
//!
//! The protocol layer doesn't know about connections, stores or retries.
//! It only knows what the data looks like.
//!
//! ```text
//! Transport (bytes) → Protocol (messages, documents) → Store / Dispatch / Lobby
//! ```

mod codec;
mod error;
mod room;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use room::{
    ConnectionState, MAX_CAPACITY, MIN_CAPACITY, Membership, ReadyState, Room,
    RoomSettings, RoomStatus, StartEligibility, Team, TeamPartition,
};
pub use types::{
    ClientMessage, Envelope, EventId, EventKind, RoomId, ServerEvent,
    ServerMessage, UserId,
};
