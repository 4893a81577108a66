//! Where events go and what carries them there.

use std::fmt;
use std::future::Future;

use roomsync_protocol::{Envelope, RoomId};
use roomsync_transport::{ConnectionId, TransportError};

/// Recipient of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// Every connection subscribed to the room.
    Room(RoomId),
    /// One connection.
    Connection(ConnectionId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(id) => write!(f, "room {id}"),
            Self::Connection(id) => write!(f, "{id}"),
        }
    }
}

/// Pushes envelopes to clients.
///
/// A send returning `Ok` means the frame was handed to every live
/// recipient, not that anyone has processed it.
pub trait EventTransport: Send + Sync + 'static {
    /// Sends to every connection subscribed to `room`.
    fn send_to_room(
        &self,
        room: RoomId,
        envelope: &Envelope,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends to one connection.
    fn send_to_connection(
        &self,
        conn: ConnectionId,
        envelope: &Envelope,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Adds `conn` to the room's broadcast set.
    fn subscribe(&self, room: RoomId, conn: ConnectionId);

    /// Removes `conn` from the room's broadcast set.
    fn unsubscribe(&self, room: RoomId, conn: ConnectionId);

    /// Routes to the right send for `target`.
    fn send(
        &self,
        target: Target,
        envelope: &Envelope,
    ) -> impl Future<Output = Result<(), TransportError>> + Send {
        async move {
            match target {
                Target::Room(room) => self.send_to_room(room, envelope).await,
                Target::Connection(conn) => self.send_to_connection(conn, envelope).await,
            }
        }
    }
}
