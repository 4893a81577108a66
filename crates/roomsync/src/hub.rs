//! Live connections and room subscriptions, as seen by the dispatcher.

use std::sync::Arc;

use dashmap::DashMap;
use roomsync_dispatch::EventTransport;
use roomsync_protocol::{Codec, Envelope, JsonCodec, RoomId, ServerMessage};
use roomsync_transport::{Connection, ConnectionId, TransportError, WebSocketConnection};

/// Fans event envelopes out to connected clients.
///
/// Connections are attached by their handler task after the handshake and
/// detached when the task ends. Room subscriptions are driven by the lobby
/// coordinator through [`EventTransport::subscribe`].
pub struct ConnectionHub<C = WebSocketConnection> {
    connections: DashMap<ConnectionId, Arc<C>>,
    rooms: DashMap<RoomId, Vec<ConnectionId>>,
    codec: JsonCodec,
}

impl<C: Connection> ConnectionHub<C> {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            codec: JsonCodec,
        }
    }

    pub fn attach(&self, conn: Arc<C>) {
        self.connections.insert(conn.id(), conn);
    }

    /// Forgets a connection and drops it from every room it was in.
    pub fn detach(&self, id: ConnectionId) -> Option<Arc<C>> {
        self.rooms.retain(|_, subscribers| {
            subscribers.retain(|c| *c != id);
            !subscribers.is_empty()
        });
        self.connections.remove(&id).map(|(_, conn)| conn)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn subscribers(&self, room: RoomId) -> Vec<ConnectionId> {
        self.rooms.get(&room).map(|s| s.clone()).unwrap_or_default()
    }

    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, TransportError> {
        self.codec
            .encode(&ServerMessage::Event(envelope.clone()))
            .map_err(|e| TransportError::Encode(e.to_string()))
    }

    fn live(&self, id: ConnectionId) -> Option<Arc<C>> {
        self.connections.get(&id).map(|c| Arc::clone(&c))
    }
}

impl<C: Connection> Default for ConnectionHub<C> {
    fn default() -> Self {
        Self::new()
    }
}

async fn push<C: Connection>(conn: &C, frame: &[u8]) -> Result<(), TransportError> {
    conn.send(frame).await.map_err(|e| {
        TransportError::SendFailed(std::io::Error::other(format!("{}: {e}", conn.id())))
    })
}

impl<C: Connection> EventTransport for ConnectionHub<C> {
    /// Sends to every subscriber. One failed recipient fails the whole send
    /// so the dispatcher retries; clients drop repeats by event id.
    async fn send_to_room(&self, room: RoomId, envelope: &Envelope) -> Result<(), TransportError> {
        let frame = self.encode(envelope)?;
        let recipients: Vec<Arc<C>> = self
            .subscribers(room)
            .into_iter()
            .filter_map(|id| self.live(id))
            .collect();

        let mut first_failure = None;
        for conn in &recipients {
            if let Err(e) = push(conn.as_ref(), &frame).await {
                tracing::debug!(room_id = %room, event_id = %envelope.event_id, error = %e, "room send failed");
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn send_to_connection(
        &self,
        conn: ConnectionId,
        envelope: &Envelope,
    ) -> Result<(), TransportError> {
        let frame = self.encode(envelope)?;
        let target = self
            .live(conn)
            .ok_or_else(|| TransportError::ConnectionClosed(format!("{conn} is not connected")))?;
        push(target.as_ref(), &frame).await
    }

    fn subscribe(&self, room: RoomId, conn: ConnectionId) {
        let mut subscribers = self.rooms.entry(room).or_default();
        if !subscribers.contains(&conn) {
            subscribers.push(conn);
        }
    }

    fn unsubscribe(&self, room: RoomId, conn: ConnectionId) {
        self.rooms.remove_if_mut(&room, |_, subscribers| {
            subscribers.retain(|c| *c != conn);
            subscribers.is_empty()
        });
    }
}
