//! Which connection belongs to which participant.
//!
//! This is transient: it is rebuilt from handshakes and joins after a
//! restart, and nothing here is ever persisted.

use dashmap::DashMap;
use roomsync_protocol::{RoomId, UserId};
use roomsync_transport::ConnectionId;

/// Where a connection is in the lobby flow.
///
/// ```text
///   Disconnected ──(join)──→ Joining ──→ Active
///        ↑                      │          │
///        └──────(failed)────────┘     (leave / close)
///        ↑                                 │
///        └──────────── Leaving ←───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Authenticated but not in a room.
    Disconnected,
    Joining,
    /// Seated in a room.
    Active,
    Leaving,
}

/// One authenticated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub user: UserId,
    pub room: Option<RoomId>,
    pub phase: ConnectionPhase,
}

#[derive(Debug, Default)]
pub(crate) struct ConnectionRegistry {
    bindings: DashMap<ConnectionId, Binding>,
    /// The live connection of each seated participant.
    seats: DashMap<(RoomId, UserId), ConnectionId>,
}

impl ConnectionRegistry {
    pub(crate) fn register(&self, conn: ConnectionId, user: UserId) {
        self.bindings.insert(
            conn,
            Binding {
                user,
                room: None,
                phase: ConnectionPhase::Disconnected,
            },
        );
    }

    pub(crate) fn binding(&self, conn: ConnectionId) -> Option<Binding> {
        self.bindings.get(&conn).map(|b| *b)
    }

    pub(crate) fn set_phase(&self, conn: ConnectionId, phase: ConnectionPhase) {
        if let Some(mut binding) = self.bindings.get_mut(&conn) {
            binding.phase = phase;
        }
    }

    /// Seats `conn` in `room`. Returns the connection it replaced, if the
    /// participant was seated from somewhere else.
    pub(crate) fn seat(&self, conn: ConnectionId, room: RoomId, user: UserId) -> Option<ConnectionId> {
        self.bindings.insert(
            conn,
            Binding {
                user,
                room: Some(room),
                phase: ConnectionPhase::Active,
            },
        );
        let previous = self
            .seats
            .insert((room, user), conn)
            .filter(|previous| *previous != conn)?;
        if let Some(mut stale) = self.bindings.get_mut(&previous) {
            stale.room = None;
            stale.phase = ConnectionPhase::Disconnected;
        }
        Some(previous)
    }

    /// Clears the participant's seat. Their connection, if any, stays
    /// registered but is no longer in a room.
    pub(crate) fn unseat(&self, room: RoomId, user: UserId) -> Option<ConnectionId> {
        let (_, conn) = self.seats.remove(&(room, user))?;
        if let Some(mut binding) = self.bindings.get_mut(&conn) {
            binding.room = None;
            binding.phase = ConnectionPhase::Disconnected;
        }
        Some(conn)
    }

    pub(crate) fn connection_of(&self, room: RoomId, user: UserId) -> Option<ConnectionId> {
        self.seats.get(&(room, user)).map(|c| *c)
    }

    /// Forgets a closed connection. Its seat is released only if it still
    /// points at this connection; a newer connection keeps its seat.
    pub(crate) fn remove(&self, conn: ConnectionId) -> Option<(Binding, bool)> {
        let (_, binding) = self.bindings.remove(&conn)?;
        let held_seat = binding.room.is_some_and(|room| {
            self.seats
                .remove_if(&(room, binding.user), |_, seated| *seated == conn)
                .is_some()
        });
        Some((binding, held_seat))
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_seat_replaces_older_connection() {
        let registry = ConnectionRegistry::default();
        registry.register(conn(1), UserId(7));
        assert_eq!(registry.seat(conn(1), RoomId(1), UserId(7)), None);
        assert_eq!(registry.seat(conn(2), RoomId(1), UserId(7)), Some(conn(1)));
        assert_eq!(registry.connection_of(RoomId(1), UserId(7)), Some(conn(2)));
    }

    #[test]
    fn test_remove_stale_connection_keeps_newer_seat() {
        let registry = ConnectionRegistry::default();
        registry.seat(conn(1), RoomId(1), UserId(7));
        registry.seat(conn(2), RoomId(1), UserId(7));

        let (binding, held_seat) = registry.remove(conn(1)).unwrap();
        assert_eq!(binding.room, None, "the replaced connection was unseated");
        assert!(!held_seat);
        assert_eq!(registry.connection_of(RoomId(1), UserId(7)), Some(conn(2)));

        let (_, held_seat) = registry.remove(conn(2)).unwrap();
        assert!(held_seat);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_unseat_resets_binding_phase() {
        let registry = ConnectionRegistry::default();
        registry.seat(conn(3), RoomId(2), UserId(1));
        assert_eq!(registry.unseat(RoomId(2), UserId(1)), Some(conn(3)));

        let binding = registry.binding(conn(3)).unwrap();
        assert_eq!(binding.room, None);
        assert_eq!(binding.phase, ConnectionPhase::Disconnected);
    }
}
