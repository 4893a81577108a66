//! Error types for the store layer.

use roomsync_protocol::{Room, RoomId, RoomStatus, UserId};
use roomsync_resolve::ResolveError;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A room with this id already exists.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    /// The write was based on a stale copy. Carries the document as it is
    /// now so the caller can decide whether to retry.
    #[error("room {} is at version {}, expected {expected}", .current.id, .current.version)]
    VersionConflict { expected: u64, current: Box<Room> },

    /// No more player slots.
    #[error("room {room} is full ({capacity} players)")]
    RoomFull { room: RoomId, capacity: usize },

    /// The user is already a member.
    #[error("user {user} already in room {room}")]
    AlreadyMember { room: RoomId, user: UserId },

    /// The user is not a member.
    #[error("user {user} not in room {room}")]
    MemberNotFound { room: RoomId, user: UserId },

    /// The operation needs the room to be waiting for players.
    #[error("room {room} is {status}, not waiting")]
    NotWaiting { room: RoomId, status: RoomStatus },

    /// The lifecycle edge does not exist.
    #[error("room cannot move from {from} to {to}")]
    IllegalTransition { from: RoomStatus, to: RoomStatus },

    /// Input rejected before touching the document.
    #[error("invalid: {0}")]
    Invalid(String),

    /// Reconciliation could not merge the two copies.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
