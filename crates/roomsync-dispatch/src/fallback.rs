//! The request/response path used when push delivery gives up.

use std::future::Future;
use std::sync::Arc;

use roomsync_protocol::{Envelope, Room, RoomId, ServerEvent, UserId};

use crate::FallbackError;

/// A call against the room's request/response endpoints.
///
/// Each one is idempotent and answers with the authoritative room. Writes
/// carry the room version the lost event described; a room that has moved
/// past it is returned as-is instead of being written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackRequest {
    /// `POST /rooms/{id}/ready`
    SetReady {
        room: RoomId,
        user: UserId,
        ready: bool,
        version: u64,
    },
    /// `POST /rooms/{id}/form-teams`
    FormTeams { room: RoomId, version: u64 },
    /// `POST /rooms/{id}/start`
    Start { room: RoomId },
    /// `GET /rooms/{id}`
    Fetch { room: RoomId },
}

impl FallbackRequest {
    /// Chooses the call that re-establishes what `envelope` announced.
    pub fn for_envelope(envelope: &Envelope) -> Self {
        let room = envelope.room_id;
        let version = envelope.room_version;
        match &envelope.event {
            ServerEvent::ReadyChanged {
                player_id,
                is_ready,
                ..
            } => Self::SetReady {
                room,
                user: *player_id,
                ready: *is_ready,
                version,
            },
            ServerEvent::TeamsFormed { .. } => Self::FormTeams { room, version },
            ServerEvent::GameStarting { .. } => Self::Start { room },
            _ => Self::Fetch { room },
        }
    }

    pub fn room(&self) -> RoomId {
        match self {
            Self::SetReady { room, .. }
            | Self::FormTeams { room, .. }
            | Self::Start { room }
            | Self::Fetch { room } => *room,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "GET",
            _ => "POST",
        }
    }

    pub fn path(&self) -> String {
        let id = self.room().0;
        match self {
            Self::SetReady { .. } => format!("/rooms/{id}/ready"),
            Self::FormTeams { .. } => format!("/rooms/{id}/form-teams"),
            Self::Start { .. } => format!("/rooms/{id}/start"),
            Self::Fetch { .. } => format!("/rooms/{id}"),
        }
    }
}

/// Executes fallback requests.
pub trait FallbackChannel: Send + Sync + 'static {
    fn call(
        &self,
        request: FallbackRequest,
    ) -> impl Future<Output = Result<Room, FallbackError>> + Send;
}

impl<F: FallbackChannel> FallbackChannel for Arc<F> {
    fn call(
        &self,
        request: FallbackRequest,
    ) -> impl Future<Output = Result<Room, FallbackError>> + Send {
        F::call(self, request)
    }
}
