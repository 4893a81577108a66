//! Fallback calls answered straight from the store.

use std::sync::Arc;

use roomsync_dispatch::{FallbackChannel, FallbackError, FallbackRequest};
use roomsync_protocol::{ReadyState, Room, RoomStatus};
use roomsync_store::{RoomStore, StoreError};

use crate::LobbyError;

/// A [`FallbackChannel`] that executes requests against the room store.
///
/// Every request is idempotent and version-checked. A room that has moved
/// past the version the lost event described is returned untouched, so a
/// late fallback never overwrites a newer change. Otherwise the room is
/// written only if it doesn't already say what the event announced.
pub struct StoreFallback<S> {
    store: Arc<S>,
}

impl<S: RoomStore> StoreFallback<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn execute(&self, request: FallbackRequest) -> Result<Room, StoreError> {
        let room = self.store.get(request.room()).await?;
        match request {
            FallbackRequest::Fetch { .. } => Ok(room),
            FallbackRequest::SetReady { version, .. } | FallbackRequest::FormTeams { version, .. }
                if room.version > version =>
            {
                tracing::debug!(
                    room_id = %room.id,
                    event_version = version,
                    current = room.version,
                    "room moved past the lost event, returning it as-is"
                );
                Ok(room)
            }
            FallbackRequest::SetReady { user, ready, .. } => {
                let wanted = ReadyState::from_bool(ready);
                let current = room.member(user).map(|m| m.ready);
                if current == Some(wanted) {
                    return Ok(room);
                }
                self.store.set_ready(room.id, room.version, user, wanted).await
            }
            FallbackRequest::FormTeams { .. } => {
                if room.teams().is_some() {
                    return Ok(room);
                }
                self.store.assign_teams(room.id, room.version).await
            }
            // Starting needs the bot and game collaborators, so this only
            // confirms a start that already happened.
            FallbackRequest::Start { .. } => match room.status {
                RoomStatus::Starting | RoomStatus::Playing => Ok(room),
                status => Err(StoreError::IllegalTransition {
                    from: status,
                    to: RoomStatus::Playing,
                }),
            },
        }
    }
}

impl<S: RoomStore> FallbackChannel for StoreFallback<S> {
    async fn call(&self, request: FallbackRequest) -> Result<Room, FallbackError> {
        tracing::debug!(method = request.method(), path = %request.path(), "fallback call");
        self.execute(request).await.map_err(|e| {
            let err = LobbyError::from(e);
            FallbackError::Rejected {
                status: err.code(),
                message: err.to_string(),
            }
        })
    }
}
