//! In-process store engine.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use roomsync_protocol::{Room, RoomId};

use crate::{RoomStore, StoreConfig, StoreError};

/// A [`RoomStore`] over a concurrent map.
///
/// The conditional write runs under the map's per-shard lock, which is
/// held only for the version comparison and the swap, never across an
/// await.
pub struct MemoryRoomStore {
    rooms: DashMap<RoomId, Room>,
    next_id: AtomicU64,
    config: StoreConfig,
}

impl MemoryRoomStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            rooms: DashMap::new(),
            next_id: AtomicU64::new(1),
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of stored rooms, in any status.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

impl Default for MemoryRoomStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl RoomStore for MemoryRoomStore {
    fn allocate_id(&self) -> RoomId {
        RoomId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn accepts_capacity(&self, capacity: usize) -> bool {
        self.config.accepts(capacity)
    }

    async fn create(&self, room: Room) -> Result<Room, StoreError> {
        if !self.config.accepts(room.capacity) {
            return Err(StoreError::Invalid(format!(
                "capacity must be between {} and {}, got {}",
                self.config.min_capacity, self.config.max_capacity, room.capacity
            )));
        }
        if room.version != 1 {
            return Err(StoreError::Invalid(format!(
                "new rooms start at version 1, got {}",
                room.version
            )));
        }
        match self.rooms.entry(room.id) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(room.id)),
            Entry::Vacant(slot) => {
                slot.insert(room.clone());
                tracing::info!(room_id = %room.id, capacity = room.capacity, "room created");
                Ok(room)
            }
        }
    }

    async fn get(&self, id: RoomId) -> Result<Room, StoreError> {
        self.rooms
            .get(&id)
            .map(|room| room.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn compare_and_swap(&self, expected: u64, room: Room) -> Result<Room, StoreError> {
        if room.version <= expected {
            return Err(StoreError::Invalid(format!(
                "write at version {} does not supersede {expected}",
                room.version
            )));
        }
        let mut stored = self.rooms.get_mut(&room.id).ok_or(StoreError::NotFound(room.id))?;
        if stored.version != expected {
            return Err(StoreError::VersionConflict {
                expected,
                current: Box::new(stored.clone()),
            });
        }
        *stored = room.clone();
        Ok(room)
    }
}
