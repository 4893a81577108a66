//! The storage contract.

use std::future::Future;

use chrono::Utc;
use roomsync_protocol::{
    ConnectionState, MAX_CAPACITY, MIN_CAPACITY, Membership, ReadyState, Room, RoomId, RoomStatus,
    UserId,
};
use roomsync_resolve::merge_room;

use crate::{StoreError, mutations, teams};

/// Canonical room documents with version-checked writes.
///
/// An engine supplies four primitives: id allocation, `create`, `get` and a
/// single conditional write, [`compare_and_swap`](Self::compare_and_swap).
/// Everything else is built on those and comes for free.
///
/// Writes never lock: two callers that read the same version race on the
/// conditional write, one wins, and the other gets
/// [`StoreError::VersionConflict`] carrying the winner's document. The
/// store itself never retries.
pub trait RoomStore: Send + Sync + 'static {
    /// Reserves a fresh room id.
    fn allocate_id(&self) -> RoomId;

    /// Whether [`create`](Self::create) would take a room of this size.
    /// Engines with narrower limits than the protocol's override it.
    fn accepts_capacity(&self, capacity: usize) -> bool {
        (MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity)
    }

    /// Inserts a new room. It must be at version 1 with a capacity the
    /// store accepts.
    fn create(&self, room: Room) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Returns the current document.
    fn get(&self, id: RoomId) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Replaces the stored document with `room` if, and only if, the stored
    /// version still equals `expected`. `room.version` must be greater
    /// than `expected`.
    fn compare_and_swap(
        &self,
        expected: u64,
        room: Room,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send;

    /// Applies `mutate` to a copy of the room at `expected` and commits it
    /// as version `expected + 1`.
    ///
    /// # Errors
    /// - `VersionConflict` if the stored version isn't `expected`, either
    ///   up front or by the time the write lands
    /// - whatever `mutate` returns; a rejected mutation commits nothing
    fn apply_mutation<F>(
        &self,
        id: RoomId,
        expected: u64,
        mutate: F,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send
    where
        F: FnOnce(&mut Room) -> Result<(), StoreError> + Send,
    {
        async move {
            let mut room = self.get(id).await?;
            if room.version != expected {
                return Err(StoreError::VersionConflict {
                    expected,
                    current: Box::new(room),
                });
            }
            mutate(&mut room)?;
            room.version = expected + 1;
            room.updated_at = Utc::now();
            let committed = self.compare_and_swap(expected, room).await?;
            tracing::debug!(room_id = %id, version = committed.version, "room committed");
            Ok(committed)
        }
    }

    fn add_member(
        &self,
        id: RoomId,
        expected: u64,
        member: Membership,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send {
        self.apply_mutation(id, expected, move |room| mutations::add_member(room, member))
    }

    fn remove_member(
        &self,
        id: RoomId,
        expected: u64,
        user: UserId,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send {
        self.apply_mutation(id, expected, move |room| {
            mutations::remove_member(room, user, Utc::now()).map(drop)
        })
    }

    fn set_ready(
        &self,
        id: RoomId,
        expected: u64,
        user: UserId,
        ready: ReadyState,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send {
        self.apply_mutation(id, expected, move |room| mutations::set_ready(room, user, ready))
    }

    fn set_connection(
        &self,
        id: RoomId,
        expected: u64,
        user: UserId,
        state: ConnectionState,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send {
        self.apply_mutation(id, expected, move |room| {
            mutations::set_connection(room, user, state)
        })
    }

    /// Shuffles the connected members into two teams. Calling it again
    /// reshuffles.
    fn assign_teams(
        &self,
        id: RoomId,
        expected: u64,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send {
        self.apply_mutation(id, expected, |room| {
            teams::assign_teams(room, &mut rand::rng()).map(drop)
        })
    }

    fn clear_teams(
        &self,
        id: RoomId,
        expected: u64,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send {
        self.apply_mutation(id, expected, |room| {
            mutations::clear_teams(room);
            Ok(())
        })
    }

    fn set_status(
        &self,
        id: RoomId,
        expected: u64,
        status: RoomStatus,
    ) -> impl Future<Output = Result<Room, StoreError>> + Send {
        self.apply_mutation(id, expected, move |room| {
            mutations::set_status(room, status, Utc::now())
        })
    }

    /// Folds a secondary copy of a room into the canonical one.
    ///
    /// The merge is written conditionally against the version it was
    /// computed from, so a concurrent writer surfaces as a conflict rather
    /// than being overwritten.
    ///
    /// The merged document is stamped `max(local, remote) + 1`, so when the
    /// remote copy ran ahead the stored version jumps by more than one.
    /// Callers tracking versions should compare with `>` rather than expect
    /// consecutive numbers.
    fn reconcile(&self, remote: Room) -> impl Future<Output = Result<Room, StoreError>> + Send {
        async move {
            let current = self.get(remote.id).await?;
            let merged = merge_room(&current, &remote)?;
            let committed = self.compare_and_swap(current.version, merged).await?;
            tracing::info!(
                room_id = %committed.id,
                local_version = current.version,
                remote_version = remote.version,
                version = committed.version,
                "room reconciled"
            );
            Ok(committed)
        }
    }
}
