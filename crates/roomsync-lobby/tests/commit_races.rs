//! Writes that lose a version race to an equivalent or contradicting write.
//!
//! The store below lets a test slip one rival write in just before the
//! coordinator's own conditional write lands.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roomsync_dispatch::{DispatchConfig, Dispatcher, EventTransport};
use roomsync_lobby::{LobbyConfig, LobbyCoordinator, RedirectGames, SequentialBots, StoreFallback};
use roomsync_protocol::{
    ConnectionState, Envelope, EventKind, ReadyState, Room, RoomId, RoomSettings, UserId,
};
use roomsync_store::{MemoryRoomStore, RoomStore, StoreError, mutations};
use roomsync_transport::{ConnectionId, TransportError};

type Rival = Box<dyn FnOnce(&mut Room) + Send>;

/// A memory store that commits an armed rival write right before the next
/// conditional write.
#[derive(Default)]
struct RacingStore {
    inner: MemoryRoomStore,
    rival: Mutex<Option<Rival>>,
}

impl RacingStore {
    fn arm(&self, rival: impl FnOnce(&mut Room) + Send + 'static) {
        *self.rival.lock().unwrap() = Some(Box::new(rival));
    }
}

impl RoomStore for RacingStore {
    fn allocate_id(&self) -> RoomId {
        self.inner.allocate_id()
    }

    async fn create(&self, room: Room) -> Result<Room, StoreError> {
        self.inner.create(room).await
    }

    async fn get(&self, id: RoomId) -> Result<Room, StoreError> {
        self.inner.get(id).await
    }

    async fn compare_and_swap(&self, expected: u64, room: Room) -> Result<Room, StoreError> {
        let rival = self.rival.lock().unwrap().take();
        if let Some(rival) = rival {
            let mut winner = self.inner.get(room.id).await?;
            let base = winner.version;
            rival(&mut winner);
            winner.version = base + 1;
            self.inner.compare_and_swap(base, winner).await?;
        }
        self.inner.compare_and_swap(expected, room).await
    }
}

/// Counts room broadcasts by kind.
#[derive(Default)]
struct Tally {
    sent: Mutex<HashMap<EventKind, usize>>,
}

impl Tally {
    fn count(&self, kind: EventKind) -> usize {
        self.sent.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }
}

impl EventTransport for Tally {
    async fn send_to_room(&self, _room: RoomId, envelope: &Envelope) -> Result<(), TransportError> {
        *self.sent.lock().unwrap().entry(envelope.kind()).or_default() += 1;
        Ok(())
    }

    async fn send_to_connection(
        &self,
        _conn: ConnectionId,
        _envelope: &Envelope,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    fn subscribe(&self, _room: RoomId, _conn: ConnectionId) {}

    fn unsubscribe(&self, _room: RoomId, _conn: ConnectionId) {}
}

struct Harness {
    lobby: LobbyCoordinator<RacingStore, Tally, SequentialBots, RedirectGames>,
    tally: Arc<Tally>,
    store: Arc<RacingStore>,
}

const ANA: UserId = UserId(1);
const BEN: UserId = UserId(2);

/// Ana hosts, Ben joins.
async fn harness() -> (Harness, RoomId) {
    let store = Arc::new(RacingStore::default());
    let tally = Arc::new(Tally::default());
    let dispatcher = Dispatcher::new(
        DispatchConfig::default(),
        Arc::clone(&tally),
        StoreFallback::new(Arc::clone(&store)),
    );
    let lobby = LobbyCoordinator::new(
        LobbyConfig::default(),
        Arc::clone(&store),
        dispatcher,
        SequentialBots::new(),
        RedirectGames::default(),
    );
    let room = lobby
        .create_room(ConnectionId::new(1), ANA, "table", 4, RoomSettings::default(), "ana")
        .await
        .unwrap();
    lobby
        .join(ConnectionId::new(2), room.id, BEN, "ben")
        .await
        .unwrap();
    (Harness { lobby, tally, store }, room.id)
}

#[tokio::test(start_paused = true)]
async fn test_set_ready_identical_write_wins_race_no_second_commit() {
    let (h, room) = harness().await;
    let before = h.store.get(room).await.unwrap();
    h.store.arm(|r| mutations::set_ready(r, BEN, ReadyState::Ready).unwrap());

    let after = h.lobby.set_ready(room, BEN, true).await.unwrap();

    assert!(after.member(BEN).unwrap().ready.is_ready());
    assert_eq!(after.version, before.version + 1);
    assert_eq!(h.store.get(room).await.unwrap().version, before.version + 1);
    assert_eq!(h.tally.count(EventKind::ReadyChanged), 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_ready_race_with_other_member_still_applies() {
    let (h, room) = harness().await;
    let before = h.store.get(room).await.unwrap();
    h.store.arm(|r| mutations::set_ready(r, ANA, ReadyState::Ready).unwrap());

    let after = h.lobby.set_ready(room, BEN, true).await.unwrap();

    assert!(after.member(ANA).unwrap().ready.is_ready());
    assert!(after.member(BEN).unwrap().ready.is_ready());
    assert_eq!(after.version, before.version + 2);
    assert_eq!(h.tally.count(EventKind::ReadyChanged), 1);
}

#[tokio::test(start_paused = true)]
async fn test_expire_grace_member_reconnected_mid_removal_keeps_seat() {
    let (h, room) = harness().await;
    h.lobby.disconnect(room, BEN).await.unwrap();
    let away = h.store.get(room).await.unwrap();
    h.store.arm(|r| {
        mutations::set_connection(r, BEN, ConnectionState::Connected).unwrap();
    });

    tokio::time::sleep(Duration::from_secs(121)).await;

    let stored = h.store.get(room).await.unwrap();
    assert!(stored.member(BEN).unwrap().is_connected());
    assert_eq!(stored.version, away.version + 1);
    assert_eq!(h.tally.count(EventKind::PlayerLeft), 0);
    assert!(!h.lobby.has_grace_timer(room, BEN));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_race_with_same_notice_no_duplicate_broadcast() {
    let (h, room) = harness().await;
    h.store.arm(|r| {
        mutations::set_connection(r, BEN, ConnectionState::Disconnected).unwrap();
    });

    let after = h.lobby.disconnect(room, BEN).await.unwrap();

    assert!(!after.member(BEN).unwrap().is_connected());
    assert_eq!(h.tally.count(EventKind::PlayerDisconnected), 0);
    assert!(!h.lobby.has_grace_timer(room, BEN));
}
