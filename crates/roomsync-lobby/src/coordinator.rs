//! The lobby coordinator: validates requests, commits them through the
//! store and broadcasts what changed.
//!
//! Every write follows the same shape:
//!
//! ```text
//! read room ─→ validate against it ─→ apply_mutation(expected = read version)
//!                                        │ ok                    │ conflict
//!                                        ▼                       ▼
//!                              dispatch event to room   re-validate against the
//!                                                       winner and retry once
//!                                                       (idempotent ops), or
//!                                                       surface to caller
//! ```
//!
//! A retry that finds the write already made by someone else commits
//! nothing and broadcasts nothing.
//!
//! Nothing holds a lock across an await. Two requests racing on the same
//! room are serialized by the store's conditional write, and the `Starting`
//! status keeps a second start request out while the first is still
//! talking to the bot and game factories.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use roomsync_dispatch::{Dispatcher, EventTransport, Outbound};
use roomsync_protocol::{
    ConnectionState, Membership, ReadyState, Room, RoomId, RoomSettings, RoomStatus,
    ServerEvent, StartEligibility, UserId,
};
use roomsync_store::{RoomStore, StoreError, mutations};
use roomsync_transport::ConnectionId;
use tokio::task::AbortHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::connections::{Binding, ConnectionPhase, ConnectionRegistry};
use crate::{
    BotFactory, CollaboratorError, GameFactory, LobbyConfig, LobbyError, RedirectGames,
    SequentialBots, StoreFallback,
};

/// The dispatcher a coordinator broadcasts through: fallback calls are
/// answered by the same store the coordinator writes to.
pub type LobbyDispatcher<S, T> = Dispatcher<T, StoreFallback<S>>;

struct Inner<S, T, B, G> {
    config: LobbyConfig,
    store: Arc<S>,
    dispatcher: LobbyDispatcher<S, T>,
    bots: B,
    games: G,
    connections: ConnectionRegistry,
    /// Running grace timers, one per disconnected participant.
    grace_timers: DashMap<(RoomId, UserId), AbortHandle>,
}

/// Coordinates lobby sessions for every room in the process.
///
/// Cheap to clone; clones share the connection map and grace timers.
pub struct LobbyCoordinator<S, T, B = SequentialBots, G = RedirectGames> {
    inner: Arc<Inner<S, T, B, G>>,
}

impl<S, T, B, G> Clone for LobbyCoordinator<S, T, B, G> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, T, B, G> LobbyCoordinator<S, T, B, G>
where
    S: RoomStore,
    T: EventTransport,
    B: BotFactory,
    G: GameFactory,
{
    pub fn new(
        config: LobbyConfig,
        store: Arc<S>,
        dispatcher: LobbyDispatcher<S, T>,
        bots: B,
        games: G,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: config.validated(),
                store,
                dispatcher,
                bots,
                games,
                connections: ConnectionRegistry::default(),
                grace_timers: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &LobbyConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn dispatcher(&self) -> &LobbyDispatcher<S, T> {
        &self.inner.dispatcher
    }

    // -- Connections ------------------------------------------------------

    /// Records an authenticated connection.
    pub fn register(&self, conn: ConnectionId, user: UserId) {
        self.inner.connections.register(conn, user);
        debug!(%conn, user_id = %user, "connection registered");
    }

    pub fn binding(&self, conn: ConnectionId) -> Option<Binding> {
        self.inner.connections.binding(conn)
    }

    /// The connection currently seated for `user` in `room`.
    pub fn connection_of(&self, room: RoomId, user: UserId) -> Option<ConnectionId> {
        self.inner.connections.connection_of(room, user)
    }

    /// Authenticated connections currently known.
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Returns `true` while `user` is disconnected and still holds a seat.
    pub fn has_grace_timer(&self, room: RoomId, user: UserId) -> bool {
        self.inner.grace_timers.contains_key(&(room, user))
    }

    // -- Queries ----------------------------------------------------------

    pub async fn room(&self, room_id: RoomId) -> Result<Room, LobbyError> {
        Ok(self.inner.store.get(room_id).await?)
    }

    pub async fn eligibility(&self, room_id: RoomId) -> Result<StartEligibility, LobbyError> {
        Ok(self.room(room_id).await?.start_eligibility())
    }

    // -- Requests ---------------------------------------------------------

    /// Creates a room with the caller seated as its connected host.
    pub async fn create_room(
        &self,
        conn: ConnectionId,
        user: UserId,
        name: &str,
        capacity: usize,
        settings: RoomSettings,
        display_name: &str,
    ) -> Result<Room, LobbyError> {
        let config = &self.inner.config;
        let name = LobbyConfig::check_name("room name", name, config.max_room_name)
            .map_err(LobbyError::Validation)?;
        let display_name = self.check_display_name(display_name)?;
        if !self.inner.store.accepts_capacity(capacity) {
            return Err(LobbyError::Validation(format!(
                "capacity {capacity} is outside what this server supports"
            )));
        }
        self.ensure_free(conn, None)?;

        let now = Utc::now();
        let mut room = Room::new(self.inner.store.allocate_id(), name, capacity, settings, now);
        mutations::add_member(&mut room, Membership::human(user, display_name, now))?;
        let room = self.inner.store.create(room).await?;

        self.seat(conn, room.id, user);
        info!(room_id = %room.id, host = %user, capacity, "room opened");
        Ok(room)
    }

    /// Seats `user` in `room`, or reconnects them if they already hold a
    /// seat there.
    ///
    /// The returned room is the snapshot the joining connection should be
    /// sent; it is not itself subscribed to the join broadcast.
    pub async fn join(
        &self,
        conn: ConnectionId,
        room_id: RoomId,
        user: UserId,
        display_name: &str,
    ) -> Result<Room, LobbyError> {
        let display_name = self.check_display_name(display_name)?;
        self.ensure_free(conn, Some(room_id))?;

        let previous = self
            .inner
            .connections
            .binding(conn)
            .map_or(ConnectionPhase::Disconnected, |b| b.phase);
        self.inner.connections.set_phase(conn, ConnectionPhase::Joining);

        let result = self.join_seat(conn, room_id, user, display_name).await;
        if result.is_err() {
            self.inner.connections.set_phase(conn, previous);
        }
        result
    }

    async fn join_seat(
        &self,
        conn: ConnectionId,
        room_id: RoomId,
        user: UserId,
        display_name: String,
    ) -> Result<Room, LobbyError> {
        let room = self.inner.store.get(room_id).await?;

        if room.is_member(user) {
            let reconnect = self
                .commit_checked(
                    room,
                    move |r| match r.member(user) {
                        None => Recheck::Refuse(not_member(r.id, user)),
                        Some(m) if m.is_connected() => Recheck::Skip,
                        Some(_) => Recheck::Apply,
                    },
                    move |r| mutations::set_connection(r, user, ConnectionState::Connected),
                )
                .await?;
            self.cancel_grace(room_id, user);
            let room = match reconnect {
                Commit::Unchanged(room) => {
                    debug!(room_id = %room_id, user_id = %user, "already seated, refreshing connection");
                    room
                }
                Commit::Written(room) => {
                    info!(room_id = %room_id, user_id = %user, "member reconnected");
                    self.broadcast(&room, ServerEvent::PlayerReconnected { player_id: user })
                        .await;
                    room
                }
            };
            self.seat(conn, room_id, user);
            return Ok(room);
        }

        let member = Membership::human(user, display_name, Utc::now());
        let room = self
            .commit_once(&room, |r| mutations::add_member(r, member.clone()))
            .await?;
        info!(room_id = %room_id, user_id = %user, members = room.members.len(), "member joined");
        self.broadcast(&room, ServerEvent::PlayerJoined { player: member })
            .await;
        self.seat(conn, room_id, user);
        Ok(room)
    }

    /// Removes `user` from the room, handing the host role on if needed.
    pub async fn leave(&self, room_id: RoomId, user: UserId) -> Result<Room, LobbyError> {
        let conn = self.inner.connections.connection_of(room_id, user);
        if let Some(conn) = conn {
            self.inner.connections.set_phase(conn, ConnectionPhase::Leaving);
        }
        let result = self
            .remove_seated(room_id, user, false)
            .await
            .map(Commit::into_room);
        match (&result, conn) {
            (Ok(_), _) => self.cancel_grace(room_id, user),
            (Err(_), Some(conn)) => self.inner.connections.set_phase(conn, ConnectionPhase::Active),
            (Err(_), None) => {}
        }
        result
    }

    /// Removes a seated member. With `only_if_away` the removal is dropped
    /// if the member is back, or already gone, by the time it would be
    /// written.
    async fn remove_seated(
        &self,
        room_id: RoomId,
        user: UserId,
        only_if_away: bool,
    ) -> Result<Commit, LobbyError> {
        let room = self.inner.store.get(room_id).await?;
        let was_host = room.is_host(user);
        let removal = self
            .commit_checked(
                room,
                move |r| match r.member(user) {
                    None if only_if_away => Recheck::Skip,
                    None => Recheck::Refuse(not_member(r.id, user)),
                    Some(m) if only_if_away && m.is_connected() => Recheck::Skip,
                    Some(_) => Recheck::Apply,
                },
                move |r| mutations::remove_member(r, user, Utc::now()).map(drop),
            )
            .await?;
        let room = match removal {
            Commit::Written(room) => room,
            unchanged @ Commit::Unchanged(_) => return Ok(unchanged),
        };

        self.release_seat(room_id, user);
        info!(
            room_id = %room_id,
            user_id = %user,
            was_host,
            new_host = ?room.host_id,
            status = %room.status,
            "member left"
        );
        self.broadcast(
            &room,
            ServerEvent::PlayerLeft {
                player_id: user,
                new_host_id: room.host_id,
            },
        )
        .await;
        Ok(Commit::Written(room))
    }

    /// Changes readiness. Setting the value it already has is acknowledged
    /// without a write or a broadcast.
    ///
    /// With `auto_start` on, the change that makes the room eligible also
    /// starts the game on the host's behalf; a failed auto-start is logged
    /// and the ready change still stands.
    pub async fn set_ready(&self, room_id: RoomId, user: UserId, ready: bool) -> Result<Room, LobbyError> {
        let room = self.inner.store.get(room_id).await?;
        let wanted = ReadyState::from_bool(ready);
        let change = self
            .commit_checked(
                room,
                move |r| check_ready(r, user, wanted),
                move |r| mutations::set_ready(r, user, wanted),
            )
            .await?;
        let room = match change {
            Commit::Written(room) => room,
            Commit::Unchanged(room) => {
                debug!(room_id = %room_id, user_id = %user, ready, "readiness unchanged");
                return Ok(room);
            }
        };
        let eligibility = room.start_eligibility();
        debug!(room_id = %room_id, user_id = %user, ready, can_start = eligibility.can_start, "readiness changed");
        self.broadcast(
            &room,
            ServerEvent::ReadyChanged {
                player_id: user,
                is_ready: ready,
                eligibility: eligibility.clone(),
            },
        )
        .await;

        if room.settings.auto_start && eligibility.can_start {
            if let Some(host) = room.host_id {
                info!(room_id = %room_id, host = %host, "everyone ready, auto-starting");
                match self.request_start(room_id, host).await {
                    Ok(started) => return Ok(started),
                    Err(e) => warn!(room_id = %room_id, error = %e, "auto-start failed"),
                }
            }
        }
        Ok(room)
    }

    /// Shuffles the connected members into two teams. Host only.
    pub async fn form_teams(&self, room_id: RoomId, user: UserId) -> Result<Room, LobbyError> {
        let room = self.inner.store.get(room_id).await?;
        require_host(&room, user, "form teams")?;
        if room.status != RoomStatus::Waiting {
            return Err(LobbyError::IllegalTransition(format!(
                "room {room_id} is {}, teams can only be formed while waiting",
                room.status
            )));
        }
        let room = self.inner.store.assign_teams(room.id, room.version).await?;
        self.broadcast_teams(&room).await;
        Ok(room)
    }

    /// Starts the game. Host only, and only once everyone connected is
    /// ready.
    ///
    /// The room moves to `Starting` before any collaborator is called, and
    /// members who are disconnected at that instant lose their seats. Empty
    /// seats are filled with bots, teams are formed if they weren't, and the
    /// game factory provides the redirect target. If anything after the
    /// `Starting` commit fails, the room is rolled back to `Waiting` and
    /// subscribers are told to refresh.
    pub async fn request_start(&self, room_id: RoomId, user: UserId) -> Result<Room, LobbyError> {
        let room = self.inner.store.get(room_id).await?;
        require_host(&room, user, "start the game")?;
        if room.status != RoomStatus::Waiting {
            return Err(LobbyError::IllegalTransition(format!(
                "room {room_id} is {}, cannot start",
                room.status
            )));
        }
        let eligibility = room.start_eligibility();
        if let Some(reason) = eligibility.reason {
            return Err(LobbyError::IllegalTransition(format!(
                "room {room_id} cannot start: {reason}"
            )));
        }

        let dropped: Vec<UserId> = room
            .members
            .iter()
            .filter(|m| !m.is_connected())
            .map(|m| m.user_id)
            .collect();
        let room = self
            .commit_once(&room, |r| {
                mutations::set_status(r, RoomStatus::Starting, Utc::now())?;
                mutations::drop_disconnected(r);
                Ok(())
            })
            .await?;
        info!(room_id = %room_id, dropped = dropped.len(), "room starting");

        for gone in dropped {
            self.cancel_grace(room_id, gone);
            self.release_seat(room_id, gone);
            self.broadcast(
                &room,
                ServerEvent::PlayerLeft {
                    player_id: gone,
                    new_host_id: room.host_id,
                },
            )
            .await;
        }

        match self.launch(room).await {
            Ok(room) => Ok(room),
            Err(e) => {
                self.roll_back(room_id, &e).await;
                Err(e)
            }
        }
    }

    async fn launch(&self, mut room: Room) -> Result<Room, LobbyError> {
        let missing = room.capacity.saturating_sub(room.members.len());
        if missing > 0 {
            let bots = self.inner.bots.create_bots(&room, missing).await?;
            if bots.len() != missing {
                return Err(CollaboratorError::new(
                    "bot factory",
                    format!("asked for {missing} bots, got {}", bots.len()),
                )
                .into());
            }
            room = self
                .commit_once(&room, |r| mutations::add_bots(r, bots.clone()))
                .await?;
            info!(room_id = %room.id, bots = bots.len(), "bots seated");
            self.broadcast(&room, ServerEvent::BotsAdded { bots }).await;
        }

        if room.teams().is_none() {
            room = self.inner.store.assign_teams(room.id, room.version).await?;
            self.broadcast_teams(&room).await;
        }

        let game = self.inner.games.create_game(&room).await?;
        let target = game.redirect_target.clone();
        room = self
            .commit_once(&room, |r| {
                mutations::set_status(r, RoomStatus::Playing, Utc::now())?;
                r.game_ref = Some(target.clone());
                Ok(())
            })
            .await?;
        info!(room_id = %room.id, game_id = %game.game_id, "game started");
        self.broadcast(
            &room,
            ServerEvent::GameStarting {
                redirect_target: game.redirect_target,
            },
        )
        .await;
        Ok(room)
    }

    async fn roll_back(&self, room_id: RoomId, cause: &LobbyError) {
        warn!(room_id = %room_id, error = %cause, "start failed, rolling back to waiting");
        match self.revert_start(room_id).await {
            Ok(room) => {
                self.broadcast(
                    &room,
                    ServerEvent::StateRefreshRequired {
                        version: room.version,
                    },
                )
                .await;
            }
            Err(e) => error!(room_id = %room_id, error = %e, "rollback failed"),
        }
    }

    async fn revert_start(&self, room_id: RoomId) -> Result<Room, LobbyError> {
        let room = self.inner.store.get(room_id).await?;
        let reverted = self
            .commit_checked(
                room,
                |r| match r.status {
                    RoomStatus::Starting => Recheck::Apply,
                    _ => Recheck::Skip,
                },
                |r| {
                    mutations::remove_bots(r);
                    mutations::clear_teams(r);
                    mutations::set_status(r, RoomStatus::Waiting, Utc::now())
                },
            )
            .await?;
        Ok(reverted.into_room())
    }

    /// Marks `user` disconnected and starts their grace period. If they
    /// don't rejoin before it runs out they are removed as if they had
    /// left.
    pub async fn disconnect(&self, room_id: RoomId, user: UserId) -> Result<Room, LobbyError> {
        let room = self.inner.store.get(room_id).await?;
        let change = self
            .commit_checked(
                room,
                move |r| match r.member(user) {
                    None => Recheck::Refuse(not_member(r.id, user)),
                    Some(m) if !m.is_connected() => Recheck::Skip,
                    Some(_) => Recheck::Apply,
                },
                move |r| mutations::set_connection(r, user, ConnectionState::Disconnected),
            )
            .await?;
        let room = match change {
            Commit::Written(room) => room,
            Commit::Unchanged(room) => return Ok(room),
        };
        info!(
            room_id = %room_id,
            user_id = %user,
            grace_secs = self.inner.config.grace_period.as_secs(),
            "member disconnected, grace period started"
        );
        self.broadcast(&room, ServerEvent::PlayerDisconnected { player_id: user })
            .await;
        self.start_grace(room_id, user);
        Ok(room)
    }

    /// Handles a closed transport connection.
    ///
    /// If the connection still held a seat, its participant is
    /// disconnected. A connection that was already replaced by a newer one
    /// is just forgotten.
    pub async fn connection_lost(&self, conn: ConnectionId) {
        let Some((binding, held_seat)) = self.inner.connections.remove(conn) else {
            return;
        };
        let Some(room_id) = binding.room else {
            debug!(%conn, "connection closed outside any room");
            return;
        };
        self.inner.dispatcher.transport().unsubscribe(room_id, conn);
        if !held_seat {
            debug!(%conn, room_id = %room_id, "superseded connection closed");
            return;
        }
        if let Err(e) = self.disconnect(room_id, binding.user).await {
            debug!(%conn, room_id = %room_id, error = %e, "disconnect after close failed");
        }
    }

    // -- Grace timers -----------------------------------------------------

    fn start_grace(&self, room_id: RoomId, user: UserId) {
        let weak = Arc::downgrade(&self.inner);
        let grace = self.inner.config.grace_period;
        let task = tokio::spawn(async move {
            time::sleep(grace).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            LobbyCoordinator { inner }.expire_grace(room_id, user).await;
        });
        if let Some(previous) = self
            .inner
            .grace_timers
            .insert((room_id, user), task.abort_handle())
        {
            previous.abort();
        }
    }

    fn cancel_grace(&self, room_id: RoomId, user: UserId) {
        if let Some((_, timer)) = self.inner.grace_timers.remove(&(room_id, user)) {
            timer.abort();
            debug!(room_id = %room_id, user_id = %user, "grace timer cancelled");
        }
    }

    async fn expire_grace(&self, room_id: RoomId, user: UserId) {
        self.inner.grace_timers.remove(&(room_id, user));
        match self.remove_seated(room_id, user, true).await {
            Ok(Commit::Written(_)) => {
                info!(room_id = %room_id, user_id = %user, "grace period expired, member removed");
            }
            Ok(Commit::Unchanged(_)) => {
                debug!(room_id = %room_id, user_id = %user, "grace expired but member is back or gone");
            }
            Err(LobbyError::NotFound(e)) => {
                debug!(room_id = %room_id, error = %e, "grace expired for a room that is gone");
            }
            Err(e) => {
                warn!(room_id = %room_id, user_id = %user, error = %e, "removal after grace failed");
            }
        }
    }

    // -- Helpers ----------------------------------------------------------

    /// Commits `mutate` against `room.version`; a version conflict goes
    /// straight back to the caller.
    async fn commit_once<M>(&self, room: &Room, mutate: M) -> Result<Room, LobbyError>
    where
        M: FnOnce(&mut Room) -> Result<(), StoreError> + Send,
    {
        Ok(self
            .inner
            .store
            .apply_mutation(room.id, room.version, mutate)
            .await?)
    }

    /// Commits `mutate` against `room.version` once `check` approves the
    /// room. On a version conflict `check` runs again on the winner's
    /// document before the single retry, so a write someone else already
    /// made, or one the newer room no longer allows, is never repeated.
    async fn commit_checked<C, M>(&self, mut room: Room, check: C, mutate: M) -> Result<Commit, LobbyError>
    where
        C: Fn(&Room) -> Recheck + Send,
        M: Fn(&mut Room) -> Result<(), StoreError> + Send + Sync,
    {
        let store = &self.inner.store;
        let mut retried = false;
        loop {
            match check(&room) {
                Recheck::Apply => {}
                Recheck::Skip => return Ok(Commit::Unchanged(room)),
                Recheck::Refuse(e) => return Err(e),
            }
            match store.apply_mutation(room.id, room.version, &mutate).await {
                Ok(written) => return Ok(Commit::Written(written)),
                Err(StoreError::VersionConflict { current, .. }) if !retried => {
                    debug!(
                        room_id = %room.id,
                        expected = room.version,
                        current = current.version,
                        "version conflict, rechecking against the newer room"
                    );
                    retried = true;
                    room = *current;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn broadcast(&self, room: &Room, event: ServerEvent) {
        let kind = event.kind();
        let handle = self
            .inner
            .dispatcher
            .dispatch(Outbound::to_room(room, event))
            .await;
        debug!(room_id = %room.id, version = room.version, event_id = %handle.event_id(), %kind, "event dispatched");
    }

    async fn broadcast_teams(&self, room: &Room) {
        if let Some(teams) = room.teams() {
            info!(room_id = %room.id, team1 = teams.team1.len(), team2 = teams.team2.len(), "teams formed");
            self.broadcast(
                room,
                ServerEvent::TeamsFormed {
                    team1: teams.team1,
                    team2: teams.team2,
                },
            )
            .await;
        }
    }

    fn seat(&self, conn: ConnectionId, room_id: RoomId, user: UserId) {
        let transport = self.inner.dispatcher.transport();
        if let Some(replaced) = self.inner.connections.seat(conn, room_id, user) {
            transport.unsubscribe(room_id, replaced);
        }
        transport.subscribe(room_id, conn);
    }

    fn release_seat(&self, room_id: RoomId, user: UserId) {
        if let Some(conn) = self.inner.connections.unseat(room_id, user) {
            self.inner.dispatcher.transport().unsubscribe(room_id, conn);
        }
    }

    fn ensure_free(&self, conn: ConnectionId, target: Option<RoomId>) -> Result<(), LobbyError> {
        match self.inner.connections.binding(conn).and_then(|b| b.room) {
            Some(current) if Some(current) != target => Err(LobbyError::IllegalTransition(format!(
                "connection is already in room {current}, leave it first"
            ))),
            _ => Ok(()),
        }
    }

    fn check_display_name(&self, name: &str) -> Result<String, LobbyError> {
        LobbyConfig::check_name("display name", name, self.inner.config.max_display_name)
            .map_err(LobbyError::Validation)
    }
}

/// What a freshly read room says about a pending write.
enum Recheck {
    Apply,
    /// The room is already in the state the write would produce.
    Skip,
    Refuse(LobbyError),
}

enum Commit {
    Written(Room),
    Unchanged(Room),
}

impl Commit {
    fn into_room(self) -> Room {
        match self {
            Commit::Written(room) | Commit::Unchanged(room) => room,
        }
    }
}

fn check_ready(room: &Room, user: UserId, wanted: ReadyState) -> Recheck {
    let Some(member) = room.member(user) else {
        return Recheck::Refuse(not_member(room.id, user));
    };
    if room.status != RoomStatus::Waiting {
        return Recheck::Refuse(LobbyError::IllegalTransition(format!(
            "room {} is {}, readiness can only change while waiting",
            room.id, room.status
        )));
    }
    if !member.is_connected() {
        return Recheck::Refuse(LobbyError::Validation(format!(
            "user {user} is disconnected and cannot change readiness"
        )));
    }
    if member.ready == wanted {
        Recheck::Skip
    } else {
        Recheck::Apply
    }
}

fn not_member(room: RoomId, user: UserId) -> LobbyError {
    LobbyError::NotFound(format!("user {user} not in room {room}"))
}

fn require_host(room: &Room, user: UserId, action: &str) -> Result<(), LobbyError> {
    if !room.is_member(user) {
        return Err(not_member(room.id, user));
    }
    if !room.is_host(user) {
        return Err(LobbyError::IllegalTransition(format!("only the host can {action}")));
    }
    Ok(())
}
