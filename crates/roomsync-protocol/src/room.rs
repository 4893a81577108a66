//! The room document: the canonical description of one lobby.
//!
//! Everything here is plain data plus read-only queries. Writes go through
//! the store crate, which is the only place a `Room` is ever mutated and
//! the only place `version` is bumped.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::RoomId;

/// Smallest room that can ever start a game.
pub const MIN_CAPACITY: usize = 2;

/// Largest room the lobby supports.
pub const MAX_CAPACITY: usize = 6;

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a room.
///
/// ```text
/// Waiting ──→ Starting ──→ Playing ──→ Finished
///    ↑           │
///    └─(rollback)┘          any non-terminal ──→ Cancelled
/// ```
///
/// `Starting` is an interim state: it is committed *before* the start
/// flow awaits any collaborator, so a second start request observes it and
/// is rejected instead of racing the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Starting,
    Playing,
    Finished,
    Cancelled,
}

impl RoomStatus {
    /// Returns `true` if new participants may join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` once the room can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Returns `true` if moving from `self` to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RoomStatus::*;
        matches!(
            (self, target),
            (Waiting, Starting)
                | (Starting, Playing)
                | (Starting, Waiting)
                | (Playing, Finished)
                | (Waiting | Starting | Playing, Cancelled)
        )
    }

    /// Position in the lifecycle. Used by conflict resolution so a merge
    /// never moves a room backwards.
    pub fn rank(self) -> u8 {
        match self {
            Self::Waiting => 0,
            Self::Starting => 1,
            Self::Playing => 2,
            Self::Finished => 3,
            Self::Cancelled => 4,
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Starting => "starting",
            Self::Playing => "playing",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Membership
// ---------------------------------------------------------------------------

/// Whether a participant's connection is currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

/// A participant's readiness to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    NotReady,
    Ready,
}

impl ReadyState {
    /// Converts the wire boolean (`isReady`) into a state.
    pub fn from_bool(ready: bool) -> Self {
        if ready { Self::Ready } else { Self::NotReady }
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// One of the two sides of a partnership game.
///
/// Serialized as the plain numbers `1` and `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Team {
    One,
    Two,
}

impl From<Team> for u8 {
    fn from(team: Team) -> Self {
        match team {
            Team::One => 1,
            Team::Two => 2,
        }
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            other => Err(format!("team must be 1 or 2, got {other}")),
        }
    }
}

/// A participant's record inside a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub user_id: UserId,
    pub display_name: String,
    pub connection: ConnectionState,
    pub ready: ReadyState,
    /// `None` until an explicit team-formation step runs.
    pub team: Option<Team>,
    pub joined_at: DateTime<Utc>,
    pub is_bot: bool,
}

impl Membership {
    /// A freshly joined human: connected, not ready, no team.
    pub fn human(user_id: UserId, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            connection: ConnectionState::Connected,
            ready: ReadyState::NotReady,
            team: None,
            joined_at: now,
            is_bot: false,
        }
    }

    /// A synthetic participant. Bots are always connected and ready.
    pub fn bot(user_id: UserId, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            ready: ReadyState::Ready,
            is_bot: true,
            ..Self::human(user_id, display_name, now)
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.connection, ConnectionState::Connected)
    }

    /// Readiness only counts while connected.
    pub fn is_ready(&self) -> bool {
        self.is_connected() && self.ready.is_ready()
    }
}

// ---------------------------------------------------------------------------
// RoomSettings
// ---------------------------------------------------------------------------

/// Host-editable options carried on the room document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomSettings {
    /// Seconds each player gets per turn once the game runs.
    pub turn_time_limit_secs: u32,
    pub allow_spectators: bool,
    /// Start automatically as soon as everyone connected is ready.
    pub auto_start: bool,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            turn_time_limit_secs: 30,
            allow_spectators: false,
            auto_start: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Derived views
// ---------------------------------------------------------------------------

/// Whether a room can start right now, and why not if it can't.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartEligibility {
    pub can_start: bool,
    pub connected: usize,
    pub ready: usize,
    /// Synthetic participants required to fill the room to capacity.
    pub bots_needed: usize,
    pub reason: Option<String>,
}

/// The two teams as currently assigned on the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamPartition {
    pub team1: Vec<UserId>,
    pub team2: Vec<UserId>,
}

impl TeamPartition {
    /// Size difference between the two sides.
    pub fn imbalance(&self) -> usize {
        self.team1.len().abs_diff(self.team2.len())
    }
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// The canonical lobby document.
///
/// `version` starts at 1 on creation and increases by exactly one for
/// every committed mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub capacity: usize,
    pub host_id: Option<UserId>,
    pub status: RoomStatus,
    pub version: u64,
    pub settings: RoomSettings,
    /// In join order.
    pub members: Vec<Membership>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Where clients go once the game is running.
    pub game_ref: Option<String>,
}

impl Room {
    /// Builds a new, empty, waiting room at version 1.
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        capacity: usize,
        settings: RoomSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            capacity,
            host_id: None,
            status: RoomStatus::Waiting,
            version: 1,
            settings,
            members: Vec::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            finished_at: None,
            game_ref: None,
        }
    }

    pub fn member(&self, user_id: UserId) -> Option<&Membership> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn member_mut(&mut self, user_id: UserId) -> Option<&mut Membership> {
        self.members.iter_mut().find(|m| m.user_id == user_id)
    }

    pub fn is_member(&self, user_id: UserId) -> bool {
        self.member(user_id).is_some()
    }

    pub fn is_host(&self, user_id: UserId) -> bool {
        self.host_id == Some(user_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.capacity
    }

    pub fn connected_members(&self) -> impl Iterator<Item = &Membership> {
        self.members.iter().filter(|m| m.is_connected())
    }

    pub fn connected_count(&self) -> usize {
        self.connected_members().count()
    }

    /// Returns the current partition if every connected member has a team.
    pub fn teams(&self) -> Option<TeamPartition> {
        let mut partition = TeamPartition {
            team1: Vec::new(),
            team2: Vec::new(),
        };
        for member in self.connected_members() {
            match member.team? {
                Team::One => partition.team1.push(member.user_id),
                Team::Two => partition.team2.push(member.user_id),
            }
        }
        if partition.team1.is_empty() && partition.team2.is_empty() {
            return None;
        }
        Some(partition)
    }

    /// Who should host next: a ready connected member, else any connected
    /// member, else anyone left. Humans are considered before bots and ties
    /// go to the earliest joiner.
    pub fn successor_host(&self) -> Option<UserId> {
        let humans = || self.members.iter().filter(|m| !m.is_bot);
        humans()
            .find(|m| m.is_ready())
            .or_else(|| humans().find(|m| m.is_connected()))
            .or_else(|| humans().next())
            .or_else(|| self.members.first())
            .map(|m| m.user_id)
    }

    /// Start-eligibility is a pure function of membership: at least two
    /// connected members, and all of them ready.
    pub fn start_eligibility(&self) -> StartEligibility {
        let connected = self.connected_count();
        let ready = self.connected_members().filter(|m| m.is_ready()).count();
        let bots_needed = self.capacity.saturating_sub(connected);

        let reason = if connected < MIN_CAPACITY {
            Some(format!(
                "need at least {MIN_CAPACITY} connected players, have {connected}"
            ))
        } else if ready < connected {
            Some(format!("{} of {connected} players not ready", connected - ready))
        } else {
            None
        };

        StartEligibility {
            can_start: reason.is_none(),
            connected,
            ready,
            bots_needed,
            reason,
        }
    }
}
