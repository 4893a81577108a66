//! Identity types and every message that travels on the wire.
//!
//! All JSON uses an internal `type` tag in kebab-case and camelCase field
//! names, so a browser client sees e.g.
//! `{"type":"ready-changed","playerId":4,"isReady":true,...}`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::room::{Membership, Room, RoomSettings, StartEligibility};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a participant (human or bot).
///
/// A newtype wrapper so a `RoomId` can never be passed where a `UserId`
/// is expected. `#[serde(transparent)]` makes `UserId(42)` serialize as
/// just `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Identifier of one emitted event.
///
/// Issued from a monotonic counter, so a client that sees an id lower
/// than or equal to one it already processed can discard the frame as a
/// stale duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// The type of a [`ServerEvent`], without its payload.
///
/// Used as a stats key and in `fallback-notification` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    PlayerJoined,
    PlayerLeft,
    PlayerReconnected,
    PlayerDisconnected,
    ReadyChanged,
    TeamsFormed,
    GameStarting,
    BotsAdded,
    StateRefreshRequired,
    FallbackNotification,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        Self::PlayerJoined,
        Self::PlayerLeft,
        Self::PlayerReconnected,
        Self::PlayerDisconnected,
        Self::ReadyChanged,
        Self::TeamsFormed,
        Self::GameStarting,
        Self::BotsAdded,
        Self::StateRefreshRequired,
        Self::FallbackNotification,
    ];

    /// The wire name of this event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PlayerJoined => "player-joined",
            Self::PlayerLeft => "player-left",
            Self::PlayerReconnected => "player-reconnected",
            Self::PlayerDisconnected => "player-disconnected",
            Self::ReadyChanged => "ready-changed",
            Self::TeamsFormed => "teams-formed",
            Self::GameStarting => "game-starting",
            Self::BotsAdded => "bots-added",
            Self::StateRefreshRequired => "state-refresh-required",
            Self::FallbackNotification => "fallback-notification",
        }
    }

    /// Critical events desynchronize clients if lost: membership, team and
    /// start changes. Only these escalate to the fallback channel.
    pub fn is_critical(self) -> bool {
        !matches!(
            self,
            Self::StateRefreshRequired | Self::FallbackNotification
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A room-state change pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    PlayerJoined {
        player: Membership,
    },
    PlayerLeft {
        player_id: UserId,
        new_host_id: Option<UserId>,
    },
    PlayerReconnected {
        player_id: UserId,
    },
    PlayerDisconnected {
        player_id: UserId,
    },
    ReadyChanged {
        player_id: UserId,
        is_ready: bool,
        eligibility: StartEligibility,
    },
    TeamsFormed {
        team1: Vec<UserId>,
        team2: Vec<UserId>,
    },
    GameStarting {
        redirect_target: String,
    },
    BotsAdded {
        bots: Vec<Membership>,
    },
    /// Clients must re-fetch the room; something they were told may be lost.
    StateRefreshRequired {
        version: u64,
    },
    FallbackNotification {
        event_type: EventKind,
    },
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PlayerJoined { .. } => EventKind::PlayerJoined,
            Self::PlayerLeft { .. } => EventKind::PlayerLeft,
            Self::PlayerReconnected { .. } => EventKind::PlayerReconnected,
            Self::PlayerDisconnected { .. } => EventKind::PlayerDisconnected,
            Self::ReadyChanged { .. } => EventKind::ReadyChanged,
            Self::TeamsFormed { .. } => EventKind::TeamsFormed,
            Self::GameStarting { .. } => EventKind::GameStarting,
            Self::BotsAdded { .. } => EventKind::BotsAdded,
            Self::StateRefreshRequired { .. } => EventKind::StateRefreshRequired,
            Self::FallbackNotification { .. } => EventKind::FallbackNotification,
        }
    }
}

/// The wrapper every emitted event travels in.
///
/// ```text
/// ┌───────────────────────────────┐
/// │ eventId: 42                   │  ← duplicate detection / acks
/// │ roomId: 7, roomVersion: 12    │  ← which document, which revision
/// │ timestamp, critical           │
/// │ ┌───────────────────────────┐ │
/// │ │ event: ready-changed {..} │ │
/// │ └───────────────────────────┘ │
/// └───────────────────────────────┘
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub event_id: EventId,
    pub room_id: RoomId,
    /// Room version the event describes.
    pub room_version: u64,
    pub timestamp: DateTime<Utc>,
    pub critical: bool,
    pub event: ServerEvent,
}

impl Envelope {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client may send. Each request carries the room it targets;
/// the caller's identity comes from the handshake, never from the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Handshake {
        version: u32,
        token: Option<String>,
    },
    Heartbeat {
        client_time: u64,
    },
    CreateRoom {
        name: String,
        /// Seats, host included. The server default applies when omitted.
        #[serde(default)]
        capacity: Option<usize>,
        #[serde(default)]
        settings: RoomSettings,
        display_name: String,
    },
    JoinRoom {
        room_id: RoomId,
        display_name: String,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    ToggleReady {
        room_id: RoomId,
        is_ready: bool,
    },
    FormTeams {
        room_id: RoomId,
    },
    RequestStart {
        room_id: RoomId,
    },
    PlayerDisconnectNotice {
        room_id: RoomId,
    },
    GetRoom {
        room_id: RoomId,
    },
    /// Delivery confirmation for an event frame.
    Ack {
        event_id: EventId,
    },
    /// The client received a frame it could not apply.
    Nack {
        event_id: EventId,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server sends on a connection.
///
/// Replies (`accepted`, `error`, `room-state`) go only to the requesting
/// connection. `event` frames are the dispatcher's broadcasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    HandshakeAck {
        user_id: UserId,
        server_time: DateTime<Utc>,
    },
    HeartbeatAck {
        client_time: u64,
        server_time: DateTime<Utc>,
    },
    RoomState {
        room: Room,
    },
    Accepted {
        action: String,
        room_version: Option<u64>,
    },
    /// `code` follows HTTP conventions (400, 404, 409, 412, 502).
    Error {
        code: u16,
        message: String,
    },
    Event(Envelope),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::ReadyState;

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        assert_eq!(serde_json::to_string(&UserId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&RoomId(7)).unwrap(), "7");
        assert_eq!(serde_json::to_string(&EventId(3)).unwrap(), "3");
    }

    #[test]
    fn test_ids_display_with_prefix() {
        assert_eq!(UserId(1).to_string(), "U-1");
        assert_eq!(RoomId(2).to_string(), "R-2");
        assert_eq!(EventId(3).to_string(), "E-3");
    }

    #[test]
    fn test_event_ids_order_monotonically() {
        assert!(EventId(4) > EventId(3));
    }

    #[test]
    fn test_event_kind_criticality() {
        assert!(EventKind::PlayerJoined.is_critical());
        assert!(EventKind::TeamsFormed.is_critical());
        assert!(EventKind::GameStarting.is_critical());
        assert!(EventKind::ReadyChanged.is_critical());
        assert!(!EventKind::StateRefreshRequired.is_critical());
        assert!(!EventKind::FallbackNotification.is_critical());
    }

    #[test]
    fn test_event_kind_as_str_matches_serde_name() {
        for kind in EventKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_ready_changed_json_shape() {
        let event = ServerEvent::ReadyChanged {
            player_id: UserId(4),
            is_ready: true,
            eligibility: StartEligibility {
                can_start: false,
                connected: 2,
                ready: 1,
                bots_needed: 2,
                reason: Some("1 of 2 players not ready".into()),
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ready-changed");
        assert_eq!(json["playerId"], 4);
        assert_eq!(json["isReady"], true);
        assert_eq!(json["eligibility"]["botsNeeded"], 2);
    }

    #[test]
    fn test_player_left_carries_new_host() {
        let event = ServerEvent::PlayerLeft {
            player_id: UserId(1),
            new_host_id: Some(UserId(2)),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "player-left");
        assert_eq!(json["newHostId"], 2);
        assert_eq!(event.kind(), EventKind::PlayerLeft);
    }

    #[test]
    fn test_event_frame_nests_envelope_fields() {
        let frame = ServerMessage::Event(Envelope {
            event_id: EventId(9),
            room_id: RoomId(1),
            room_version: 5,
            timestamp: Utc::now(),
            critical: true,
            event: ServerEvent::GameStarting {
                redirect_target: "/games/abc".into(),
            },
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["eventId"], 9);
        assert_eq!(json["roomVersion"], 5);
        assert_eq!(json["event"]["type"], "game-starting");
        assert_eq!(json["event"]["redirectTarget"], "/games/abc");

        let back: ServerMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn test_create_room_settings_default_when_omitted() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"create-room","name":"Friday","capacity":4,"displayName":"ana"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::CreateRoom { settings, capacity, .. } => {
                assert_eq!(capacity, Some(4));
                assert_eq!(settings, RoomSettings::default());
            }
            other => panic!("unexpected message {other:?}"),
        }
    }

    #[test]
    fn test_bots_added_serializes_members() {
        let bot = Membership::bot(UserId(100), "Bot 1", Utc::now());
        let json = serde_json::to_value(ServerEvent::BotsAdded { bots: vec![bot] }).unwrap();
        assert_eq!(json["bots"][0]["isBot"], true);
        assert_eq!(json["bots"][0]["ready"], serde_json::to_value(ReadyState::Ready).unwrap());
    }
}
