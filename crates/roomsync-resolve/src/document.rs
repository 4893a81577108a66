//! The document kinds the resolver knows how to merge.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use roomsync_protocol::{Room, UserId};
use serde::{Deserialize, Serialize};

/// A participant's identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Never changes once set; a side without it simply hasn't synced it yet.
    pub credential_hash: Option<String>,
    pub display_name: String,
    pub avatar: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub games_played: u32,
    pub games_won: u32,
    pub version: u64,
}

/// Lifecycle of a running game. Declaration order is lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    InProgress,
    Completed,
    Cancelled,
}

/// The state of one game session as a secondary copy sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSessionDoc {
    pub game_id: String,
    pub status: GameStatus,
    pub round: u32,
    pub trick: u32,
    /// Score per team (1 or 2).
    pub scores: BTreeMap<u8, u32>,
    /// Cards held per seat.
    pub hands: BTreeMap<u8, Vec<String>>,
    /// Seat whose turn it is.
    pub current_player: Option<u8>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl GameSessionDoc {
    /// How far the game has progressed. Larger is later.
    pub fn progress(&self) -> (GameStatus, u32, u32) {
        (self.status, self.round, self.trick)
    }
}

/// Which merge strategy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    Identity,
    GameSession,
    Room,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Identity => "identity",
            Self::GameSession => "game-session",
            Self::Room => "room",
        };
        f.write_str(s)
    }
}

/// Any document the resolver can merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "document", rename_all = "kebab-case")]
pub enum Document {
    Identity(UserProfile),
    GameSession(GameSessionDoc),
    Room(Room),
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Identity(_) => DocumentKind::Identity,
            Self::GameSession(_) => DocumentKind::GameSession,
            Self::Room(_) => DocumentKind::Room,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Self::Identity(doc) => doc.version,
            Self::GameSession(doc) => doc.version,
            Self::Room(doc) => doc.version,
        }
    }

    /// The entity id, rendered for error messages.
    pub fn entity_id(&self) -> String {
        match self {
            Self::Identity(doc) => doc.user_id.to_string(),
            Self::GameSession(doc) => doc.game_id.clone(),
            Self::Room(doc) => doc.id.to_string(),
        }
    }
}

/// Two diverged copies of the same entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictCase {
    pub local: Document,
    pub remote: Document,
}

impl ConflictCase {
    pub fn new(local: Document, remote: Document) -> Self {
        Self { local, remote }
    }

    /// Resolves using the local side's kind.
    pub fn resolve(&self) -> Result<Document, crate::ResolveError> {
        crate::resolve(self.local.kind(), &self.local, &self.remote)
    }
}
