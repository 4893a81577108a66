//! Error types for the lobby layer.

use roomsync_protocol::RoomId;
use roomsync_store::StoreError;

/// Why a lobby request was refused.
///
/// Every variant reaches the requesting connection only, as an `error`
/// frame whose code comes from [`code`](Self::code).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// Malformed input.
    #[error("{0}")]
    Validation(String),

    /// The handshake token was rejected.
    #[error("authentication failed: {0}")]
    Unauthorized(String),

    /// The room or member doesn't exist.
    #[error("{0}")]
    NotFound(String),

    /// The room's state, or the caller's role in it, doesn't allow this
    /// request.
    #[error("{0}")]
    IllegalTransition(String),

    /// Someone else wrote the room first.
    #[error("room {room} changed concurrently (expected version {expected}, now {current})")]
    VersionConflict {
        room: RoomId,
        expected: u64,
        current: u64,
    },

    /// A bot or game factory failed while starting.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl LobbyError {
    /// HTTP-style status sent in `error` frames.
    pub fn code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::IllegalTransition(_) => 409,
            Self::VersionConflict { .. } => 412,
            Self::Collaborator(_) => 502,
        }
    }
}

impl From<StoreError> for LobbyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) | StoreError::MemberNotFound { .. } => {
                Self::NotFound(err.to_string())
            }
            StoreError::VersionConflict { expected, current } => Self::VersionConflict {
                room: current.id,
                expected,
                current: current.version,
            },
            StoreError::AlreadyExists(_)
            | StoreError::RoomFull { .. }
            | StoreError::AlreadyMember { .. }
            | StoreError::NotWaiting { .. }
            | StoreError::IllegalTransition { .. } => Self::IllegalTransition(err.to_string()),
            StoreError::Invalid(_) | StoreError::Resolve(_) => Self::Validation(err.to_string()),
        }
    }
}

/// A failure reported by an injected collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{collaborator} failed: {message}")]
pub struct CollaboratorError {
    /// Which collaborator, e.g. `"bot factory"`.
    pub collaborator: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self {
            collaborator,
            message: message.into(),
        }
    }
}
