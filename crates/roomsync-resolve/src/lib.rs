//! Conflict resolution for roomsync documents.
//!
//! When two writers hold diverged copies of the same entity, [`resolve`]
//! produces one merged document. Every strategy is pure, deterministic and
//! commutative: `resolve(k, a, b) == resolve(k, b, a)`, and the result's
//! version is always `max(a.version, b.version) + 1` so it supersedes both.

mod document;
mod error;
mod game;
mod identity;
mod room;

pub use document::{
    ConflictCase, Document, DocumentKind, GameSessionDoc, GameStatus, UserProfile,
};
pub use error::ResolveError;
pub use game::merge_game_session;
pub use identity::merge_identity;
pub use room::merge_room;

/// Merges `local` and `remote` using the strategy for `kind`.
///
/// # Errors
/// `KindMismatch` if either side is not a `kind` document, `IdMismatch` if
/// they describe different entities.
pub fn resolve(
    kind: DocumentKind,
    local: &Document,
    remote: &Document,
) -> Result<Document, ResolveError> {
    let merged = match (kind, local, remote) {
        (DocumentKind::Identity, Document::Identity(a), Document::Identity(b)) => {
            Document::Identity(merge_identity(a, b)?)
        }
        (DocumentKind::GameSession, Document::GameSession(a), Document::GameSession(b)) => {
            Document::GameSession(merge_game_session(a, b)?)
        }
        (DocumentKind::Room, Document::Room(a), Document::Room(b)) => {
            Document::Room(merge_room(a, b)?)
        }
        _ => {
            return Err(ResolveError::KindMismatch {
                expected: kind,
                local: local.kind(),
                remote: remote.kind(),
            });
        }
    };

    tracing::debug!(
        %kind,
        entity = %merged.entity_id(),
        local_version = local.version(),
        remote_version = remote.version(),
        version = merged.version(),
        "resolved conflict"
    );
    Ok(merged)
}
