use crate::DocumentKind;

/// Errors that can occur when resolving a conflict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// One side is not the kind the caller asked to resolve.
    #[error("expected {expected} documents, got {local} and {remote}")]
    KindMismatch {
        expected: DocumentKind,
        local: DocumentKind,
        remote: DocumentKind,
    },

    /// The two sides describe different entities.
    #[error("{kind} ids differ: {local} vs {remote}")]
    IdMismatch {
        kind: DocumentKind,
        local: String,
        remote: String,
    },
}
