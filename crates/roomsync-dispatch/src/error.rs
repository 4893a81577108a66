//! Error types for event delivery.

use roomsync_protocol::{EventId, EventKind};

/// Why an event did not reach its target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// Every attempt failed and the event had no fallback.
    #[error("{kind} event {event_id} not delivered after {attempts} attempts")]
    DeliveryFailure {
        event_id: EventId,
        kind: EventKind,
        attempts: u32,
    },

    /// Every attempt failed and the fallback call failed too. Subscribers
    /// have been told to refresh.
    #[error("fallback for {kind} event {event_id} failed: {reason}")]
    FallbackFailure {
        event_id: EventId,
        kind: EventKind,
        reason: String,
    },

    /// The pending entry was garbage-collected before delivery finished.
    #[error("event {0} expired before delivery completed")]
    Expired(EventId),

    /// The delivery task stopped without reporting.
    #[error("delivery task for event {0} aborted")]
    Aborted(EventId),
}

/// A failed fallback call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FallbackError {
    /// The endpoint could not be reached.
    #[error("fallback unavailable: {0}")]
    Unavailable(String),

    /// The endpoint answered with an error.
    #[error("fallback rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}
