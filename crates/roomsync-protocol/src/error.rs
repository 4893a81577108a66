//! Error types for the protocol layer.
//!
//! Each crate in roomsync defines its own error enum. When you see a
//! `ProtocolError`, you know the problem is in serialization or message
//! shape, not in storage or delivery.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, an unknown
    /// `type` tag, or a team number other than 1 or 2.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but violates protocol rules, e.g. a
    /// request that arrives before the handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
