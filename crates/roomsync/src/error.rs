//! Unified error type for the roomsync server.

use roomsync_dispatch::DispatchError;
use roomsync_lobby::LobbyError;
use roomsync_protocol::ProtocolError;
use roomsync_resolve::ResolveError;
use roomsync_store::StoreError;
use roomsync_transport::TransportError;

/// Top-level error wrapping every layer's error type.
///
/// `#[from]` on each variant lets `?` lift sub-crate errors without
/// explicit mapping.
#[derive(Debug, thiserror::Error)]
pub enum RoomsyncError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A lobby request was refused.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// The peer broke the handshake rules and was disconnected.
    #[error("handshake failed: {0}")]
    Handshake(String),
}
