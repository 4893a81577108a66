//! Byte pipes between lobby clients and the server.
//!
//! A [`Transport`] hands out [`Connection`]s; everything above this crate
//! speaks frames over them and never sees the socket type. The server loop
//! is generic over `Transport`, and tests drive it with in-process fakes.
//!
//! The `websocket` feature (on by default) adds [`WebSocketTransport`],
//! which carries one JSON frame per binary or text message.

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// Names one socket for its whole life. Never reused within a process.
///
/// A participant who reconnects comes back on a new id; mapping ids to
/// users and rooms is the lobby's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The listening side: yields one [`Connection`] per client that finishes
/// its upgrade.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Resolves with the next client. A server loop stops on an error it
    /// recognises as shutdown and logs any other.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops taking clients where the engine has something to release.
    /// Connections already handed out stay open.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One client socket, shared between its handler task and the event hub.
///
/// `send` and `recv` take `&self` and may run at the same time: room
/// broadcasts are pushed from other tasks while the handler is parked in
/// `recv`. The futures are `Send` so the hub can fan out from a spawned
/// retry task.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one whole frame.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next frame from the client, or `Ok(None)` once the client has closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Self::Error>> + Send;

    fn close(&self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn id(&self) -> ConnectionId;
}
