//! # roomsync
//!
//! Room state synchronization and reliable event delivery for small
//! multiplayer lobbies (2 to 6 players).
//!
//! Clients connect over WebSocket, authenticate once, then create or join
//! rooms, toggle ready, form teams and request a start. Every accepted
//! change is committed to the room store under optimistic concurrency and
//! broadcast to the room as an event the dispatcher retries until it is
//! confirmed, falling back to a state refresh when it can't be.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomsync::prelude::*;
//!
//! struct DevAuth;
//!
//! impl Authenticator for DevAuth {
//!     async fn authenticate(&self, token: &str) -> Result<UserId, LobbyError> {
//!         token
//!             .parse()
//!             .map(UserId)
//!             .map_err(|_| LobbyError::Unauthorized("bad token".into()))
//!     }
//! }
//!
//! # async fn run() -> Result<(), RoomsyncError> {
//! roomsync::init_tracing();
//! let server = SyncServer::builder()
//!     .config(SyncConfig::load())
//!     .build(DevAuth)
//!     .await?;
//! server.run().await
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod config;
mod error;
mod handler;
mod hub;
mod server;

pub use config::{
    CONFIG_PATH_ENV, Confirmation, DEFAULT_CONFIG_PATH, DispatchSettings, LobbySettings,
    ServerSettings, StoreSettings, SyncConfig,
};
pub use error::RoomsyncError;
pub use hub::ConnectionHub;
pub use server::{PROTOCOL_VERSION, SyncLobby, SyncServer, SyncServerBuilder};

pub use roomsync_dispatch as dispatch;
pub use roomsync_lobby as lobby;
pub use roomsync_protocol as protocol;
pub use roomsync_resolve as resolve;
pub use roomsync_store as store;
pub use roomsync_transport as transport;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a global `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`). Calling it twice is harmless.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// Everything needed to run or embed a server.
pub mod prelude {
    pub use crate::{ConnectionHub, RoomsyncError, SyncConfig, SyncServer, SyncServerBuilder};
    pub use roomsync_dispatch::{ConfirmationMode, DeliveryStats, DispatchConfig};
    pub use roomsync_lobby::{
        Authenticator, BotFactory, GameFactory, GameHandle, LobbyConfig, LobbyError,
    };
    pub use roomsync_protocol::{
        ClientMessage, Envelope, EventId, Room, RoomId, RoomStatus, ServerEvent, ServerMessage,
        UserId,
    };
    pub use roomsync_store::{MemoryRoomStore, RoomStore};
}
