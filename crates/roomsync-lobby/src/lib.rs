//! Lobby session coordination for roomsync.
//!
//! The [`LobbyCoordinator`] turns client requests into room mutations and
//! room mutations into broadcasts:
//!
//! 1. **Identity**: who is asking ([`Authenticator`], checked once per
//!    connection at handshake)
//! 2. **Seats**: which connection speaks for which member, including
//!    reconnects within a grace period
//! 3. **Lifecycle**: join, leave, ready, teams, start, each validated
//!    against the current room and committed under optimistic concurrency
//! 4. **Start hand-off**: bots for empty seats ([`BotFactory`]) and a game
//!    to redirect to ([`GameFactory`]), rolled back if either fails
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)   ← decodes frames, replies to the requester
//!     ↕
//! Lobby (this crate) ← validates, commits, broadcasts
//!     ↕                    ↕
//! Store               Dispatcher ← retries, falls back through StoreFallback
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod collaborators;
mod config;
mod connections;
mod coordinator;
mod error;
mod fallback;

pub use auth::Authenticator;
pub use collaborators::{
    BOT_ID_BASE, BotFactory, GameFactory, GameHandle, RedirectGames, SequentialBots,
};
pub use config::LobbyConfig;
pub use connections::{Binding, ConnectionPhase};
pub use coordinator::{LobbyCoordinator, LobbyDispatcher};
pub use error::{CollaboratorError, LobbyError};
pub use fallback::StoreFallback;
