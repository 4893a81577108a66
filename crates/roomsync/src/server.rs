//! `SyncServer` builder and accept loop.
//!
//! Wires the layers together: WebSocket transport → handler → lobby
//! coordinator → store, with the dispatcher pushing events back out through
//! the [`ConnectionHub`].

use std::sync::Arc;
use std::time::Duration;

use roomsync_dispatch::Dispatcher;
use roomsync_lobby::{
    Authenticator, BotFactory, GameFactory, LobbyCoordinator, RedirectGames, SequentialBots,
    StoreFallback,
};
use roomsync_protocol::JsonCodec;
use roomsync_store::MemoryRoomStore;
use roomsync_transport::{Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::{ConnectionHub, RoomsyncError, SyncConfig};

/// Clients must send this version in their handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// The coordinator as the server wires it.
pub type SyncLobby<B = SequentialBots, G = RedirectGames> =
    LobbyCoordinator<MemoryRoomStore, ConnectionHub, B, G>;

/// Shared state handed to every connection task.
pub(crate) struct ServerState<A, B, G> {
    pub(crate) lobby: SyncLobby<B, G>,
    pub(crate) hub: Arc<ConnectionHub>,
    pub(crate) auth: A,
    pub(crate) codec: JsonCodec,
    pub(crate) handshake_timeout: Duration,
    pub(crate) idle_timeout: Duration,
    pub(crate) default_capacity: usize,
}

/// Builder for a [`SyncServer`].
///
/// # Example
///
/// ```rust,ignore
/// use roomsync::prelude::*;
///
/// let server = SyncServer::builder()
///     .config(SyncConfig::load())
///     .build(my_auth)
///     .await?;
/// server.run().await
/// ```
pub struct SyncServerBuilder {
    config: SyncConfig,
}

impl SyncServerBuilder {
    pub fn new() -> Self {
        Self {
            config: SyncConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Overrides the bind address from the configuration.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.server.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener using the bundled bot and game factories.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<SyncServer<A>, RoomsyncError> {
        self.build_with(auth, SequentialBots::new(), RedirectGames::default())
            .await
    }

    /// Binds the listener with caller-supplied bot and game factories.
    pub async fn build_with<A, B, G>(
        self,
        auth: A,
        bots: B,
        games: G,
    ) -> Result<SyncServer<A, B, G>, RoomsyncError>
    where
        A: Authenticator,
        B: BotFactory,
        G: GameFactory,
    {
        let config = self.config;
        let transport = WebSocketTransport::bind(&config.server.bind_addr).await?;

        let store = Arc::new(MemoryRoomStore::new(config.store_config()));
        let hub = Arc::new(ConnectionHub::new());
        let dispatcher = Dispatcher::new(
            config.dispatch_config(),
            Arc::clone(&hub),
            StoreFallback::new(Arc::clone(&store)),
        );
        let default_capacity = store.config().default_capacity;
        let lobby = LobbyCoordinator::new(config.lobby_config(), store, dispatcher, bots, games);

        let state = Arc::new(ServerState {
            lobby,
            hub,
            auth,
            codec: JsonCodec,
            handshake_timeout: config.handshake_timeout(),
            idle_timeout: config.idle_timeout(),
            default_capacity,
        });
        Ok(SyncServer { transport, state })
    }
}

impl Default for SyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound roomsync server. Call [`run`](Self::run) to start accepting.
pub struct SyncServer<A, B = SequentialBots, G = RedirectGames> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, B, G>>,
}

impl SyncServer<()> {
    pub fn builder() -> SyncServerBuilder {
        SyncServerBuilder::new()
    }
}

impl<A, B, G> SyncServer<A, B, G>
where
    A: Authenticator,
    B: BotFactory,
    G: GameFactory,
{
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The coordinator behind this server, for embedding and inspection.
    pub fn lobby(&self) -> &SyncLobby<B, G> {
        &self.state.lobby
    }

    /// Accepts connections and spawns a handler task for each until the
    /// transport shuts down.
    pub async fn run(mut self) -> Result<(), RoomsyncError> {
        let janitor = self.state.lobby.dispatcher().spawn_janitor();
        tracing::info!(addr = ?self.local_addr().ok(), "roomsync server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(TransportError::Shutdown) => break,
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }

        janitor.abort();
        tracing::info!("roomsync server stopped");
        Ok(())
    }
}
