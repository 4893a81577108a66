//! Per-connection handler: handshake, then request routing.
//!
//! Each accepted connection runs in its own task:
//!   1. Receive `handshake`, check the version, authenticate the token
//!   2. Attach to the hub and register with the lobby
//!   3. Loop: decode a request, run it, reply to this connection only
//!
//! Broadcasts never go through here; the lobby hands them to the
//! dispatcher, which reaches this connection through the hub.

use std::sync::Arc;

use chrono::Utc;
use roomsync_lobby::{Authenticator, BotFactory, GameFactory, LobbyError};
use roomsync_protocol::{ClientMessage, Codec, JsonCodec, Room, ServerMessage, UserId};
use roomsync_transport::{Connection, ConnectionId, WebSocketConnection};
use tracing::{debug, info};

use crate::RoomsyncError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Releases the connection when its task ends, however it ends.
///
/// `Drop` is synchronous, so the lobby side runs in a spawned task.
struct ConnectionGuard<A, B, G>
where
    A: Authenticator,
    B: BotFactory,
    G: GameFactory,
{
    conn_id: ConnectionId,
    state: Arc<ServerState<A, B, G>>,
}

impl<A, B, G> Drop for ConnectionGuard<A, B, G>
where
    A: Authenticator,
    B: BotFactory,
    G: GameFactory,
{
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        self.state.hub.detach(conn_id);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.lobby.connection_lost(conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, B, G>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, B, G>>,
) -> Result<(), RoomsyncError>
where
    A: Authenticator,
    B: BotFactory,
    G: GameFactory,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    debug!(%conn_id, "handling new connection");

    let user = perform_handshake(conn.as_ref(), &state).await?;
    info!(%conn_id, user_id = %user, "client authenticated");

    state.hub.attach(Arc::clone(&conn));
    state.lobby.register(conn_id, user);
    let _guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                info!(%conn_id, user_id = %user, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                info!(%conn_id, user_id = %user, "connection idle, closing");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(%conn_id, error = %e, "failed to decode request");
                send_error(conn.as_ref(), &state.codec, 400, &format!("invalid message: {e}")).await?;
                continue;
            }
        };

        match handle_request(conn_id, &state, user, msg).await {
            Ok(Some(reply)) => send(conn.as_ref(), &state.codec, &reply).await?,
            Ok(None) => {}
            Err(e) => {
                debug!(%conn_id, user_id = %user, code = e.code(), error = %e, "request refused");
                send_error(conn.as_ref(), &state.codec, e.code(), &e.to_string()).await?;
            }
        }
    }

    // _guard drops here and releases the seat.
    Ok(())
}

/// Receives the handshake, checks it, and answers with `handshake-ack`.
async fn perform_handshake<A, B, G>(
    conn: &WebSocketConnection,
    state: &ServerState<A, B, G>,
) -> Result<UserId, RoomsyncError>
where
    A: Authenticator,
    B: BotFactory,
    G: GameFactory,
{
    let data = match tokio::time::timeout(state.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(RoomsyncError::Handshake("connection closed before handshake".into()));
        }
        Ok(Err(e)) => return Err(RoomsyncError::Transport(e)),
        Err(_) => return Err(RoomsyncError::Handshake("handshake timed out".into())),
    };

    let (version, token) = match state.codec.decode(&data) {
        Ok(ClientMessage::Handshake { version, token }) => (version, token),
        Ok(_) => {
            send_error(conn, &state.codec, 400, "expected handshake").await?;
            return Err(RoomsyncError::Handshake("first message must be a handshake".into()));
        }
        Err(e) => {
            send_error(conn, &state.codec, 400, "expected handshake").await?;
            return Err(RoomsyncError::Protocol(e));
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(RoomsyncError::Handshake("protocol version mismatch".into()));
    }

    let user = match state.auth.authenticate(token.as_deref().unwrap_or("")).await {
        Ok(user) => user,
        Err(e) => {
            send_error(conn, &state.codec, e.code(), "unauthorized").await?;
            return Err(RoomsyncError::Lobby(e));
        }
    };

    send(
        conn,
        &state.codec,
        &ServerMessage::HandshakeAck {
            user_id: user,
            server_time: Utc::now(),
        },
    )
    .await?;
    Ok(user)
}

/// Runs one request. `Ok(None)` means nothing goes back to the client.
async fn handle_request<A, B, G>(
    conn_id: ConnectionId,
    state: &ServerState<A, B, G>,
    user: UserId,
    msg: ClientMessage,
) -> Result<Option<ServerMessage>, LobbyError>
where
    A: Authenticator,
    B: BotFactory,
    G: GameFactory,
{
    let lobby = &state.lobby;
    let reply = match msg {
        ClientMessage::Handshake { .. } => {
            return Err(LobbyError::Validation("already authenticated".into()));
        }
        ClientMessage::Heartbeat { client_time } => ServerMessage::HeartbeatAck {
            client_time,
            server_time: Utc::now(),
        },
        ClientMessage::CreateRoom {
            name,
            capacity,
            settings,
            display_name,
        } => {
            let capacity = capacity.unwrap_or(state.default_capacity);
            let room = lobby
                .create_room(conn_id, user, &name, capacity, settings, &display_name)
                .await?;
            ServerMessage::RoomState { room }
        }
        ClientMessage::JoinRoom { room_id, display_name } => ServerMessage::RoomState {
            room: lobby.join(conn_id, room_id, user, &display_name).await?,
        },
        ClientMessage::GetRoom { room_id } => ServerMessage::RoomState {
            room: lobby.room(room_id).await?,
        },
        ClientMessage::LeaveRoom { room_id } => {
            accepted("leave-room", &lobby.leave(room_id, user).await?)
        }
        ClientMessage::ToggleReady { room_id, is_ready } => {
            accepted("toggle-ready", &lobby.set_ready(room_id, user, is_ready).await?)
        }
        ClientMessage::FormTeams { room_id } => {
            accepted("form-teams", &lobby.form_teams(room_id, user).await?)
        }
        ClientMessage::RequestStart { room_id } => {
            accepted("request-start", &lobby.request_start(room_id, user).await?)
        }
        ClientMessage::PlayerDisconnectNotice { room_id } => {
            accepted("player-disconnect-notice", &lobby.disconnect(room_id, user).await?)
        }
        ClientMessage::Ack { event_id } => {
            if !lobby.dispatcher().acknowledge(event_id) {
                debug!(%conn_id, %event_id, "ack for unknown or settled event");
            }
            return Ok(None);
        }
        ClientMessage::Nack { event_id, reason } => {
            if !lobby.dispatcher().reject(event_id, reason) {
                debug!(%conn_id, %event_id, "nack for unknown or settled event");
            }
            return Ok(None);
        }
    };
    Ok(Some(reply))
}

fn accepted(action: &str, room: &Room) -> ServerMessage {
    ServerMessage::Accepted {
        action: action.to_string(),
        room_version: Some(room.version),
    }
}

async fn send(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    msg: &ServerMessage,
) -> Result<(), RoomsyncError> {
    let bytes = codec.encode(msg)?;
    conn.send(&bytes).await?;
    Ok(())
}

async fn send_error(
    conn: &WebSocketConnection,
    codec: &JsonCodec,
    code: u16,
    message: &str,
) -> Result<(), RoomsyncError> {
    send(
        conn,
        codec,
        &ServerMessage::Error {
            code,
            message: message.to_string(),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use roomsync_protocol::RoomId;

    use super::*;

    #[test]
    fn test_accepted_carries_room_version() {
        let mut room = Room::new(RoomId(1), "t", 4, Default::default(), Utc::now());
        room.version = 7;
        assert_eq!(
            accepted("toggle-ready", &room),
            ServerMessage::Accepted {
                action: "toggle-ready".into(),
                room_version: Some(7),
            }
        );
    }
}
