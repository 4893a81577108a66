//! Integration tests for the server, handler, and hub over real sockets.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomsync::prelude::*;
use roomsync::PROTOCOL_VERSION;
use serde_json::json;
use tokio_tungstenite::tungstenite::Message;

/// Accepts any numeric token as a user id.
struct TestAuth;

impl Authenticator for TestAuth {
    async fn authenticate(&self, token: &str) -> Result<UserId, LobbyError> {
        let id: u64 = token
            .parse()
            .map_err(|_| LobbyError::Unauthorized("not a number".into()))?;
        Ok(UserId(id))
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = SyncServer::builder()
        .bind("127.0.0.1:0")
        .build(TestAuth)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Next data frame from the server, decoded.
async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("ws error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("decode"),
            Message::Binary(data) => return serde_json::from_slice(&data).expect("decode"),
            _ => continue,
        }
    }
}

/// Next `event` frame, skipping anything else.
async fn recv_event(ws: &mut ClientWs) -> Envelope {
    loop {
        if let ServerMessage::Event(envelope) = recv(ws).await {
            return envelope;
        }
    }
}

async fn handshake(ws: &mut ClientWs, user: u64) -> ServerMessage {
    send(
        ws,
        json!({"type": "handshake", "version": PROTOCOL_VERSION, "token": user.to_string()}),
    )
    .await;
    recv(ws).await
}

async fn connected(addr: &str, user: u64) -> ClientWs {
    let mut ws = connect(addr).await;
    let ack = handshake(&mut ws, user).await;
    assert!(matches!(ack, ServerMessage::HandshakeAck { user_id, .. } if user_id == UserId(user)));
    ws
}

async fn create_room(ws: &mut ClientWs, name: &str) -> Room {
    send(
        ws,
        json!({"type": "create-room", "name": name, "capacity": 4, "displayName": "ana"}),
    )
    .await;
    match recv(ws).await {
        ServerMessage::RoomState { room } => room,
        other => panic!("expected room-state, got {other:?}"),
    }
}

fn assert_error(msg: ServerMessage, expected: u16) {
    match msg {
        ServerMessage::Error { code, .. } => assert_eq!(code, expected),
        other => panic!("expected error {expected}, got {other:?}"),
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_valid_token_acks_with_user_id() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    match handshake(&mut ws, 42).await {
        ServerMessage::HandshakeAck { user_id, .. } => assert_eq!(user_id, UserId(42)),
        other => panic!("expected handshake-ack, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_version_mismatch_returns_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "handshake", "version": 999, "token": "1"})).await;
    assert_error(recv(&mut ws).await, 400);
}

#[tokio::test]
async fn test_handshake_bad_token_returns_401() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(
        &mut ws,
        json!({"type": "handshake", "version": PROTOCOL_VERSION, "token": "not-a-number"}),
    )
    .await;
    assert_error(recv(&mut ws).await, 401);
}

#[tokio::test]
async fn test_first_message_not_handshake_returns_400() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, json!({"type": "heartbeat", "clientTime": 1})).await;
    assert_error(recv(&mut ws).await, 400);
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test]
async fn test_heartbeat_echoes_client_time() {
    let addr = start_server().await;
    let mut ws = connected(&addr, 1).await;

    send(&mut ws, json!({"type": "heartbeat", "clientTime": 12345})).await;
    match recv(&mut ws).await {
        ServerMessage::HeartbeatAck { client_time, .. } => assert_eq!(client_time, 12345),
        other => panic!("expected heartbeat-ack, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_frame_reports_400_and_connection_survives() {
    let addr = start_server().await;
    let mut ws = connected(&addr, 1).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    assert_error(recv(&mut ws).await, 400);

    send(&mut ws, json!({"type": "heartbeat", "clientTime": 7})).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::HeartbeatAck { client_time: 7, .. }));
}

#[tokio::test]
async fn test_join_unknown_room_returns_404() {
    let addr = start_server().await;
    let mut ws = connected(&addr, 1).await;

    send(&mut ws, json!({"type": "join-room", "roomId": 999, "displayName": "ana"})).await;
    assert_error(recv(&mut ws).await, 404);
}

#[tokio::test]
async fn test_create_room_returns_state_with_caller_as_host() {
    let addr = start_server().await;
    let mut ws = connected(&addr, 1).await;

    let room = create_room(&mut ws, "Friday").await;
    assert_eq!(room.host_id, Some(UserId(1)));
    assert_eq!(room.capacity, 4);
    assert_eq!(room.status, RoomStatus::Waiting);
    assert!(room.is_member(UserId(1)));
}

#[tokio::test]
async fn test_create_room_without_capacity_uses_default() {
    let addr = start_server().await;
    let mut ws = connected(&addr, 1).await;

    send(&mut ws, json!({"type": "create-room", "name": "Quick", "displayName": "ana"})).await;
    match recv(&mut ws).await {
        ServerMessage::RoomState { room } => assert_eq!(room.capacity, 4),
        other => panic!("expected room-state, got {other:?}"),
    }
}

#[tokio::test]
async fn test_join_broadcasts_player_joined_to_host() {
    let addr = start_server().await;
    let mut host = connected(&addr, 1).await;
    let room = create_room(&mut host, "Friday").await;

    let mut guest = connected(&addr, 2).await;
    send(&mut guest, json!({"type": "join-room", "roomId": room.id, "displayName": "ben"})).await;
    match recv(&mut guest).await {
        ServerMessage::RoomState { room } => assert_eq!(room.members.len(), 2),
        other => panic!("expected room-state, got {other:?}"),
    }

    let envelope = recv_event(&mut host).await;
    assert_eq!(envelope.room_id, room.id);
    assert!(envelope.critical);
    match envelope.event {
        ServerEvent::PlayerJoined { player } => assert_eq!(player.user_id, UserId(2)),
        other => panic!("expected player-joined, got {other:?}"),
    }
}

#[tokio::test]
async fn test_toggle_ready_accepted_and_broadcast() {
    let addr = start_server().await;
    let mut host = connected(&addr, 1).await;
    let room = create_room(&mut host, "Friday").await;
    let mut guest = connected(&addr, 2).await;
    send(&mut guest, json!({"type": "join-room", "roomId": room.id, "displayName": "ben"})).await;
    recv(&mut guest).await;
    recv_event(&mut host).await;

    send(&mut guest, json!({"type": "toggle-ready", "roomId": room.id, "isReady": true})).await;

    // The reply and the broadcast race on the guest's socket.
    let mut accepted = None;
    let mut broadcast = None;
    while accepted.is_none() || broadcast.is_none() {
        match recv(&mut guest).await {
            ServerMessage::Accepted { action, room_version } => accepted = Some((action, room_version)),
            ServerMessage::Event(envelope) => broadcast = Some(envelope),
            other => panic!("unexpected frame {other:?}"),
        }
    }
    let (action, version) = accepted.unwrap();
    assert_eq!(action, "toggle-ready");
    assert_eq!(version, Some(room.version + 2));
    assert!(matches!(
        broadcast.unwrap().event,
        ServerEvent::ReadyChanged { player_id: UserId(2), is_ready: true, .. }
    ));

    let envelope = recv_event(&mut host).await;
    assert!(matches!(envelope.event, ServerEvent::ReadyChanged { .. }));
}

#[tokio::test]
async fn test_non_host_request_start_refused() {
    let addr = start_server().await;
    let mut host = connected(&addr, 1).await;
    let room = create_room(&mut host, "Friday").await;
    let mut guest = connected(&addr, 2).await;
    send(&mut guest, json!({"type": "join-room", "roomId": room.id, "displayName": "ben"})).await;
    recv(&mut guest).await;

    send(&mut guest, json!({"type": "request-start", "roomId": room.id})).await;
    assert_error(recv(&mut guest).await, 409);
}

#[tokio::test]
async fn test_ack_for_unknown_event_sends_nothing() {
    let addr = start_server().await;
    let mut ws = connected(&addr, 1).await;

    send(&mut ws, json!({"type": "ack", "eventId": 9999})).await;
    send(&mut ws, json!({"type": "heartbeat", "clientTime": 3})).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::HeartbeatAck { client_time: 3, .. }));
}

#[tokio::test]
async fn test_closed_connection_broadcasts_player_disconnected() {
    let addr = start_server().await;
    let mut host = connected(&addr, 1).await;
    let room = create_room(&mut host, "Friday").await;
    let mut guest = connected(&addr, 2).await;
    send(&mut guest, json!({"type": "join-room", "roomId": room.id, "displayName": "ben"})).await;
    recv(&mut guest).await;
    recv_event(&mut host).await;

    guest.close(None).await.unwrap();

    let envelope = recv_event(&mut host).await;
    assert!(matches!(
        envelope.event,
        ServerEvent::PlayerDisconnected { player_id: UserId(2) }
    ));
}

#[tokio::test]
async fn test_get_room_returns_current_state() {
    let addr = start_server().await;
    let mut host = connected(&addr, 1).await;
    let room = create_room(&mut host, "Friday").await;

    let mut observer = connected(&addr, 5).await;
    send(&mut observer, json!({"type": "get-room", "roomId": room.id})).await;
    match recv(&mut observer).await {
        ServerMessage::RoomState { room: fetched } => assert_eq!(fetched, room),
        other => panic!("expected room-state, got {other:?}"),
    }
}
