//! Game WebSocket endpoint, driven by real socket clients.

mod common;

use std::time::Duration;

use common::{post_json, TestServer};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value as JsonValue};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn ws_url(server: &TestServer, id: &str) -> String {
    server.url(&format!("/ws/games/{id}")).replacen("http", "ws", 1)
}

async fn open(server: &TestServer, id: &str) -> Socket {
    let (socket, _) = connect_async(ws_url(server, id)).await.expect("websocket connect");
    socket
}

async fn send(socket: &mut Socket, msg: JsonValue) {
    socket
        .send(Message::text(msg.to_string()))
        .await
        .expect("websocket send");
}

/// Next text frame as JSON.
async fn next_json(socket: &mut Socket) -> JsonValue {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).expect("server sent invalid JSON");
                }
                Some(Ok(_)) => continue,
                other => panic!("socket closed: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a message")
}

async fn started_game(server: &TestServer) -> (String, String, String) {
    let (_, created) = post_json(server, "/api/games", json!({})).await;
    let id = created["id"].as_str().unwrap().to_string();
    let (_, joined) = post_json(server, &format!("/api/games/{id}/join"), json!({})).await;
    (
        id,
        created["secret"].as_str().unwrap().to_string(),
        joined["secret"].as_str().unwrap().to_string(),
    )
}

// ---- Connect ----

#[tokio::test]
async fn test_snapshot_on_connect() {
    let server = TestServer::spawn().await;
    let (id, _, _) = started_game(&server).await;

    let mut socket = open(&server, &id).await;
    let state = next_json(&mut socket).await;
    assert_eq!(state["type"], "game_state");
    assert_eq!(state["id"], id.as_str());
    assert_eq!(state["fen"], chess_core::INITIAL_FEN);
    assert_eq!(state["ply"], 0);
    assert_eq!(state["status"], "active");
    assert_eq!(state["legal_moves"].as_array().unwrap().len(), 20);
}

#[tokio::test]
async fn test_unknown_game_refused_before_upgrade() {
    let server = TestServer::spawn().await;
    let id = uuid::Uuid::new_v4().to_string();

    match connect_async(ws_url(&server, &id)).await {
        Err(WsError::Http(resp)) => assert_eq!(resp.status().as_u16(), 404),
        other => panic!("expected an HTTP 404, got {:?}", other.map(|(_, resp)| resp.status())),
    }
}

// ---- Moves ----

#[tokio::test]
async fn test_move_reaches_both_sockets() {
    let server = TestServer::spawn().await;
    let (id, white_secret, _) = started_game(&server).await;
    let mut white = open(&server, &id).await;
    let mut black = open(&server, &id).await;
    next_json(&mut white).await;
    next_json(&mut black).await;

    send(
        &mut white,
        json!({ "type": "make_move", "move": "e2e4", "secret": white_secret, "ply": 0 }),
    )
    .await;

    for socket in [&mut white, &mut black] {
        let made = next_json(socket).await;
        assert_eq!(made["type"], "move_made");
        assert_eq!(made["move"], "e2e4");
        assert_eq!(made["san"], "e4");
        assert_eq!(made["ply"], 1);
        assert_eq!(
            made["fen"],
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }
}

#[tokio::test]
async fn test_illegal_move_answered_to_sender_only() {
    let server = TestServer::spawn().await;
    let (id, white_secret, _) = started_game(&server).await;
    let mut white = open(&server, &id).await;
    let mut black = open(&server, &id).await;
    next_json(&mut white).await;
    next_json(&mut black).await;

    send(
        &mut white,
        json!({ "type": "make_move", "move": "e2e5", "secret": white_secret }),
    )
    .await;
    let err = next_json(&mut white).await;
    assert_eq!(err["type"], "error");
    assert!(err["message"].as_str().unwrap().contains("Illegal move"));

    // Black's next frame is the answer to its own request, not the error.
    send(&mut black, json!({ "type": "request_state" })).await;
    let state = next_json(&mut black).await;
    assert_eq!(state["type"], "game_state");
    assert_eq!(state["ply"], 0);
}

#[tokio::test]
async fn test_malformed_frame_gets_error() {
    let server = TestServer::spawn().await;
    let (id, _, _) = started_game(&server).await;
    let mut socket = open(&server, &id).await;
    next_json(&mut socket).await;

    socket.send(Message::text("not json")).await.unwrap();
    let err = next_json(&mut socket).await;
    assert_eq!(err["type"], "error");
    assert!(err["message"].as_str().unwrap().starts_with("Invalid message"));
}

#[tokio::test]
async fn test_resign_over_socket() {
    let server = TestServer::spawn().await;
    let (id, _, black_secret) = started_game(&server).await;
    let mut socket = open(&server, &id).await;
    next_json(&mut socket).await;

    send(&mut socket, json!({ "type": "resign", "secret": black_secret })).await;
    let over = next_json(&mut socket).await;
    assert_eq!(over["type"], "game_over");
    assert_eq!(over["status"], "resigned");
    assert_eq!(over["result"], "white");
}
