//! GET /ws/games/{game_id}
//!
//! Each socket gets a `game_state` snapshot on connect, then every message
//! broadcast for the game. Failures of its own requests come back as `error`
//! messages to that socket only.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::Path,
    response::IntoResponse,
    Extension,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use uuid::Uuid;

use chess_core::protocol::{ClientMessage, ServerMessage};

use crate::error::AppError;
use crate::hub::GameHub;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(hub): Extension<GameHub>,
    Path(game_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // Subscribing also rejects unknown games before the upgrade.
    let updates = hub.subscribe(game_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, game_id, updates)))
}

async fn handle_socket(
    socket: WebSocket,
    hub: GameHub,
    game_id: Uuid,
    updates: broadcast::Receiver<ServerMessage>,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    tracing::info!(game_id = %game_id, "Socket connected");

    // Sole writer to the socket, so replies and broadcasts never interleave mid-frame.
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("Failed to encode server message: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let initial = hub
        .snapshot(game_id)
        .await
        .unwrap_or_else(|e| ServerMessage::Error { message: e.to_string() });
    let _ = tx.send(initial);

    let forwarder = tokio::spawn(forward_updates(hub.clone(), game_id, updates, tx.clone()));

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        let outcome = match serde_json::from_str::<ClientMessage>(text.as_str()) {
            Ok(request) => {
                tracing::debug!(game_id = %game_id, ?request, "Client message");
                hub.handle_client_message(game_id, request).await
            }
            Err(e) => Err(AppError::BadRequest(format!("Invalid message: {e}"))),
        };

        let reply = match outcome {
            Ok(Some(reply)) => reply,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(game_id = %game_id, "Rejected client message: {e}");
                ServerMessage::Error { message: e.to_string() }
            }
        };
        if tx.send(reply).is_err() {
            break;
        }
    }

    forwarder.abort();
    // The aborted task owns this socket's receiver; wait until it is dropped.
    let _ = forwarder.await;
    writer.abort();
    hub.release(game_id).await;
    tracing::info!(game_id = %game_id, "Socket disconnected");
}

/// Relay the game's broadcasts. A receiver that fell behind gets a fresh
/// snapshot in place of the messages it missed.
async fn forward_updates(
    hub: GameHub,
    game_id: Uuid,
    mut updates: broadcast::Receiver<ServerMessage>,
    tx: mpsc::UnboundedSender<ServerMessage>,
) {
    loop {
        let msg = match updates.recv().await {
            Ok(msg) => msg,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(game_id = %game_id, skipped, "Socket lagged, resending state");
                match hub.snapshot(game_id).await {
                    Ok(state) => state,
                    Err(_) => break,
                }
            }
            Err(RecvError::Closed) => break,
        };
        if tx.send(msg).is_err() {
            break;
        }
    }
}
