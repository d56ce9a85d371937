//! Multiplayer wire messages shared by the server and the client session.
//!
//! JSON objects tagged by `type` in snake_case.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::GameStatus;
use crate::types::Color;
use crate::uci::UciMove;

/// Server → client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full authoritative snapshot; sent on connect and on `request_state`.
    GameState {
        id: Uuid,
        fen: String,
        moves: Vec<String>,
        ply: usize,
        status: GameStatus,
        result: Option<String>,
        legal_moves: Vec<UciMove>,
        white_connected: bool,
        black_connected: bool,
    },
    MoveMade {
        #[serde(rename = "move")]
        mv: UciMove,
        san: String,
        fen: String,
        moves: Vec<String>,
        ply: usize,
        status: GameStatus,
        result: Option<String>,
        legal_moves: Vec<UciMove>,
    },
    PlayerJoined {
        color: Color,
        fen: String,
        status: GameStatus,
        legal_moves: Vec<UciMove>,
    },
    GameOver {
        status: GameStatus,
        result: Option<String>,
    },
    Error {
        message: String,
    },
}

/// Client → server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    MakeMove {
        #[serde(rename = "move")]
        mv: UciMove,
        secret: Uuid,
        /// Ply count the move was made against; a stale value is a conflict.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ply: Option<usize>,
    },
    Resign {
        secret: Uuid,
    },
    RequestState,
}
