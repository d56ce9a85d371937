//! Chess rules engine: notation codec, legal move generation and the game
//! state machine, plus the wire protocol shared by server and client.
//!
//! Everything here is synchronous and free of shared state; `Position` is
//! `Copy` and can be handed to any thread.

pub mod error;
pub mod fen;
pub mod game;
pub mod movegen;
pub mod position;
pub mod protocol;
pub mod san;
pub mod types;
pub mod uci;

pub use error::{ChessError, ChessResult};
pub use fen::INITIAL_FEN;
pub use game::{Game, GameStatus, Ply};
pub use movegen::{apply_move, in_check, is_square_attacked, legal_moves};
pub use position::{CastlingRights, Position};
pub use types::{Color, Move, MoveKind, Piece, PieceKind, Square};
pub use uci::UciMove;
