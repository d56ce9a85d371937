//! Rules engine error types

use thiserror::Error;

use crate::game::GameStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChessError {
    /// Malformed position or move notation.
    #[error("Invalid notation: {0}")]
    Format(String),

    /// Move is not in the legal set for the side to move.
    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Game is over ({0})")]
    GameOver(GameStatus),

    #[error("Game has not started")]
    NotStarted,
}

pub type ChessResult<T> = Result<T, ChessError>;
