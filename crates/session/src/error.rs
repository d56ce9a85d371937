use chess_core::ChessError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("A move is already awaiting confirmation")]
    MovePending,

    #[error("Waiting for the server to resend the game state")]
    AwaitingResync,

    #[error("Not your turn")]
    NotYourTurn,

    #[error("Not connected")]
    Disconnected,

    #[error(transparent)]
    Rules(#[from] ChessError),

    /// The server answered with an `error` message.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}
