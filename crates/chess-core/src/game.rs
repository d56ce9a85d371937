//! Game state machine: one position history plus its outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ChessError, ChessResult};
use crate::fen;
use crate::movegen;
use crate::position::Position;
use crate::san;
use crate::types::{Color, Move};
use crate::uci::UciMove;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Active,
    Checkmate,
    Stalemate,
    Draw,
    Resigned,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GameStatus::Waiting | GameStatus::Active)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Active => "active",
            GameStatus::Checkmate => "checkmate",
            GameStatus::Stalemate => "stalemate",
            GameStatus::Draw => "draw",
            GameStatus::Resigned => "resigned",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(GameStatus::Waiting),
            "active" => Ok(GameStatus::Active),
            "checkmate" => Ok(GameStatus::Checkmate),
            "stalemate" => Ok(GameStatus::Stalemate),
            "draw" => Ok(GameStatus::Draw),
            "resigned" => Ok(GameStatus::Resigned),
            other => Err(ChessError::Format(format!("unknown game status '{other}'"))),
        }
    }
}

/// One half-move and the position it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ply {
    pub mv: Move,
    pub san: String,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct Game {
    start: Position,
    plies: Vec<Ply>,
    status: GameStatus,
    winner: Option<Color>,
}

fn require_kings(pos: &Position) -> ChessResult<()> {
    for color in [Color::White, Color::Black] {
        if pos.king_square(color).is_none() {
            return Err(ChessError::Format(format!("{color} king is missing")));
        }
    }
    Ok(())
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

impl Game {
    /// Fresh game from the standard position, waiting for a second player.
    pub fn new() -> Self {
        Self::from_position(Position::initial())
    }

    pub fn from_position(start: Position) -> Self {
        Self {
            start,
            plies: Vec::new(),
            status: GameStatus::Waiting,
            winner: None,
        }
    }

    /// Game starting from imported notation.
    pub fn import(text: &str) -> ChessResult<Self> {
        let start = fen::parse(text)?;
        require_kings(&start)?;
        Ok(Self::from_position(start))
    }

    /// Discard the history and restart from `text`. The lifecycle status is
    /// kept (a running game stays running) but re-evaluated for the new
    /// position.
    pub fn reimport(&mut self, text: &str) -> ChessResult<()> {
        let start = fen::parse(text)?;
        require_kings(&start)?;
        self.start = start;
        self.plies.clear();
        self.winner = None;
        if self.status != GameStatus::Waiting {
            self.status = GameStatus::Active;
            self.settle();
        }
        Ok(())
    }

    /// Rebuild a record from its start notation, wire move list and stored
    /// lifecycle status.
    pub fn restore(
        start_fen: &str,
        moves: &[String],
        status: GameStatus,
        winner: Option<Color>,
    ) -> ChessResult<Self> {
        let mut game = Self::import(start_fen)?;
        if status == GameStatus::Waiting {
            return Ok(game);
        }
        game.start();
        for mv in moves {
            game.apply_uci(mv)?;
        }
        // Resignations are not derivable from the moves.
        if game.status == GameStatus::Active && status == GameStatus::Resigned {
            game.status = status;
            game.winner = winner;
        }
        Ok(game)
    }

    /// Waiting → Active. Returns false if the game had already started.
    pub fn start(&mut self) -> bool {
        if self.status != GameStatus::Waiting {
            return false;
        }
        self.status = GameStatus::Active;
        self.settle();
        true
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn winner(&self) -> Option<Color> {
        self.winner
    }

    /// Winner as reported on the wire (`"white"` / `"black"`).
    pub fn result(&self) -> Option<String> {
        self.winner.map(|c| c.to_string())
    }

    pub fn start_position(&self) -> &Position {
        &self.start
    }

    /// Current position.
    pub fn position(&self) -> &Position {
        self.plies.last().map(|p| &p.position).unwrap_or(&self.start)
    }

    /// Position after `ply` half-moves (0 is the start position).
    pub fn position_at(&self, ply: usize) -> Option<&Position> {
        if ply == 0 {
            Some(&self.start)
        } else {
            self.plies.get(ply - 1).map(|p| &p.position)
        }
    }

    pub fn ply_count(&self) -> usize {
        self.plies.len()
    }

    pub fn moves_uci(&self) -> Vec<String> {
        self.plies.iter().map(|p| p.mv.to_string()).collect()
    }

    pub fn moves_san(&self) -> Vec<String> {
        self.plies.iter().map(|p| p.san.clone()).collect()
    }

    /// Legal moves for the side to move; empty unless the game is active.
    pub fn legal_moves(&self) -> Vec<Move> {
        if self.status != GameStatus::Active {
            return Vec::new();
        }
        movegen::legal_moves(self.position())
    }

    fn ensure_active(&self) -> ChessResult<()> {
        match self.status {
            GameStatus::Active => Ok(()),
            GameStatus::Waiting => Err(ChessError::NotStarted),
            terminal => Err(ChessError::GameOver(terminal)),
        }
    }

    pub fn apply_move(&mut self, mv: Move) -> ChessResult<&Ply> {
        self.ensure_active()?;
        let before = *self.position();
        let position = movegen::apply_move(&before, mv)?;
        let san = san::to_san(&before, mv);
        self.plies.push(Ply { mv, san, position });
        self.settle();
        Ok(&self.plies[self.plies.len() - 1])
    }

    /// Parse wire notation and apply it.
    pub fn apply_uci(&mut self, text: &str) -> ChessResult<&Ply> {
        self.ensure_active()?;
        let mv = text.parse::<UciMove>()?.to_move(self.position())?;
        self.apply_move(mv)
    }

    /// `color` gives up; the opponent wins.
    pub fn resign(&mut self, color: Color) -> ChessResult<()> {
        self.ensure_active()?;
        self.status = GameStatus::Resigned;
        self.winner = Some(color.opponent());
        Ok(())
    }

    /// Derive the outcome of the current position.
    fn settle(&mut self) {
        let pos = *self.position();
        if movegen::legal_moves(&pos).is_empty() {
            if movegen::in_check(&pos) {
                self.status = GameStatus::Checkmate;
                self.winner = Some(pos.side_to_move.opponent());
            } else {
                self.status = GameStatus::Stalemate;
            }
        } else if movegen::is_insufficient_material(&pos) {
            self.status = GameStatus::Draw;
        }
    }
}
