//! Wire move notation: `e2e4`, `e7e8q`.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ChessError, ChessResult};
use crate::movegen;
use crate::position::Position;
use crate::types::{Move, PieceKind, Square};

fn uci_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-h][1-8])([a-h][1-8])([qrbn])?$").unwrap())
}

/// A move as it travels over the wire: coordinates plus optional promotion,
/// without the move flag (that is recovered from the position).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UciMove {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceKind>,
}

impl UciMove {
    pub fn new(from: Square, to: Square, promotion: Option<PieceKind>) -> Self {
        Self { from, to, promotion }
    }

    /// Resolve against `pos`, failing when no legal move matches.
    pub fn to_move(&self, pos: &Position) -> ChessResult<Move> {
        movegen::find_legal(pos, self.from, self.to, self.promotion)
            .ok_or_else(|| ChessError::IllegalMove(self.to_string()))
    }
}

impl From<Move> for UciMove {
    fn from(mv: Move) -> Self {
        Self {
            from: mv.from,
            to: mv.to,
            promotion: mv.promotion,
        }
    }
}

impl FromStr for UciMove {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = uci_re()
            .captures(s.trim())
            .ok_or_else(|| ChessError::Format(format!("invalid move notation '{s}'")))?;
        let from: Square = caps[1].parse()?;
        let to: Square = caps[2].parse()?;
        let promotion = caps
            .get(3)
            .and_then(|m| m.as_str().chars().next())
            .and_then(PieceKind::from_letter);
        Ok(Self { from, to, promotion })
    }
}

impl fmt::Display for UciMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(kind) = self.promotion {
            write!(f, "{}", kind.letter())?;
        }
        Ok(())
    }
}

impl Serialize for UciMove {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UciMove {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
