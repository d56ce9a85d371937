//! Standard algebraic notation for the move history.

use crate::movegen;
use crate::position::Position;
use crate::types::{Move, MoveKind, PieceKind};

/// Render `mv` (legal in `pos`) as SAN, with `+`/`#` suffixes.
pub fn to_san(pos: &Position, mv: Move) -> String {
    let mut san = match mv.kind {
        MoveKind::CastleKingside => "O-O".to_string(),
        MoveKind::CastleQueenside => "O-O-O".to_string(),
        _ => body(pos, mv),
    };

    let mut after = *pos;
    after.play_unchecked(mv);
    if movegen::in_check(&after) {
        san.push(if movegen::legal_moves(&after).is_empty() { '#' } else { '+' });
    }
    san
}

fn body(pos: &Position, mv: Move) -> String {
    let Some(piece) = pos.piece_at(mv.from) else {
        return mv.to_string();
    };
    let capture = pos.piece_at(mv.to).is_some() || mv.kind == MoveKind::EnPassant;
    let mut out = String::new();

    if piece.kind == PieceKind::Pawn {
        if capture {
            out.push((b'a' + mv.from.file()) as char);
            out.push('x');
        }
        out.push_str(&mv.to.to_string());
        if let Some(promo) = mv.promotion {
            out.push('=');
            out.push(promo.letter().to_ascii_uppercase());
        }
        return out;
    }

    out.push(piece.kind.letter().to_ascii_uppercase());

    // Other pieces of the same kind that could also reach the target.
    let rivals: Vec<Move> = movegen::legal_moves(pos)
        .into_iter()
        .filter(|m| {
            m.to == mv.to
                && m.from != mv.from
                && pos.piece_at(m.from).map(|p| p.kind) == Some(piece.kind)
        })
        .collect();
    if !rivals.is_empty() {
        let same_file = rivals.iter().any(|m| m.from.file() == mv.from.file());
        let same_rank = rivals.iter().any(|m| m.from.rank() == mv.from.rank());
        if !same_file {
            out.push((b'a' + mv.from.file()) as char);
        } else if !same_rank {
            out.push((b'1' + mv.from.rank()) as char);
        } else {
            out.push_str(&mv.from.to_string());
        }
    }

    if capture {
        out.push('x');
    }
    out.push_str(&mv.to.to_string());
    out
}
