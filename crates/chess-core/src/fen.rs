//! Position notation codec.
//!
//! `<placement> <side> <castling> <enpassant> <halfmove> <fullmove>`

use std::fmt;
use std::str::FromStr;

use crate::error::{ChessError, ChessResult};
use crate::movegen;
use crate::position::{CastlingRights, Position};
use crate::types::{Color, Piece, PieceKind, Square};

pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

fn format_err(msg: impl Into<String>) -> ChessError {
    ChessError::Format(msg.into())
}

/// Parse position notation.
pub fn parse(text: &str) -> ChessResult<Position> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 4 || fields.len() > 6 {
        return Err(format_err(format!(
            "expected 4 to 6 fields, got {}",
            fields.len()
        )));
    }

    let mut pos = Position::empty();
    parse_placement(fields[0], &mut pos)?;

    pos.side_to_move = match fields[1] {
        "w" => Color::White,
        "b" => Color::Black,
        other => return Err(format_err(format!("invalid side to move '{other}'"))),
    };

    // The side that just moved cannot have left its own king attacked.
    let them = pos.side_to_move.opponent();
    if let Some(king) = pos.king_square(them) {
        if movegen::is_square_attacked(&pos, king, pos.side_to_move) {
            return Err(format_err(format!(
                "{them} king is in check with {} to move",
                pos.side_to_move
            )));
        }
    }

    pos.castling = parse_castling(fields[2])?;

    if fields[3] != "-" {
        let sq: Square = fields[3]
            .parse()
            .map_err(|_| format_err(format!("invalid en passant square '{}'", fields[3])))?;
        if sq.rank() != 2 && sq.rank() != 5 {
            return Err(format_err(format!(
                "en passant square {sq} is not on rank 3 or 6"
            )));
        }
        pos.en_passant = Some(sq);
    }

    if let Some(field) = fields.get(4) {
        pos.halfmove_clock = field
            .parse()
            .map_err(|_| format_err(format!("invalid halfmove clock '{field}'")))?;
    }
    if let Some(field) = fields.get(5) {
        pos.fullmove_number = field
            .parse()
            .map_err(|_| format_err(format!("invalid fullmove number '{field}'")))?;
        if pos.fullmove_number == 0 {
            return Err(format_err("fullmove number must be at least 1"));
        }
    }

    Ok(pos)
}

fn parse_placement(placement: &str, pos: &mut Position) -> ChessResult<()> {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return Err(format_err(format!("expected 8 ranks, got {}", ranks.len())));
    }

    let mut kings = [0u8; 2];
    for (i, rank_str) in ranks.iter().enumerate() {
        let rank = 7 - i as u8;
        let mut file: u8 = 0;
        for ch in rank_str.chars() {
            if let Some(run) = ch.to_digit(10) {
                if !(1..=8).contains(&run) {
                    return Err(format_err(format!("invalid empty run '{ch}' in rank {}", rank + 1)));
                }
                file += run as u8;
            } else {
                let piece = Piece::from_char(ch).ok_or_else(|| {
                    format_err(format!("unrecognized piece character '{ch}'"))
                })?;
                let sq = Square::new(file, rank).ok_or_else(|| {
                    format_err(format!("rank {} has more than 8 squares", rank + 1))
                })?;
                if piece.kind == PieceKind::King {
                    kings[piece.color as usize] += 1;
                }
                pos.set_piece(sq, Some(piece));
                file += 1;
            }
            if file > 8 {
                return Err(format_err(format!("rank {} has more than 8 squares", rank + 1)));
            }
        }
        if file != 8 {
            return Err(format_err(format!(
                "rank {} has {file} squares instead of 8",
                rank + 1
            )));
        }
    }

    if kings.iter().any(|&n| n > 1) {
        return Err(format_err("a side has more than one king"));
    }
    Ok(())
}

fn parse_castling(field: &str) -> ChessResult<CastlingRights> {
    let mut rights = CastlingRights::default();
    if field == "-" {
        return Ok(rights);
    }
    for ch in field.chars() {
        let slot = match ch {
            'K' => &mut rights.white_kingside,
            'Q' => &mut rights.white_queenside,
            'k' => &mut rights.black_kingside,
            'q' => &mut rights.black_queenside,
            _ => return Err(format_err(format!("invalid castling field '{field}'"))),
        };
        if *slot {
            return Err(format_err(format!("duplicate castling right in '{field}'")));
        }
        *slot = true;
    }
    Ok(rights)
}

/// Serialize a position to notation.
pub fn serialize(pos: &Position) -> String {
    let mut out = String::with_capacity(90);

    for rank in (0..8u8).rev() {
        let mut empty = 0u8;
        for file in 0..8usize {
            match pos.board[rank as usize * 8 + file] {
                Some(piece) => {
                    if empty > 0 {
                        out.push((b'0' + empty) as char);
                        empty = 0;
                    }
                    out.push(piece.to_char());
                }
                None => empty += 1,
            }
        }
        if empty > 0 {
            out.push((b'0' + empty) as char);
        }
        if rank > 0 {
            out.push('/');
        }
    }

    out.push(' ');
    out.push(match pos.side_to_move {
        Color::White => 'w',
        Color::Black => 'b',
    });

    out.push(' ');
    if pos.castling.is_empty() {
        out.push('-');
    } else {
        let c = &pos.castling;
        for (held, ch) in [
            (c.white_kingside, 'K'),
            (c.white_queenside, 'Q'),
            (c.black_kingside, 'k'),
            (c.black_queenside, 'q'),
        ] {
            if held {
                out.push(ch);
            }
        }
    }

    out.push(' ');
    match pos.en_passant {
        Some(sq) => out.push_str(&sq.to_string()),
        None => out.push('-'),
    }

    out.push_str(&format!(" {} {}", pos.halfmove_clock, pos.fullmove_number));
    out
}

impl FromStr for Position {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&serialize(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_matches_constant() {
        assert_eq!(serialize(&Position::initial()), INITIAL_FEN);
        assert_eq!(parse(INITIAL_FEN).unwrap(), Position::initial());
    }

    #[test]
    fn round_trip_assorted() {
        for fen in [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6 0 3",
            "4k3/8/8/8/8/8/8/4K2R b K - 17 42",
        ] {
            let pos = parse(fen).unwrap();
            assert_eq!(serialize(&pos), fen);
            assert_eq!(serialize(&parse(&serialize(&pos)).unwrap()), serialize(&pos));
        }
    }

    #[test]
    fn empty_runs_collapse() {
        let pos = parse("8/8/8/8/8/8/8/K6k w - - 0 1").unwrap();
        assert_eq!(serialize(&pos), "8/8/8/8/8/8/8/K6k w - - 0 1");
        // Split runs on input still serialize as one digit.
        let pos = parse("44/8/8/8/8/8/8/K3k3 w - - 0 1").unwrap();
        assert!(serialize(&pos).starts_with("8/"));
    }

    #[test]
    fn missing_counters_default() {
        let pos = parse("4k3/8/8/8/8/8/8/4K3 w - -").unwrap();
        assert_eq!(pos.halfmove_clock, 0);
        assert_eq!(pos.fullmove_number, 1);
    }

    #[test]
    fn rejects_bad_rank_count() {
        let err = parse("8/8/8/8/8/8/8 w - - 0 1").unwrap_err();
        assert!(matches!(err, ChessError::Format(_)));
    }

    #[test]
    fn rejects_bad_rank_width() {
        assert!(parse("9/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(parse("7/8/8/8/8/8/8/4K2k w - - 0 1").is_err());
        assert!(parse("ppppppppp/8/8/8/8/8/8/4K2k w - - 0 1").is_err());
    }

    #[test]
    fn rejects_unknown_piece_and_side() {
        assert!(parse("rnbqkbnr/ppppxppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
        assert!(parse("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR x KQkq - 0 1").is_err());
    }

    #[test]
    fn rejects_bad_auxiliary_fields() {
        assert!(parse("4k3/8/8/8/8/8/8/4K3 w KX - 0 1").is_err());
        assert!(parse("4k3/8/8/8/8/8/8/4K3 w - e4 0 1").is_err());
        assert!(parse("4k3/8/8/8/8/8/8/4K3 w - - x 1").is_err());
        assert!(parse("4k3/8/8/8/8/8/8/4K3 w - - 0 0").is_err());
        assert!(parse("4k3/8/8/8/8/8/8/3KK3 w - - 0 1").is_err());
    }

    #[test]
    fn rejects_opponent_left_in_check() {
        let err = parse("4k3/8/8/8/8/8/8/4R1K1 w - - 0 1").unwrap_err();
        assert!(matches!(err, ChessError::Format(ref msg) if msg.contains("black king")));
        // Same placement with the checked side to move is fine.
        assert!(parse("4k3/8/8/8/8/8/8/4R1K1 b - - 0 1").is_ok());
    }
}
