//! Legal move generation.
//!
//! Pseudo-legal moves are produced per piece, then filtered by playing each
//! one on a scratch copy and rejecting those that leave the mover's king
//! attacked. `is_square_attacked` is shared by that filter and by the
//! castling rule.

use crate::error::{ChessError, ChessResult};
use crate::position::Position;
use crate::types::{Color, Move, MoveKind, Piece, PieceKind, Square};

const KNIGHT_OFFSETS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

const ROOK_DIRS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_DIRS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// True iff any piece of color `by` attacks `target`.
pub fn is_square_attacked(pos: &Position, target: Square, by: Color) -> bool {
    // A pawn attacks diagonally forward, so look one rank behind the target
    // from the attacker's point of view.
    for df in [-1, 1] {
        if let Some(sq) = target.offset(df, -by.forward()) {
            if pos.piece_at(sq) == Some(Piece::new(by, PieceKind::Pawn)) {
                return true;
            }
        }
    }

    for (df, dr) in KNIGHT_OFFSETS {
        if let Some(sq) = target.offset(df, dr) {
            if pos.piece_at(sq) == Some(Piece::new(by, PieceKind::Knight)) {
                return true;
            }
        }
    }

    for (df, dr) in KING_OFFSETS {
        if let Some(sq) = target.offset(df, dr) {
            if pos.piece_at(sq) == Some(Piece::new(by, PieceKind::King)) {
                return true;
            }
        }
    }

    ray_hits(pos, target, &ROOK_DIRS, by, PieceKind::Rook)
        || ray_hits(pos, target, &BISHOP_DIRS, by, PieceKind::Bishop)
}

/// Walk each ray from `target`; the first occupied square decides.
fn ray_hits(pos: &Position, target: Square, dirs: &[(i8, i8)], by: Color, slider: PieceKind) -> bool {
    for &(df, dr) in dirs {
        let mut cur = target;
        while let Some(next) = cur.offset(df, dr) {
            if let Some(piece) = pos.piece_at(next) {
                if piece.color == by && (piece.kind == slider || piece.kind == PieceKind::Queen) {
                    return true;
                }
                break;
            }
            cur = next;
        }
    }
    false
}

fn king_attacked(pos: &Position, color: Color) -> bool {
    match pos.king_square(color) {
        Some(king) => is_square_attacked(pos, king, color.opponent()),
        None => false,
    }
}

/// Is the side to move in check?
pub fn in_check(pos: &Position) -> bool {
    king_attacked(pos, pos.side_to_move)
}

pub fn is_checkmate(pos: &Position) -> bool {
    in_check(pos) && legal_moves(pos).is_empty()
}

pub fn is_stalemate(pos: &Position) -> bool {
    !in_check(pos) && legal_moves(pos).is_empty()
}

/// Every legal move for the side to move. Never fails; an empty result
/// means checkmate or stalemate.
pub fn legal_moves(pos: &Position) -> Vec<Move> {
    let mover = pos.side_to_move;
    pseudo_legal_moves(pos)
        .into_iter()
        .filter(|mv| {
            let mut scratch = *pos;
            scratch.play_unchecked(*mv);
            !king_attacked(&scratch, mover)
        })
        .collect()
}

/// Find the legal move matching wire coordinates.
pub fn find_legal(pos: &Position, from: Square, to: Square, promotion: Option<PieceKind>) -> Option<Move> {
    legal_moves(pos)
        .into_iter()
        .find(|mv| mv.from == from && mv.to == to && mv.promotion == promotion)
}

/// Apply a move, failing unless it is in the legal set.
pub fn apply_move(pos: &Position, mv: Move) -> ChessResult<Position> {
    if !legal_moves(pos).contains(&mv) {
        return Err(ChessError::IllegalMove(mv.to_string()));
    }
    let mut next = *pos;
    next.play_unchecked(mv);
    Ok(next)
}

/// Moves consistent with piece movement and occupancy, ignoring king safety.
pub fn pseudo_legal_moves(pos: &Position) -> Vec<Move> {
    let mut out = Vec::with_capacity(48);
    let us = pos.side_to_move;

    for (from, piece) in pos.pieces() {
        if piece.color != us {
            continue;
        }
        match piece.kind {
            PieceKind::Pawn => pawn_moves(pos, from, us, &mut out),
            PieceKind::Knight => step_moves(pos, from, us, &KNIGHT_OFFSETS, &mut out),
            PieceKind::King => {
                step_moves(pos, from, us, &KING_OFFSETS, &mut out);
                castle_moves(pos, from, us, &mut out);
            }
            PieceKind::Bishop => slide_moves(pos, from, us, &BISHOP_DIRS, &mut out),
            PieceKind::Rook => slide_moves(pos, from, us, &ROOK_DIRS, &mut out),
            PieceKind::Queen => {
                slide_moves(pos, from, us, &ROOK_DIRS, &mut out);
                slide_moves(pos, from, us, &BISHOP_DIRS, &mut out);
            }
        }
    }

    out
}

fn step_moves(pos: &Position, from: Square, us: Color, offsets: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(df, dr) in offsets {
        let Some(to) = from.offset(df, dr) else {
            continue;
        };
        match pos.piece_at(to) {
            None => out.push(Move::new(from, to, MoveKind::Normal)),
            Some(p) if p.color != us => out.push(Move::new(from, to, MoveKind::Capture)),
            Some(_) => {}
        }
    }
}

fn slide_moves(pos: &Position, from: Square, us: Color, dirs: &[(i8, i8)], out: &mut Vec<Move>) {
    for &(df, dr) in dirs {
        let mut cur = from;
        while let Some(to) = cur.offset(df, dr) {
            match pos.piece_at(to) {
                None => out.push(Move::new(from, to, MoveKind::Normal)),
                Some(p) => {
                    if p.color != us {
                        out.push(Move::new(from, to, MoveKind::Capture));
                    }
                    break;
                }
            }
            cur = to;
        }
    }
}

fn push_pawn_move(from: Square, to: Square, us: Color, kind: MoveKind, out: &mut Vec<Move>) {
    if to.rank() == us.promotion_rank() {
        for promo in PieceKind::PROMOTIONS {
            out.push(Move::promote(from, to, promo));
        }
    } else {
        out.push(Move::new(from, to, kind));
    }
}

fn pawn_moves(pos: &Position, from: Square, us: Color, out: &mut Vec<Move>) {
    let dir = us.forward();

    if let Some(one) = from.offset(0, dir) {
        if pos.piece_at(one).is_none() {
            push_pawn_move(from, one, us, MoveKind::Normal, out);
            if from.rank() == us.pawn_start_rank() {
                if let Some(two) = one.offset(0, dir) {
                    if pos.piece_at(two).is_none() {
                        out.push(Move::new(from, two, MoveKind::DoublePawnPush));
                    }
                }
            }
        }
    }

    for df in [-1, 1] {
        let Some(to) = from.offset(df, dir) else {
            continue;
        };
        match pos.piece_at(to) {
            Some(p) if p.color != us => push_pawn_move(from, to, us, MoveKind::Capture, out),
            None if pos.en_passant == Some(to) => {
                out.push(Move::new(from, to, MoveKind::EnPassant));
            }
            _ => {}
        }
    }
}

fn castle_moves(pos: &Position, king_from: Square, us: Color, out: &mut Vec<Move>) {
    let rank = us.home_rank();
    if king_from.file() != 4 || king_from.rank() != rank {
        return;
    }
    let them = us.opponent();
    if is_square_attacked(pos, king_from, them) {
        return;
    }

    // (right held, rook file, files that must be empty, king transit and landing files, flag)
    let sides = [
        (pos.castling.kingside(us), 7u8, &[5u8, 6][..], [5u8, 6], MoveKind::CastleKingside),
        (pos.castling.queenside(us), 0u8, &[1u8, 2, 3][..], [3u8, 2], MoveKind::CastleQueenside),
    ];

    for (held, rook_file, between, king_path, kind) in sides {
        if !held {
            continue;
        }
        let rook_sq = Square::new(rook_file, rank);
        let rook_home = rook_sq.and_then(|sq| pos.piece_at(sq)) == Some(Piece::new(us, PieceKind::Rook));
        if !rook_home {
            continue;
        }
        let lane_clear = between
            .iter()
            .filter_map(|&f| Square::new(f, rank))
            .all(|sq| pos.piece_at(sq).is_none());
        if !lane_clear {
            continue;
        }
        let path_safe = king_path
            .iter()
            .filter_map(|&f| Square::new(f, rank))
            .all(|sq| !is_square_attacked(pos, sq, them));
        if !path_safe {
            continue;
        }
        if let Some(to) = Square::new(king_path[1], rank) {
            out.push(Move::new(king_from, to, kind));
        }
    }
}

/// Neither side can deliver mate with the material left on the board.
pub fn is_insufficient_material(pos: &Position) -> bool {
    let mut minors: Vec<(Square, PieceKind)> = Vec::new();
    for (sq, piece) in pos.pieces() {
        match piece.kind {
            PieceKind::King => {}
            PieceKind::Knight | PieceKind::Bishop => minors.push((sq, piece.kind)),
            PieceKind::Pawn | PieceKind::Rook | PieceKind::Queen => return false,
        }
    }
    if minors.len() <= 1 {
        return true;
    }
    // Bishops only, all on one square colour.
    let all_bishops = minors.iter().all(|(_, kind)| *kind == PieceKind::Bishop);
    let light = minors[0].0.is_light();
    all_bishops && minors.iter().all(|(sq, _)| sq.is_light() == light)
}

/// Count leaf nodes of the legal move tree to `depth`.
pub fn perft(pos: &Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = legal_moves(pos);
    if depth == 1 {
        return moves.len() as u64;
    }
    moves
        .into_iter()
        .map(|mv| {
            let mut next = *pos;
            next.play_unchecked(mv);
            perft(&next, depth - 1)
        })
        .sum()
}
