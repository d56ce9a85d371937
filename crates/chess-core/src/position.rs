//! In-memory board state and the raw (unchecked) move application.

use crate::types::{Color, Move, MoveKind, Piece, PieceKind, Square};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights {
    pub white_kingside: bool,
    pub white_queenside: bool,
    pub black_kingside: bool,
    pub black_queenside: bool,
}

impl CastlingRights {
    pub const ALL: CastlingRights = CastlingRights {
        white_kingside: true,
        white_queenside: true,
        black_kingside: true,
        black_queenside: true,
    };

    pub fn kingside(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_kingside,
            Color::Black => self.black_kingside,
        }
    }

    pub fn queenside(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_queenside,
            Color::Black => self.black_queenside,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.white_kingside || self.white_queenside || self.black_kingside || self.black_queenside)
    }

    /// Drop any right whose king or rook origin square is `sq`.
    pub fn revoke_square(&mut self, sq: Square) {
        match sq {
            Square::E1 => {
                self.white_kingside = false;
                self.white_queenside = false;
            }
            Square::H1 => self.white_kingside = false,
            Square::A1 => self.white_queenside = false,
            Square::E8 => {
                self.black_kingside = false;
                self.black_queenside = false;
            }
            Square::H8 => self.black_kingside = false,
            Square::A8 => self.black_queenside = false,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub(crate) board: [Option<Piece>; 64],
    pub side_to_move: Color,
    pub castling: CastlingRights,
    pub en_passant: Option<Square>,
    pub halfmove_clock: u32,
    pub fullmove_number: u32,
}

impl Default for Position {
    fn default() -> Self {
        Self::initial()
    }
}

impl Position {
    pub fn empty() -> Self {
        Self {
            board: [None; 64],
            side_to_move: Color::White,
            castling: CastlingRights::default(),
            en_passant: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Standard starting position.
    pub fn initial() -> Self {
        const BACK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        let mut pos = Self::empty();
        for (file, kind) in BACK.iter().enumerate() {
            let file = file as u8;
            pos.board[file as usize] = Some(Piece::new(Color::White, *kind));
            pos.board[(8 + file) as usize] = Some(Piece::new(Color::White, PieceKind::Pawn));
            pos.board[(48 + file) as usize] = Some(Piece::new(Color::Black, PieceKind::Pawn));
            pos.board[(56 + file) as usize] = Some(Piece::new(Color::Black, *kind));
        }
        pos.castling = CastlingRights::ALL;
        pos
    }

    #[inline]
    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.board[sq.index()]
    }

    pub fn set_piece(&mut self, sq: Square, piece: Option<Piece>) {
        self.board[sq.index()] = piece;
    }

    pub fn pieces(&self) -> impl Iterator<Item = (Square, Piece)> + '_ {
        Square::all().filter_map(move |sq| self.piece_at(sq).map(|p| (sq, p)))
    }

    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces()
            .find(|(_, p)| p.color == color && p.kind == PieceKind::King)
            .map(|(sq, _)| sq)
    }

    /// Play `mv` without checking legality and update every bookkeeping
    /// field (clocks, en-passant target, castling rights, side to move).
    pub(crate) fn play_unchecked(&mut self, mv: Move) {
        let Some(moving) = self.piece_at(mv.from) else {
            return;
        };
        let color = moving.color;
        let captured = self.piece_at(mv.to);

        self.board[mv.from.index()] = None;
        match mv.kind {
            MoveKind::EnPassant => {
                // The captured pawn sits beside the mover, not on the target.
                if let Some(victim) = Square::new(mv.to.file(), mv.from.rank()) {
                    self.board[victim.index()] = None;
                }
                self.board[mv.to.index()] = Some(moving);
            }
            MoveKind::CastleKingside | MoveKind::CastleQueenside => {
                let rank = color.home_rank();
                let (rook_from, rook_to) = if mv.kind == MoveKind::CastleKingside {
                    (7, 5)
                } else {
                    (0, 3)
                };
                let rook_from = Square::new(rook_from, rank).unwrap_or(mv.to);
                let rook_to = Square::new(rook_to, rank).unwrap_or(mv.to);
                let rook = self.board[rook_from.index()].take();
                self.board[rook_to.index()] = rook;
                self.board[mv.to.index()] = Some(moving);
            }
            _ => {
                let placed = match mv.promotion {
                    Some(kind) => Piece::new(color, kind),
                    None => moving,
                };
                self.board[mv.to.index()] = Some(placed);
            }
        }

        let is_capture = captured.is_some() || mv.kind == MoveKind::EnPassant;
        if moving.kind == PieceKind::Pawn || is_capture {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }

        self.en_passant = if mv.kind == MoveKind::DoublePawnPush {
            mv.from.offset(0, color.forward())
        } else {
            None
        };

        self.castling.revoke_square(mv.from);
        self.castling.revoke_square(mv.to);

        if color == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }
        self.side_to_move = color.opponent();
    }
}
