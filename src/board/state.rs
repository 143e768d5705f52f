use crate::rules::Rules;

use super::{Bitboard, CastlingRights, Color, Move, Piece, Square};

/// Snapshot taken before a move is applied; restoring it undoes the move.
#[derive(Clone, Copy, Debug)]
pub struct UnmakeInfo {
    pub(crate) previous: Position,
    pub(crate) mv: Move,
}

impl UnmakeInfo {
    /// The move this snapshot undoes
    #[must_use]
    pub fn mv(&self) -> Move {
        self.mv
    }
}

/// A chess position: twelve piece bitboards plus the game-state fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    pub(crate) pieces: [[Bitboard; 6]; 2],
    pub(crate) occupied: [Bitboard; 2],
    pub(crate) all_occupied: Bitboard,
    pub(crate) side_to_move: Color,
    pub(crate) en_passant_target: Option<Square>,
    pub(crate) castling_rights: CastlingRights,
    pub(crate) halfmove_clock: u32,
    pub(crate) fullmove_number: u32,
    pub(crate) ply: u32,
    pub(crate) hash: u64,
}

impl Position {
    /// The standard starting position.
    #[must_use]
    pub fn new(rules: &Rules) -> Self {
        let mut pos = Position::empty();
        let back_rank = [
            Piece::Rook,
            Piece::Knight,
            Piece::Bishop,
            Piece::Queen,
            Piece::King,
            Piece::Bishop,
            Piece::Knight,
            Piece::Rook,
        ];
        for (i, piece) in back_rank.iter().enumerate() {
            pos.set_piece(Square(0, i), Color::White, *piece);
            pos.set_piece(Square(7, i), Color::Black, *piece);
            pos.set_piece(Square(1, i), Color::White, Piece::Pawn);
            pos.set_piece(Square(6, i), Color::Black, Piece::Pawn);
        }

        pos.castling_rights = CastlingRights::all();
        pos.hash = pos.compute_hash(rules);
        pos
    }

    pub(crate) fn empty() -> Self {
        Position {
            pieces: [[Bitboard::EMPTY; 6]; 2],
            occupied: [Bitboard::EMPTY; 2],
            all_occupied: Bitboard::EMPTY,
            side_to_move: Color::White,
            en_passant_target: None,
            castling_rights: CastlingRights::none(),
            halfmove_clock: 0,
            fullmove_number: 1,
            ply: 0,
            hash: 0,
        }
    }

    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[must_use]
    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    #[must_use]
    pub fn en_passant_target(&self) -> Option<Square> {
        self.en_passant_target
    }

    #[must_use]
    pub fn castling_rights(&self) -> CastlingRights {
        self.castling_rights
    }

    #[must_use]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[must_use]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    /// Half-moves played since the start of the game
    #[must_use]
    pub fn ply(&self) -> u32 {
        self.ply
    }

    #[inline]
    #[must_use]
    pub fn pieces(&self, color: Color, piece: Piece) -> Bitboard {
        self.pieces[color.index()][piece.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupied_by(&self, color: Color) -> Bitboard {
        self.occupied[color.index()]
    }

    #[inline]
    #[must_use]
    pub fn occupied(&self) -> Bitboard {
        self.all_occupied
    }

    #[must_use]
    pub fn piece_at(&self, sq: Square) -> Option<(Color, Piece)> {
        let bit = Bitboard::from_square(sq);
        if (self.all_occupied & bit).is_empty() {
            return None;
        }

        let color = if (self.occupied[0] & bit).is_empty() {
            Color::Black
        } else {
            Color::White
        };
        Piece::ALL
            .into_iter()
            .find(|&piece| !(self.pieces(color, piece) & bit).is_empty())
            .map(|piece| (color, piece))
    }

    #[inline]
    pub(crate) fn is_empty(&self, sq: Square) -> bool {
        !self.all_occupied.contains(sq)
    }

    /// The square of `color`'s king. A valid position always has one.
    #[inline]
    #[must_use]
    pub fn king_square(&self, color: Color) -> Option<Square> {
        self.pieces(color, Piece::King).lsb()
    }

    pub(crate) fn set_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bit = Bitboard::from_square(sq);
        self.pieces[color.index()][piece.index()] |= bit;
        self.occupied[color.index()] |= bit;
        self.all_occupied |= bit;
    }

    pub(crate) fn remove_piece(&mut self, sq: Square, color: Color, piece: Piece) {
        let bit = !Bitboard::from_square(sq);
        self.pieces[color.index()][piece.index()] &= bit;
        self.occupied[color.index()] &= bit;
        self.all_occupied &= bit;
    }

    /// Hash recomputed from scratch; equals `hash()` for every reachable position.
    #[must_use]
    pub fn compute_hash(&self, rules: &Rules) -> u64 {
        let keys = rules.zobrist();
        let mut hash: u64 = 0;

        for color in Color::BOTH {
            for piece in Piece::ALL {
                for sq in self.pieces(color, piece).iter() {
                    hash ^= keys.piece(color, piece, sq);
                }
            }
        }

        if self.side_to_move == Color::Black {
            hash ^= keys.black_to_move();
        }
        hash ^= keys.castling(self.castling_rights);
        if let Some(ep) = self.en_passant_target {
            hash ^= keys.en_passant(ep);
        }

        hash
    }

    /// No pawns, rooks or queens, and either at most one minor piece in total
    /// or exactly one bishop per side standing on same-colored squares.
    #[must_use]
    pub fn is_insufficient_material(&self) -> bool {
        let heavy_or_pawn = Color::BOTH.into_iter().any(|c| {
            !(self.pieces(c, Piece::Pawn) | self.pieces(c, Piece::Rook) | self.pieces(c, Piece::Queen))
                .is_empty()
        });
        if heavy_or_pawn {
            return false;
        }

        let minors = |c: Color| {
            (self.pieces(c, Piece::Knight) | self.pieces(c, Piece::Bishop)).popcount()
        };
        let white_minors = minors(Color::White);
        let black_minors = minors(Color::Black);

        if white_minors + black_minors <= 1 {
            return true;
        }

        if white_minors == 1 && black_minors == 1 {
            let bishops =
                self.pieces(Color::White, Piece::Bishop) | self.pieces(Color::Black, Piece::Bishop);
            if bishops.popcount() == 2 {
                return (bishops & Bitboard::LIGHT_SQUARES).is_empty()
                    || (bishops & Bitboard::DARK_SQUARES).is_empty();
            }
        }

        false
    }
}
