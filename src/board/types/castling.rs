//! Castling rights type.

use super::piece::Color;
use super::square::Square;

pub(crate) const CASTLE_WHITE_K: u8 = 1 << 0;
pub(crate) const CASTLE_WHITE_Q: u8 = 1 << 1;
pub(crate) const CASTLE_BLACK_K: u8 = 1 << 2;
pub(crate) const CASTLE_BLACK_Q: u8 = 1 << 3;

/// All castling rights combined
pub(crate) const ALL_CASTLING_RIGHTS: u8 =
    CASTLE_WHITE_K | CASTLE_WHITE_Q | CASTLE_BLACK_K | CASTLE_BLACK_Q;

/// Castling rights represented as a bitmask
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    /// No castling rights
    #[must_use]
    pub const fn none() -> Self {
        CastlingRights(0)
    }

    /// All castling rights (both sides can castle kingside and queenside)
    #[must_use]
    pub const fn all() -> Self {
        CastlingRights(ALL_CASTLING_RIGHTS)
    }

    /// Check if a specific castling right is set
    #[inline]
    #[must_use]
    pub const fn has(self, color: Color, kingside: bool) -> bool {
        self.0 & Self::bit_for(color, kingside) != 0
    }

    #[inline]
    pub fn set(&mut self, color: Color, kingside: bool) {
        self.0 |= Self::bit_for(color, kingside);
    }

    #[inline]
    pub fn remove(&mut self, color: Color, kingside: bool) {
        self.0 &= !Self::bit_for(color, kingside);
    }

    /// Get the raw bitmask value (for Zobrist hashing)
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Drop every right tied to a king or rook standing on `sq`.
    ///
    /// Called for both the origin and the destination of every move, so a
    /// moved king or rook and a captured rook both narrow the rights.
    #[inline]
    pub(crate) fn clear_for_square(&mut self, sq: Square) {
        self.0 &= !rights_touching(sq);
    }

    const fn bit_for(color: Color, kingside: bool) -> u8 {
        match (color, kingside) {
            (Color::White, true) => CASTLE_WHITE_K,
            (Color::White, false) => CASTLE_WHITE_Q,
            (Color::Black, true) => CASTLE_BLACK_K,
            (Color::Black, false) => CASTLE_BLACK_Q,
        }
    }
}

const fn rights_touching(sq: Square) -> u8 {
    match (sq.0, sq.1) {
        (0, 4) => CASTLE_WHITE_K | CASTLE_WHITE_Q,
        (0, 0) => CASTLE_WHITE_Q,
        (0, 7) => CASTLE_WHITE_K,
        (7, 4) => CASTLE_BLACK_K | CASTLE_BLACK_Q,
        (7, 0) => CASTLE_BLACK_Q,
        (7, 7) => CASTLE_BLACK_K,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rights_only_narrow() {
        let mut rights = CastlingRights::all();
        rights.clear_for_square(Square(0, 7));
        assert!(!rights.has(Color::White, true));
        assert!(rights.has(Color::White, false));
        rights.clear_for_square(Square(7, 4));
        assert!(!rights.has(Color::Black, true));
        assert!(!rights.has(Color::Black, false));
        rights.clear_for_square(Square(3, 3));
        assert_eq!(rights.as_u8(), CASTLE_WHITE_Q);
    }
}
