//! Attack tables for move generation.
//!
//! Leaper patterns are stored per square; sliders go through magic lookup.
//! The tables are built once and owned by [`crate::rules::Rules`].

mod leapers;
mod magic;

use crate::board::{Bitboard, Color, Square};

use magic::{MagicTable, Slider};

/// Precomputed attack sets for every piece kind on every square.
#[derive(Debug)]
pub struct AttackTables {
    knight: [Bitboard; 64],
    king: [Bitboard; 64],
    pawn: [[Bitboard; 64]; 2],
    bishop: MagicTable,
    rook: MagicTable,
}

impl AttackTables {
    /// Build every table. Slider magics are searched deterministically.
    #[must_use]
    pub fn new() -> Self {
        let mut knight = [Bitboard::EMPTY; 64];
        let mut king = [Bitboard::EMPTY; 64];
        let mut pawn = [[Bitboard::EMPTY; 64]; 2];
        for idx in 0..64 {
            let sq = Square::from_index(idx);
            knight[idx] = leapers::knight_attacks(sq);
            king[idx] = leapers::king_attacks(sq);
            for color in Color::BOTH {
                pawn[color.index()][idx] = leapers::pawn_attacks(color, sq);
            }
        }

        let mut rng = magic::new_rng();
        let bishop = MagicTable::build(Slider::Bishop, &mut rng);
        let rook = MagicTable::build(Slider::Rook, &mut rng);

        AttackTables {
            knight,
            king,
            pawn,
            bishop,
            rook,
        }
    }

    #[inline]
    #[must_use]
    pub fn knight(&self, sq: Square) -> Bitboard {
        self.knight[sq.as_index()]
    }

    #[inline]
    #[must_use]
    pub fn king(&self, sq: Square) -> Bitboard {
        self.king[sq.as_index()]
    }

    /// Squares a pawn of `color` on `sq` attacks
    #[inline]
    #[must_use]
    pub fn pawn(&self, color: Color, sq: Square) -> Bitboard {
        self.pawn[color.index()][sq.as_index()]
    }

    #[inline]
    #[must_use]
    pub fn bishop(&self, sq: Square, occupancy: Bitboard) -> Bitboard {
        self.bishop.attacks(sq, occupancy)
    }

    #[inline]
    #[must_use]
    pub fn rook(&self, sq: Square, occupancy: Bitboard) -> Bitboard {
        self.rook.attacks(sq, occupancy)
    }

    #[inline]
    #[must_use]
    pub fn queen(&self, sq: Square, occupancy: Bitboard) -> Bitboard {
        self.bishop(sq, occupancy) | self.rook(sq, occupancy)
    }
}

impl Default for AttackTables {
    fn default() -> Self {
        AttackTables::new()
    }
}
