//! Zobrist hashing for chess positions.
//!
//! Provides incrementally-updatable 64-bit position hashes used for
//! repetition detection.

use rand::prelude::*;

use crate::board::{CastlingRights, Color, Piece, Square};

const ZOBRIST_SEED: u64 = 1234567890;

#[derive(Debug)]
pub struct ZobristKeys {
    // piece_keys[piece_type][color][square_index]
    piece_keys: [[[u64; 64]; 2]; 6],
    black_to_move_key: u64,
    // castling_keys[color][side] : 0=White, 1=Black; 0=Kingside, 1=Queenside
    castling_keys: [[u64; 2]; 2],
    // Only the file of the en passant target matters
    en_passant_keys: [u64; 8],
}

impl ZobristKeys {
    #[must_use]
    pub fn new() -> Self {
        // Fixed seed so hashes are reproducible across processes
        let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
        let mut piece_keys = [[[0; 64]; 2]; 6];
        let mut castling_keys = [[0; 2]; 2];
        let mut en_passant_keys = [0; 8];

        for piece in &mut piece_keys {
            for color in piece.iter_mut() {
                for key in color.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let black_to_move_key = rng.gen();

        for color in &mut castling_keys {
            for key in color.iter_mut() {
                *key = rng.gen();
            }
        }

        for key in &mut en_passant_keys {
            *key = rng.gen();
        }

        ZobristKeys {
            piece_keys,
            black_to_move_key,
            castling_keys,
            en_passant_keys,
        }
    }

    #[inline]
    #[must_use]
    pub fn piece(&self, color: Color, piece: Piece, sq: Square) -> u64 {
        self.piece_keys[piece.index()][color.index()][sq.as_index()]
    }

    #[inline]
    #[must_use]
    pub fn black_to_move(&self) -> u64 {
        self.black_to_move_key
    }

    #[inline]
    #[must_use]
    pub fn en_passant(&self, sq: Square) -> u64 {
        self.en_passant_keys[sq.file()]
    }

    /// XOR of the keys of every right present in `rights`
    #[must_use]
    pub fn castling(&self, rights: CastlingRights) -> u64 {
        let mut hash = 0;
        for color in Color::BOTH {
            if rights.has(color, true) {
                hash ^= self.castling_keys[color.index()][0];
            }
            if rights.has(color, false) {
                hash ^= self.castling_keys[color.index()][1];
            }
        }
        hash
    }
}

impl Default for ZobristKeys {
    fn default() -> Self {
        ZobristKeys::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_reproducible() {
        let a = ZobristKeys::new();
        let b = ZobristKeys::new();
        assert_eq!(
            a.piece(Color::White, Piece::King, Square(0, 4)),
            b.piece(Color::White, Piece::King, Square(0, 4))
        );
        assert_eq!(a.black_to_move(), b.black_to_move());
    }

    #[test]
    fn test_castling_key_composition() {
        let keys = ZobristKeys::new();
        let mut rights = CastlingRights::none();
        assert_eq!(keys.castling(rights), 0);
        rights.set(Color::White, true);
        let wk = keys.castling(rights);
        rights.set(Color::Black, false);
        let both = keys.castling(rights);
        let mut bq = CastlingRights::none();
        bq.set(Color::Black, false);
        assert_eq!(both, wk ^ keys.castling(bq));
    }
}
