//! Attack patterns for leaper pieces (knights, kings, pawns).
//!
//! Each entry is derived from a single occupied square by shifting across the
//! file-boundary masks, so nothing wraps from the h-file to the a-file.

use crate::board::{Bitboard, Color, Square};

pub(super) fn knight_attacks(sq: Square) -> Bitboard {
    let b = Bitboard::from_square(sq).0;
    let not_a = !Bitboard::FILE_A.0;
    let not_ab = !(Bitboard::FILE_A.0 | Bitboard::FILE_B.0);
    let not_h = !Bitboard::FILE_H.0;
    let not_gh = !(Bitboard::FILE_G.0 | Bitboard::FILE_H.0);

    Bitboard(
        ((b << 17) & not_a)
            | ((b << 15) & not_h)
            | ((b << 10) & not_ab)
            | ((b << 6) & not_gh)
            | ((b >> 17) & not_h)
            | ((b >> 15) & not_a)
            | ((b >> 10) & not_gh)
            | ((b >> 6) & not_ab),
    )
}

pub(super) fn king_attacks(sq: Square) -> Bitboard {
    let b = Bitboard::from_square(sq);
    let row = b | b.shift_east() | b.shift_west();
    Bitboard((row.shift_north().0 | row.shift_south().0 | row.0) & !b.0)
}

pub(super) fn pawn_attacks(color: Color, sq: Square) -> Bitboard {
    let b = Bitboard::from_square(sq);
    let forward = match color {
        Color::White => b.shift_north(),
        Color::Black => b.shift_south(),
    };
    forward.shift_east() | forward.shift_west()
}
