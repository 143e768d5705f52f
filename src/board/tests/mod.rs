//! Board module tests.
//!
//! Tests are organized into separate files by category:
//! - `perft.rs` - Move generation node counts
//! - `draw.rs` - Insufficient material and counters
//! - `make_unmake.rs` - Make/unmake move correctness and hashing
//! - `edge_cases.rs` - FEN validation and special positions
//! - `proptest.rs` - Property-based tests


use crate::board::{Move, Piece, Position, Square};
use crate::rules::Rules;

pub(super) fn rules() -> &'static Rules {
    crate::rules::for_tests()
}

pub(super) fn from_fen(fen: &str) -> Position {
    Position::try_from_fen(rules(), fen).expect("test FEN must parse")
}

pub(super) fn find_move(
    pos: &mut Position,
    from: Square,
    to: Square,
    promotion: Option<Piece>,
) -> Move {
    for m in pos.generate_moves(rules()).iter() {
        if m.from() == from && m.to() == to && m.promotion() == promotion {
            return *m;
        }
    }
    panic!("Expected move not found");
}

pub(super) fn apply_uci(pos: &mut Position, uci: &str) {
    let mv = pos.parse_uci(rules(), uci).expect("uci move not legal");
    pos.make_move(rules(), mv);
}
