//! Chess board representation and rules.
//!
//! Uses bitboards with magic-indexed slider attacks for move generation.
//! Supports full chess rules including castling, en passant, and promotions.
//! Every operation that needs attack tables or hash keys takes the shared
//! [`Rules`](crate::rules::Rules) context explicitly.
//!
//! # Example
//! ```
//! use chess_hub::board::Position;
//! use chess_hub::rules::Rules;
//!
//! let rules = Rules::new();
//! let mut pos = Position::new(&rules);
//! let moves = pos.generate_moves(&rules);
//! assert_eq!(moves.len(), 20);
//! ```

mod attack_tables;
mod error;
mod fen;
mod make_unmake;
mod movegen;
mod san;
mod state;
mod types;

#[cfg(test)]
mod tests;

pub use attack_tables::AttackTables;
pub use error::{FenError, MoveParseError, SquareError};
pub use fen::START_FEN;
pub use state::{Position, UnmakeInfo};
pub use types::{Bitboard, BitboardIter, CastlingRights, Color, Move, MoveList, Piece, Square};

pub(crate) use types::{
    pop_lsb, CASTLE_BLACK_K, CASTLE_BLACK_Q, CASTLE_WHITE_K, CASTLE_WHITE_Q, PROMOTION_PIECES,
};
