//! Standard and long algebraic notation.
//!
//! SAN is the notation used on scoresheets: "e4", "Nf3", "Bxc6+", "O-O",
//! "e8=Q#". LAN spells out both squares: "Ng1-f3", "e4xd5", "e7-e8=Q".
//!
//! # Examples
//! ```
//! use chess_hub::board::Position;
//! use chess_hub::rules::Rules;
//!
//! let rules = Rules::new();
//! let mut pos = Position::new(&rules);
//! let mv = pos.parse_uci(&rules, "g1f3").unwrap();
//! assert_eq!(pos.move_to_san(&rules, mv), "Nf3");
//! assert_eq!(pos.move_to_lan(&rules, mv), "Ng1-f3");
//! ```

use crate::rules::Rules;

use super::{Move, Piece, Position};

impl Position {
    /// Format a legal move in Standard Algebraic Notation.
    #[must_use]
    pub fn move_to_san(&self, rules: &Rules, mv: Move) -> String {
        let mut san = String::new();

        if mv.is_castling() {
            san.push_str(castle_text(mv));
        } else {
            let piece = mv.piece();
            if piece == Piece::Pawn {
                if mv.is_capture() {
                    san.push(mv.from().file_char());
                }
            } else {
                san.push(piece.to_char().to_ascii_uppercase());
                let (needs_file, needs_rank) = self.needs_disambiguation(rules, mv);
                if needs_file {
                    san.push(mv.from().file_char());
                }
                if needs_rank {
                    san.push(mv.from().rank_char());
                }
            }

            if mv.is_capture() {
                san.push('x');
            }
            san.push_str(&mv.to().to_string());
            push_promotion(&mut san, mv);
        }

        self.push_check_suffix(rules, mv, &mut san);
        san
    }

    /// Format a legal move in long algebraic notation.
    #[must_use]
    pub fn move_to_lan(&self, rules: &Rules, mv: Move) -> String {
        let mut lan = String::new();

        if mv.is_castling() {
            lan.push_str(castle_text(mv));
        } else {
            if mv.piece() != Piece::Pawn {
                lan.push(mv.piece().to_char().to_ascii_uppercase());
            }
            lan.push_str(&mv.from().to_string());
            lan.push(if mv.is_capture() { 'x' } else { '-' });
            lan.push_str(&mv.to().to_string());
            push_promotion(&mut lan, mv);
        }

        self.push_check_suffix(rules, mv, &mut lan);
        lan
    }

    /// Returns (`needs_file`, `needs_rank`) for a non-pawn move.
    fn needs_disambiguation(&self, rules: &Rules, mv: Move) -> (bool, bool) {
        let mut scratch = *self;
        let moves = scratch.generate_moves(rules);
        let rivals: Vec<Move> = moves
            .iter()
            .copied()
            .filter(|m| m.to() == mv.to() && m.piece() == mv.piece() && m.from() != mv.from())
            .collect();

        if rivals.is_empty() {
            return (false, false);
        }

        let same_file = rivals.iter().any(|m| m.from().file() == mv.from().file());
        let same_rank = rivals.iter().any(|m| m.from().rank() == mv.from().rank());

        match (same_file, same_rank) {
            (false, _) => (true, false),
            (true, false) => (false, true),
            (true, true) => (true, true),
        }
    }

    fn push_check_suffix(&self, rules: &Rules, mv: Move, out: &mut String) {
        let mut after = *self;
        after.make_move(rules, mv);
        let defender = after.side_to_move;
        if after.is_in_check(rules, defender) {
            if after.generate_moves(rules).is_empty() {
                out.push('#');
            } else {
                out.push('+');
            }
        }
    }
}

fn castle_text(mv: Move) -> &'static str {
    if mv.is_castle_kingside() {
        "O-O"
    } else {
        "O-O-O"
    }
}

fn push_promotion(out: &mut String, mv: Move) {
    if let Some(promo) = mv.promotion() {
        out.push('=');
        out.push(promo.to_char().to_ascii_uppercase());
    }
}
