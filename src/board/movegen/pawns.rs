use crate::rules::Rules;

use super::super::{Color, Move, MoveList, Piece, Position, Square, PROMOTION_PIECES};

/// One rank towards the promotion rank, if still on the board
fn step(color: Color, rank: usize) -> Option<usize> {
    match color {
        Color::White => (rank < 7).then(|| rank + 1),
        Color::Black => rank.checked_sub(1),
    }
}

impl Position {
    pub(super) fn generate_pawn_moves(&self, rules: &Rules, from: Square, moves: &mut MoveList) {
        let color = self.side_to_move;
        let promotion_rank = color.pawn_promotion_rank();

        if let Some(forward_rank) = step(color, from.rank()) {
            let forward = Square(forward_rank, from.file());
            if self.is_empty(forward) {
                if forward_rank == promotion_rank {
                    for promo in PROMOTION_PIECES {
                        moves.push(Move::new_promotion(from, forward, promo));
                    }
                } else {
                    moves.push(Move::quiet(Piece::Pawn, from, forward));
                    if from.rank() == color.pawn_start_rank() {
                        if let Some(double_rank) = step(color, forward_rank) {
                            let double = Square(double_rank, from.file());
                            if self.is_empty(double) {
                                moves.push(Move::double_pawn_push(from, double));
                            }
                        }
                    }
                }
            }
        }

        let captures = rules.attacks().pawn(color, from);
        let enemies = self.occupied_by(color.opponent());
        for to in (captures & enemies).iter() {
            if to.rank() == promotion_rank {
                for promo in PROMOTION_PIECES {
                    moves.push(Move::new_promotion_capture(from, to, promo));
                }
            } else {
                moves.push(Move::capture(Piece::Pawn, from, to));
            }
        }

        if let Some(ep) = self.en_passant_target {
            if captures.contains(ep) {
                moves.push(Move::en_passant(from, ep));
            }
        }
    }
}
