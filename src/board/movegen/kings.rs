use crate::rules::Rules;

use super::super::{Bitboard, Move, MoveList, Piece, Position, Square};

impl Position {
    pub(super) fn generate_king_moves(&self, rules: &Rules, from: Square, moves: &mut MoveList) {
        let color = self.side_to_move;
        let targets = rules.attacks().king(from) & !self.occupied_by(color);

        for to in targets.iter() {
            self.push_simple_move(Piece::King, from, to, moves);
        }

        let rank = color.back_rank();
        if from != Square(rank, 4) || self.castling_rights.is_empty() {
            return;
        }
        let opponent = color.opponent();
        if self.is_square_attacked(rules, from, opponent) {
            return;
        }

        // Transit squares are tested with the king lifted off the board
        let occupancy = self.all_occupied & !Bitboard::from_square(from);
        let safe = |sq: Square| !self.is_square_attacked_with(rules, sq, opponent, occupancy);
        let own_rook = |sq: Square| self.piece_at(sq) == Some((color, Piece::Rook));

        if self.castling_rights.has(color, true)
            && self.is_empty(Square(rank, 5))
            && self.is_empty(Square(rank, 6))
            && own_rook(Square(rank, 7))
            && safe(Square(rank, 5))
            && safe(Square(rank, 6))
        {
            moves.push(Move::castle_kingside(from, Square(rank, 6)));
        }

        if self.castling_rights.has(color, false)
            && self.is_empty(Square(rank, 1))
            && self.is_empty(Square(rank, 2))
            && self.is_empty(Square(rank, 3))
            && own_rook(Square(rank, 0))
            && safe(Square(rank, 3))
            && safe(Square(rank, 2))
        {
            moves.push(Move::castle_queenside(from, Square(rank, 2)));
        }
    }
}
