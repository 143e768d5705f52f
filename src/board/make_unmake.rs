use crate::rules::Rules;

use super::{Color, Move, Piece, Position, Square, UnmakeInfo};

impl Position {
    /// Apply a move generated for this position, returning the snapshot
    /// that `unmake_move` restores.
    ///
    /// The hash is updated incrementally: side key, old and new en passant
    /// file, changed castling rights, and every piece moved or removed.
    pub fn make_move(&mut self, rules: &Rules, mv: Move) -> UnmakeInfo {
        let info = UnmakeInfo {
            previous: *self,
            mv,
        };
        let keys = rules.zobrist();

        let color = self.side_to_move;
        let opponent = color.opponent();
        let from = mv.from();
        let to = mv.to();
        let piece = mv.piece();
        let mut hash = self.hash ^ keys.black_to_move();

        if let Some(old_ep) = self.en_passant_target.take() {
            hash ^= keys.en_passant(old_ep);
        }

        if mv.is_en_passant() {
            // The captured pawn sits behind the target square
            let captured = Square(from.rank(), to.file());
            self.remove_piece(captured, opponent, Piece::Pawn);
            hash ^= keys.piece(opponent, Piece::Pawn, captured);
        } else if mv.is_capture() {
            if let Some((_, captured)) = self.piece_at(to) {
                self.remove_piece(to, opponent, captured);
                hash ^= keys.piece(opponent, captured, to);
            }
        }

        self.remove_piece(from, color, piece);
        hash ^= keys.piece(color, piece, from);

        let placed = mv.promotion().unwrap_or(piece);
        self.set_piece(to, color, placed);
        hash ^= keys.piece(color, placed, to);

        if mv.is_castling() {
            let rank = color.back_rank();
            let (rook_from, rook_to) = if mv.is_castle_kingside() {
                (Square(rank, 7), Square(rank, 5))
            } else {
                (Square(rank, 0), Square(rank, 3))
            };
            self.remove_piece(rook_from, color, Piece::Rook);
            self.set_piece(rook_to, color, Piece::Rook);
            hash ^= keys.piece(color, Piece::Rook, rook_from);
            hash ^= keys.piece(color, Piece::Rook, rook_to);
        }

        if mv.is_double_pawn_push() {
            let ep = Square((from.rank() + to.rank()) / 2, from.file());
            self.en_passant_target = Some(ep);
            hash ^= keys.en_passant(ep);
        }

        let old_rights = self.castling_rights;
        self.castling_rights.clear_for_square(from);
        self.castling_rights.clear_for_square(to);
        if self.castling_rights != old_rights {
            hash ^= keys.castling(old_rights);
            hash ^= keys.castling(self.castling_rights);
        }

        if mv.is_irreversible() {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock += 1;
        }
        if color == Color::Black {
            self.fullmove_number += 1;
        }
        self.ply += 1;
        self.side_to_move = opponent;
        self.hash = hash;

        info
    }

    /// Restore the position saved by the matching `make_move`.
    pub fn unmake_move(&mut self, info: UnmakeInfo) {
        *self = info.previous;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_push_sets_en_passant() {
        let rules = crate::rules::for_tests();
        let mut pos = Position::new(rules);
        let mv = Move::double_pawn_push(Square(1, 4), Square(3, 4));
        pos.make_move(rules, mv);
        assert_eq!(pos.en_passant_target(), Some(Square(2, 4)));
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.ply(), 1);
        assert_eq!(pos.hash(), pos.compute_hash(rules));
    }

    #[test]
    fn test_unmake_restores_snapshot() {
        let rules = crate::rules::for_tests();
        let mut pos = Position::new(rules);
        let before = pos;
        let info = pos.make_move(rules, Move::quiet(Piece::Knight, Square(0, 6), Square(2, 5)));
        assert_ne!(pos, before);
        pos.unmake_move(info);
        assert_eq!(pos, before);
    }
}
