mod kings;
mod knights;
mod pawns;
mod sliders;

use crate::rules::Rules;

use super::{Bitboard, Color, Move, MoveList, MoveParseError, Piece, Position, Square};

impl Position {
    /// Moves that obey piece movement rules but may leave the own king in check.
    #[must_use]
    pub fn generate_pseudo_moves(&self, rules: &Rules) -> MoveList {
        let mut moves = MoveList::new();
        let color = self.side_to_move;

        for from in self.pieces(color, Piece::Pawn).iter() {
            self.generate_pawn_moves(rules, from, &mut moves);
        }
        for from in self.pieces(color, Piece::Knight).iter() {
            self.generate_knight_moves(rules, from, &mut moves);
        }
        for piece in [Piece::Bishop, Piece::Rook, Piece::Queen] {
            for from in self.pieces(color, piece).iter() {
                self.generate_slider_moves(rules, from, piece, &mut moves);
            }
        }
        if let Some(from) = self.king_square(color) {
            self.generate_king_moves(rules, from, &mut moves);
        }

        moves
    }

    /// Legal moves for the side to move.
    ///
    /// Each pseudo-legal move is applied, kept if the mover's king is not
    /// attacked afterwards, and undone.
    pub fn generate_moves(&mut self, rules: &Rules) -> MoveList {
        let color = self.side_to_move;
        let pseudo_moves = self.generate_pseudo_moves(rules);
        let mut legal_moves = MoveList::new();

        for &mv in pseudo_moves.iter() {
            let info = self.make_move(rules, mv);
            if !self.is_in_check(rules, color) {
                legal_moves.push(mv);
            }
            self.unmake_move(info);
        }
        legal_moves
    }

    /// True if any piece of `attacker` attacks `sq`.
    #[must_use]
    pub fn is_square_attacked(&self, rules: &Rules, sq: Square, attacker: Color) -> bool {
        self.is_square_attacked_with(rules, sq, attacker, self.all_occupied)
    }

    /// Attack test against an explicit occupancy, used when the king itself
    /// must not block its own transit squares.
    pub(crate) fn is_square_attacked_with(
        &self,
        rules: &Rules,
        sq: Square,
        attacker: Color,
        occupancy: Bitboard,
    ) -> bool {
        let attacks = rules.attacks();

        // A pawn of `attacker` hits `sq` iff a defender pawn on `sq` would hit it back
        if !(attacks.pawn(attacker.opponent(), sq) & self.pieces(attacker, Piece::Pawn)).is_empty()
        {
            return true;
        }
        if !(attacks.knight(sq) & self.pieces(attacker, Piece::Knight)).is_empty() {
            return true;
        }
        if !(attacks.king(sq) & self.pieces(attacker, Piece::King)).is_empty() {
            return true;
        }

        let queens = self.pieces(attacker, Piece::Queen);
        let rook_like = self.pieces(attacker, Piece::Rook) | queens;
        if !(attacks.rook(sq, occupancy) & rook_like).is_empty() {
            return true;
        }
        let bishop_like = self.pieces(attacker, Piece::Bishop) | queens;
        !(attacks.bishop(sq, occupancy) & bishop_like).is_empty()
    }

    #[must_use]
    pub fn is_in_check(&self, rules: &Rules, color: Color) -> bool {
        self.king_square(color)
            .is_some_and(|king_sq| self.is_square_attacked(rules, king_sq, color.opponent()))
    }

    /// Count leaf nodes of the legal move tree to `depth`.
    pub fn perft(&mut self, rules: &Rules, depth: usize) -> u64 {
        if depth == 0 {
            return 1;
        }

        let moves = self.generate_moves(rules);
        if depth == 1 {
            return moves.len() as u64;
        }

        let mut nodes = 0;
        for &mv in moves.iter() {
            let info = self.make_move(rules, mv);
            nodes += self.perft(rules, depth - 1);
            self.unmake_move(info);
        }

        nodes
    }

    /// Resolve coordinate notation (`e2e4`, `e7e8q`) to a legal move.
    pub fn parse_uci(&mut self, rules: &Rules, uci: &str) -> Result<Move, MoveParseError> {
        if uci.len() != 4 && uci.len() != 5 {
            return Err(MoveParseError::InvalidLength { len: uci.len() });
        }
        let invalid_square = || MoveParseError::InvalidSquare {
            notation: uci.to_string(),
        };
        let square_at = |range: std::ops::Range<usize>| -> Result<Square, MoveParseError> {
            uci.get(range)
                .and_then(|s| s.parse().ok())
                .ok_or_else(invalid_square)
        };
        let from = square_at(0..2)?;
        let to = square_at(2..4)?;

        let promotion = match uci.chars().nth(4) {
            None => None,
            Some(c) => match Piece::from_char(c) {
                Some(p @ (Piece::Knight | Piece::Bishop | Piece::Rook | Piece::Queen)) => Some(p),
                _ => return Err(MoveParseError::InvalidPromotion { char: c }),
            },
        };

        self.generate_moves(rules)
            .iter()
            .copied()
            .find(|mv| mv.from() == from && mv.to() == to && mv.promotion() == promotion)
            .ok_or_else(|| MoveParseError::IllegalMove {
                notation: uci.to_string(),
            })
    }

    /// Emit a capture or quiet move depending on what stands on `to`.
    fn push_simple_move(&self, piece: Piece, from: Square, to: Square, moves: &mut MoveList) {
        if self.is_empty(to) {
            moves.push(Move::quiet(piece, from, to));
        } else {
            moves.push(Move::capture(piece, from, to));
        }
    }
}
