use crate::rules::Rules;

use super::super::{MoveList, Piece, Position, Square};

impl Position {
    pub(super) fn generate_knight_moves(&self, rules: &Rules, from: Square, moves: &mut MoveList) {
        let own = self.occupied_by(self.side_to_move);
        let targets = rules.attacks().knight(from) & !own;

        for to in targets.iter() {
            self.push_simple_move(Piece::Knight, from, to, moves);
        }
    }
}
