use crate::rules::Rules;

use super::super::{MoveList, Piece, Position, Square};

impl Position {
    /// Bishop, rook and queen moves through the magic tables.
    pub(super) fn generate_slider_moves(
        &self,
        rules: &Rules,
        from: Square,
        piece: Piece,
        moves: &mut MoveList,
    ) {
        let attacks = rules.attacks();
        let occupancy = self.all_occupied;
        let reach = match piece {
            Piece::Bishop => attacks.bishop(from, occupancy),
            Piece::Rook => attacks.rook(from, occupancy),
            _ => attacks.queen(from, occupancy),
        };
        let targets = reach & !self.occupied_by(self.side_to_move);

        for to in targets.iter() {
            self.push_simple_move(piece, from, to, moves);
        }
    }
}
