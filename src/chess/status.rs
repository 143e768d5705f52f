use std::fmt;

use serde::{Deserialize, Serialize};

/// Termination status derived after every move.
///
/// Variants are listed in the order they are checked: a position that is
/// both checkmate and past the fifty-move threshold is checkmate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ongoing,
    Checkmate,
    Stalemate,
    SeventyFiveMoveRule,
    FivefoldRepetition,
    InsufficientMaterial,
    ThreefoldRepetition,
    FiftyMoveRule,
}

impl Status {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Status::Ongoing)
    }

    /// Every terminal status except checkmate ends the game drawn.
    #[must_use]
    pub const fn is_draw(self) -> bool {
        !matches!(self, Status::Ongoing | Status::Checkmate)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ongoing => "ongoing",
            Status::Checkmate => "checkmate",
            Status::Stalemate => "stalemate",
            Status::SeventyFiveMoveRule => "seventy-five move rule",
            Status::FivefoldRepetition => "fivefold repetition",
            Status::InsufficientMaterial => "insufficient material",
            Status::ThreefoldRepetition => "threefold repetition",
            Status::FiftyMoveRule => "fifty move rule",
        };
        f.write_str(name)
    }
}
