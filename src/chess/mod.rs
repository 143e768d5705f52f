//! Game-level wrapper around [`Position`].
//!
//! [`Chess`] owns the position, the move history and the hash history, and
//! derives the termination status after every move.
//!
//! # Examples
//! ```
//! use chess_hub::chess::{Chess, Status};
//! use chess_hub::rules::Rules;
//!
//! let mut chess = Chess::new(Rules::shared());
//! for uci in ["f2f3", "e7e5", "g2g4", "d8h4"] {
//!     chess.play_uci(uci).unwrap();
//! }
//! assert_eq!(chess.status(), Status::Checkmate);
//! ```

mod status;

use std::sync::Arc;

use crate::board::{Color, FenError, Move, MoveList, MoveParseError, Position, UnmakeInfo};
use crate::rules::Rules;

pub use status::Status;

/// A move accepted by [`Chess::play_uci`], rendered in every notation the
/// wire events need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub mv: Move,
    pub uci: String,
    pub san: String,
    pub lan: String,
    /// Position after the move
    pub fen: String,
    /// The side to move is in check after the move
    pub check: bool,
}

#[derive(Debug, Clone)]
pub struct Chess {
    rules: Arc<Rules>,
    position: Position,
    history: Vec<UnmakeInfo>,
    /// Hash of every position reached, starting with the initial one
    hashes: Vec<u64>,
    legal_moves: MoveList,
    status: Status,
}

impl Chess {
    /// A game from the standard starting position.
    #[must_use]
    pub fn new(rules: Arc<Rules>) -> Self {
        let position = Position::new(&rules);
        Self::with_position(rules, position)
    }

    pub fn from_fen(rules: Arc<Rules>, fen: &str) -> Result<Self, FenError> {
        let position = Position::try_from_fen(&rules, fen)?;
        Ok(Self::with_position(rules, position))
    }

    fn with_position(rules: Arc<Rules>, position: Position) -> Self {
        let mut chess = Chess {
            rules,
            hashes: vec![position.hash()],
            position,
            history: Vec::new(),
            legal_moves: MoveList::new(),
            status: Status::Ongoing,
        };
        chess.refresh();
        chess
    }

    /// Parse coordinate notation against the legal moves and play it.
    pub fn play_uci(&mut self, uci: &str) -> Result<PlayedMove, MoveParseError> {
        let mv = self.position.parse_uci(&self.rules, uci)?;
        let san = self.position.move_to_san(&self.rules, mv);
        let lan = self.position.move_to_lan(&self.rules, mv);
        self.play(mv)?;
        Ok(PlayedMove {
            mv,
            uci: mv.to_string(),
            san,
            lan,
            fen: self.position.to_fen(),
            check: self.in_check(),
        })
    }

    /// Play a move taken from [`Chess::legal_moves`].
    ///
    /// Moves not in the current legal list are rejected and the game is left
    /// untouched.
    pub fn play(&mut self, mv: Move) -> Result<(), MoveParseError> {
        if !self.legal_moves.contains(mv) {
            return Err(MoveParseError::IllegalMove {
                notation: mv.to_string(),
            });
        }
        let info = self.position.make_move(&self.rules, mv);
        self.history.push(info);
        self.hashes.push(self.position.hash());
        self.refresh();
        Ok(())
    }

    /// Take back the last move, returning it.
    pub fn undo(&mut self) -> Option<Move> {
        let info = self.history.pop()?;
        self.hashes.pop();
        self.position.unmake_move(info);
        self.refresh();
        Some(info.mv())
    }

    /// Occurrences of the current position within the reversible window,
    /// counting the current one.
    #[must_use]
    pub fn repetition_count(&self) -> usize {
        let Some((&current, earlier)) = self.hashes.split_last() else {
            return 0;
        };
        let window = (self.position.halfmove_clock() as usize).min(earlier.len());

        // Same side to move only: look back two plies at a time
        1 + earlier
            .iter()
            .rev()
            .take(window)
            .skip(1)
            .step_by(2)
            .filter(|&&h| h == current)
            .count()
    }

    fn refresh(&mut self) {
        self.legal_moves = self.position.generate_moves(&self.rules);
        self.status = self.derive_status();
    }

    fn derive_status(&self) -> Status {
        let in_check = self.in_check();
        if self.legal_moves.is_empty() {
            return if in_check {
                Status::Checkmate
            } else {
                Status::Stalemate
            };
        }

        let halfmoves = self.position.halfmove_clock();
        let repetitions = self.repetition_count();
        if halfmoves >= 150 {
            Status::SeventyFiveMoveRule
        } else if repetitions >= 5 {
            Status::FivefoldRepetition
        } else if self.position.is_insufficient_material() {
            Status::InsufficientMaterial
        } else if repetitions >= 3 {
            Status::ThreefoldRepetition
        } else if halfmoves >= 100 {
            Status::FiftyMoveRule
        } else {
            Status::Ongoing
        }
    }

    #[must_use]
    pub fn legal_moves(&self) -> &MoveList {
        &self.legal_moves
    }

    /// Legal moves in coordinate notation, the form sent to clients.
    #[must_use]
    pub fn legal_moves_uci(&self) -> Vec<String> {
        self.legal_moves.iter().map(Move::to_string).collect()
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves played so far, oldest first.
    pub fn history(&self) -> impl Iterator<Item = Move> + '_ {
        self.history.iter().map(UnmakeInfo::mv)
    }

    #[must_use]
    pub fn fen(&self) -> String {
        self.position.to_fen()
    }

    #[must_use]
    pub fn ply(&self) -> u32 {
        self.position.ply()
    }

    #[must_use]
    pub fn turn(&self) -> Color {
        self.position.side_to_move()
    }

    #[must_use]
    pub fn in_check(&self) -> bool {
        self.position.is_in_check(&self.rules, self.turn())
    }

    #[must_use]
    pub fn position(&self) -> &Position {
        &self.position
    }

    #[must_use]
    pub fn rules(&self) -> &Arc<Rules> {
        &self.rules
    }
}
