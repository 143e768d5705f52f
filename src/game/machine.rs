//! Match lifecycle as an explicit transition table.
//!
//! [`transition`] is pure: it maps the current state and one event to the next
//! state plus the effects the match task must carry out. Nothing here touches
//! timers or queues, so every rule can be tested directly.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::board::Color;
use crate::chess::Status;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchState {
    Initializing,
    InProgress,
    Finished,
    Interrupted,
}

impl MatchState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, MatchState::Finished | MatchState::Interrupted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWon,
    BlackWon,
    Draw,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Checkmate,
    Stalemate,
    Resignation,
    Flagged,
    TimedOut,
    Aborted,
    DrawAgreed,
    InsufficientMaterial,
    ThreefoldRepetition,
    FivefoldRepetition,
    FiftyMoveRule,
    SeventyFiveMoveRule,
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Outcome {
    pub result: GameResult,
    pub status: ResultStatus,
}

impl Outcome {
    #[must_use]
    pub const fn win(winner: Color, status: ResultStatus) -> Self {
        let result = match winner {
            Color::White => GameResult::WhiteWon,
            Color::Black => GameResult::BlackWon,
        };
        Self { result, status }
    }

    #[must_use]
    pub const fn draw(status: ResultStatus) -> Self {
        Self {
            result: GameResult::Draw,
            status,
        }
    }

    #[must_use]
    pub const fn aborted() -> Self {
        Self {
            result: GameResult::Interrupted,
            status: ResultStatus::Aborted,
        }
    }

    /// Outcome of a position the rules ended automatically, where `mover`
    /// made the last move. `None` while the game goes on.
    #[must_use]
    pub fn from_status(status: Status, mover: Color) -> Option<Self> {
        let draw = |s| Some(Outcome::draw(s));
        match status {
            Status::Ongoing => None,
            Status::Checkmate => Some(Outcome::win(mover, ResultStatus::Checkmate)),
            Status::Stalemate => draw(ResultStatus::Stalemate),
            Status::SeventyFiveMoveRule => draw(ResultStatus::SeventyFiveMoveRule),
            Status::FivefoldRepetition => draw(ResultStatus::FivefoldRepetition),
            Status::InsufficientMaterial => draw(ResultStatus::InsufficientMaterial),
            Status::ThreefoldRepetition => draw(ResultStatus::ThreefoldRepetition),
            Status::FiftyMoveRule => draw(ResultStatus::FiftyMoveRule),
        }
    }

    /// Interrupted results leave the match interrupted, everything else
    /// finishes it.
    #[must_use]
    pub const fn state(&self) -> MatchState {
        match self.result {
            GameResult::Interrupted => MatchState::Interrupted,
            _ => MatchState::Finished,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} by {:?}", self.result, self.status)
    }
}

/// Named actions on a match's clock and timeout timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    StartFirstMove(Color),
    StopFirstMove(Color),
    StartReconnect(Color),
    StopReconnect(Color),
    StartClock,
    PauseClock,
    ToggleClock,
    ResetClock,
    AddTime(Color, Duration),
    /// Reset the clock and disarm every timeout.
    StopAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchEvent {
    Started,
    /// A move was applied; `ply` counts it. `outcome` is set when the move
    /// ended the game.
    MovePlayed {
        ply: u32,
        outcome: Option<Outcome>,
    },
    ClockExpired(Color),
    FirstMoveTimeout(Color),
    ReconnectTimeout(Color),
    AbortRequested {
        by: Color,
        ply: u32,
    },
    Resigned {
        by: Color,
        ply: u32,
    },
    DrawAccepted,
    FinishRequested(Outcome),
    TimerAction {
        action: TimerAction,
        ply: u32,
    },
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ArmFirstMove(Color),
    DisarmFirstMove(Color),
    ToggleClock,
    Apply(TimerAction),
    Finish(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: MatchState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: MatchState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to(next: MatchState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn finish(outcome: Outcome) -> Self {
        Self::to(outcome.state(), vec![Effect::Finish(outcome)])
    }

    /// The outcome this transition ends the match with, if any.
    #[must_use]
    pub fn outcome(&self) -> Option<Outcome> {
        self.effects.iter().find_map(|e| match e {
            Effect::Finish(o) => Some(*o),
            _ => None,
        })
    }
}

/// Before either side has really committed, an abort or resignation only
/// interrupts the match. `black_limit` is the last ply at which Black still
/// counts as not committed.
fn is_early(by: Color, ply: u32, black_limit: u32) -> bool {
    match by {
        Color::White => ply <= 1,
        Color::Black => ply <= black_limit,
    }
}

#[must_use]
pub fn transition(state: MatchState, event: &MatchEvent) -> Transition {
    use MatchState::{InProgress, Initializing};

    if state.is_terminal() {
        return Transition::stay(state);
    }

    match (state, event) {
        (_, MatchEvent::Cancelled) => Transition::finish(Outcome::aborted()),

        (Initializing, MatchEvent::Started) => {
            Transition::to(InProgress, vec![Effect::ArmFirstMove(Color::White)])
        }
        (Initializing, _) => Transition::stay(state),

        (InProgress, MatchEvent::Started) => Transition::stay(state),
        (InProgress, MatchEvent::MovePlayed { outcome: Some(o), .. }) => Transition::finish(*o),
        (InProgress, MatchEvent::MovePlayed { ply, outcome: None }) => {
            let effects = match ply {
                0 => Vec::new(),
                1 => vec![
                    Effect::DisarmFirstMove(Color::White),
                    Effect::ArmFirstMove(Color::Black),
                ],
                2 => vec![Effect::DisarmFirstMove(Color::Black), Effect::ToggleClock],
                _ => vec![Effect::ToggleClock],
            };
            Transition::to(InProgress, effects)
        }
        (InProgress, MatchEvent::ClockExpired(color)) => {
            Transition::finish(Outcome::win(color.opponent(), ResultStatus::Flagged))
        }
        (InProgress, MatchEvent::FirstMoveTimeout(_)) => Transition::finish(Outcome::aborted()),
        (InProgress, MatchEvent::ReconnectTimeout(color)) => {
            Transition::finish(Outcome::win(color.opponent(), ResultStatus::TimedOut))
        }
        (InProgress, MatchEvent::AbortRequested { by, ply }) => {
            if is_early(*by, *ply, 2) {
                Transition::finish(Outcome::aborted())
            } else {
                Transition::finish(Outcome::win(by.opponent(), ResultStatus::Aborted))
            }
        }
        (InProgress, MatchEvent::Resigned { by, ply }) => {
            if is_early(*by, *ply, 1) {
                Transition::finish(Outcome::aborted())
            } else {
                Transition::finish(Outcome::win(by.opponent(), ResultStatus::Resignation))
            }
        }
        (InProgress, MatchEvent::DrawAccepted) => {
            Transition::finish(Outcome::draw(ResultStatus::DrawAgreed))
        }
        (InProgress, MatchEvent::FinishRequested(o)) => Transition::finish(*o),
        (InProgress, MatchEvent::TimerAction { action, ply }) => match action {
            // Reconnect grace only matters once both sides have moved
            TimerAction::StartReconnect(_) if *ply < 2 => Transition::stay(state),
            _ => Transition::to(InProgress, vec![Effect::Apply(*action)]),
        },

        (MatchState::Finished | MatchState::Interrupted, _) => Transition::stay(state),
    }
}
