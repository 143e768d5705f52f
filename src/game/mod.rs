//! Live matches: time controls, the transition table and the per-match task.

mod actor;
mod handle;
mod machine;
mod time_control;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use actor::{Match, MatchOutlet, MatchSetup, MatchSummary};
pub use handle::{MatchHandle, PlayerCommand};
pub use machine::{
    transition, Effect, GameResult, MatchEvent, MatchState, Outcome, ResultStatus, TimerAction,
    Transition,
};
pub use time_control::{seat_players, Player, TimeCategory, TimeControl};

/// Whether a client is signed in. Guests are only paired with guests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTier {
    Guest,
    Authenticated,
}

impl AuthTier {
    /// The digit used for this tier in topic names.
    #[must_use]
    pub fn as_digit(self) -> char {
        match self {
            AuthTier::Guest => '0',
            AuthTier::Authenticated => '1',
        }
    }
}

impl fmt::Display for AuthTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_digit())
    }
}

impl FromStr for AuthTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(AuthTier::Guest),
            "1" => Ok(AuthTier::Authenticated),
            _ => Err(()),
        }
    }
}
