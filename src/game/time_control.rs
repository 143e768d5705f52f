use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::board::Color;
use crate::config::CategoryThresholds;
use crate::error::GameError;

/// Base time and per-move increment, both in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeControl {
    pub clock: u32,
    pub increment: u32,
}

impl TimeControl {
    #[must_use]
    pub const fn new(clock: u32, increment: u32) -> Self {
        Self { clock, increment }
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if self.clock == 0 {
            return Err(GameError::InvalidTimeControl {
                reason: format!("clock must be > 0, got {self}"),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn clock_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.clock))
    }

    #[must_use]
    pub fn increment_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.increment))
    }

    /// Estimated game length in seconds over `moves` moves per side.
    #[must_use]
    pub fn estimated_secs(&self, moves: u32) -> u32 {
        self.clock.saturating_add(self.increment.saturating_mul(moves))
    }

    #[must_use]
    pub fn category(&self, thresholds: &CategoryThresholds, moves: u32) -> TimeCategory {
        let secs = self.estimated_secs(moves);
        if secs < thresholds.bullet {
            TimeCategory::Hyperbullet
        } else if secs < thresholds.blitz {
            TimeCategory::Bullet
        } else if secs < thresholds.rapid {
            TimeCategory::Blitz
        } else if secs < thresholds.classical {
            TimeCategory::Rapid
        } else {
            TimeCategory::Classical
        }
    }
}

/// `180+2`
impl fmt::Display for TimeControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.clock, self.increment)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeCategory {
    Hyperbullet,
    Bullet,
    Blitz,
    Rapid,
    Classical,
}

/// A seated participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub color: Color,
}

impl Player {
    #[must_use]
    pub const fn new(id: Uuid, color: Color) -> Self {
        Self { id, color }
    }
}

/// Check a pairing before a match is built from it.
///
/// Returns the players ordered white, black.
pub fn seat_players(a: Player, b: Player) -> Result<[Player; 2], GameError> {
    let invalid = |reason: &str| GameError::InvalidPlayers {
        reason: reason.to_string(),
    };
    if a.id.is_nil() || b.id.is_nil() {
        return Err(invalid("player id must not be nil"));
    }
    if a.id == b.id {
        return Err(invalid("players must be distinct"));
    }
    if a.color == b.color {
        return Err(invalid("players must have different colors"));
    }
    Ok(if a.color == Color::White { [a, b] } else { [b, a] })
}
