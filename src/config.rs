use std::time::Duration;

use crate::error::HubError;
use crate::game::TimeControl;

/// Seconds-per-game boundaries between time categories. A game's estimated
/// duration is `clock + increment * average_game_moves`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryThresholds {
    /// Below this is hyperbullet. Default: 60.
    pub bullet: u32,
    /// Below this is bullet. Default: 180.
    pub blitz: u32,
    /// Below this is blitz. Default: 480.
    pub rapid: u32,
    /// Below this is rapid, otherwise classical. Default: 1500.
    pub classical: u32,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            bullet: 60,
            blitz: 180,
            rapid: 480,
            classical: 1500,
        }
    }
}

/// Restart policy for the supervised hub loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// Restarts allowed before supervision gives up. Default: 5.
    pub max_restarts: u32,
    /// Delay before the first restart, doubled per consecutive crash. Default: 500ms.
    pub initial_backoff: Duration,
    /// Upper bound for the restart delay. Default: 10s.
    pub max_backoff: Duration,
}

impl RestartPolicy {
    /// Delay before restart number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(10);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            max_restarts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Configuration for the hub and the matches it spawns.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// How often waiting seekers are paired. Default: 10s.
    pub matchmaking_interval: Duration,
    /// Outbound queue per connected client; a full queue drops the client. Default: 100.
    pub client_queue_capacity: usize,
    /// Queue feeding the hub's broadcast loop. Default: 500.
    pub broadcast_queue_capacity: usize,
    /// Command and timer queues per match. Default: 64.
    pub match_queue_capacity: usize,
    /// Time a side has to make its first move. Default: 10s.
    pub first_move_timeout: Duration,
    /// Grace period for a disconnected player. Default: 15s.
    pub reconnect_timeout: Duration,
    /// Upper bound on concurrent pair workers per sweep. Default: 16.
    pub max_matchmaking_workers: usize,
    /// Moves assumed per game when categorising a time control. Default: 40.
    pub average_game_moves: u32,
    /// Time controls offered for quick pairing.
    pub quick_games: Vec<TimeControl>,
    pub category_thresholds: CategoryThresholds,
    pub restart_policy: RestartPolicy,
}

impl HubConfig {
    /// Validate configuration values.
    ///
    /// Queue capacities, worker count and intervals must be non-zero, quick
    /// games must have a positive clock, and thresholds must be increasing.
    pub fn validate(&self) -> Result<(), HubError> {
        let invalid = |reason: String| Err(HubError::InvalidConfig { reason });

        if self.matchmaking_interval.is_zero() {
            return invalid("matchmaking_interval must be > 0".into());
        }
        for (name, value) in [
            ("client_queue_capacity", self.client_queue_capacity),
            ("broadcast_queue_capacity", self.broadcast_queue_capacity),
            ("match_queue_capacity", self.match_queue_capacity),
            ("max_matchmaking_workers", self.max_matchmaking_workers),
        ] {
            if value == 0 {
                return invalid(format!("{name} must be >= 1"));
            }
        }
        if self.first_move_timeout.is_zero() || self.reconnect_timeout.is_zero() {
            return invalid("match timeouts must be > 0".into());
        }
        if let Some(tc) = self.quick_games.iter().find(|tc| tc.clock == 0) {
            return invalid(format!("quick game {tc} has no clock"));
        }
        let t = &self.category_thresholds;
        if !(t.bullet < t.blitz && t.blitz < t.rapid && t.rapid < t.classical) {
            return invalid(format!("category thresholds must increase, got {t:?}"));
        }
        if self.restart_policy.initial_backoff > self.restart_policy.max_backoff {
            return invalid("restart initial_backoff exceeds max_backoff".into());
        }
        Ok(())
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        let quick_games = [
            (30, 0),
            (60, 0),
            (180, 0),
            (180, 1),
            (300, 0),
            (300, 2),
            (600, 0),
            (600, 5),
            (900, 0),
            (900, 5),
            (1800, 0),
            (2700, 10),
        ]
        .into_iter()
        .map(|(clock, increment)| TimeControl::new(clock, increment))
        .collect();

        Self {
            matchmaking_interval: Duration::from_secs(10),
            client_queue_capacity: 100,
            broadcast_queue_capacity: 500,
            match_queue_capacity: 64,
            first_move_timeout: Duration::from_secs(10),
            reconnect_timeout: Duration::from_secs(15),
            max_matchmaking_workers: 16,
            average_game_moves: 40,
            quick_games,
            category_thresholds: CategoryThresholds::default(),
            restart_policy: RestartPolicy::default(),
        }
    }
}
