//! The periodic matchmaking sweep.

use std::sync::Arc;

use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::{Channel, Hub};
use crate::board::Color;
use crate::collab::{MatchRecord, Profile};
use crate::error::HubError;
use crate::game::{AuthTier, Match, MatchSetup, MatchState, Player, TimeControl};

/// Seek queue key for a tier and time control, e.g. `seek_game.0.180_2`.
#[must_use]
pub fn seek_key(tier: AuthTier, time_control: TimeControl) -> String {
    format!(
        "seek_game.{tier}.{}_{}",
        time_control.clock, time_control.increment
    )
}

impl Hub {
    pub(super) async fn matchmaking(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.shared.config.matchmaking_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
        }
        debug!("matchmaking stopped");
    }

    /// Pair waiting clients in every tier and quick game bucket. Returns the
    /// number of matches created; an odd client out waits for the next sweep.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> usize {
        let mut created = 0;
        for tier in [AuthTier::Guest, AuthTier::Authenticated] {
            for time_control in self.shared.config.quick_games.clone() {
                created += self.sweep_bucket(tier, time_control).await;
            }
        }
        if created > 0 {
            info!(created, "matchmaking sweep done");
        }
        created
    }

    async fn sweep_bucket(&self, tier: AuthTier, time_control: TimeControl) -> usize {
        let key = seek_key(tier, time_control);
        let waiting = match self.shared.collab.seeks.waiting(&key).await {
            Ok(waiting) => waiting,
            Err(err) => {
                error!(%key, error = %err, "failed to read seek queue");
                return 0;
            }
        };
        let pairs: Vec<[Uuid; 2]> = waiting
            .chunks_exact(2)
            .map(|pair| [pair[0], pair[1]])
            .collect();
        if pairs.is_empty() {
            return 0;
        }

        let workers = pairs
            .len()
            .min(self.shared.config.max_matchmaking_workers)
            .max(1);
        let mut batches = vec![Vec::new(); workers];
        for (i, pair) in pairs.into_iter().enumerate() {
            batches[i % workers].push(pair);
        }

        let mut pool = JoinSet::new();
        for batch in batches {
            let hub = self.clone();
            let key = key.clone();
            pool.spawn(async move {
                let mut created = 0;
                for pair in batch {
                    match hub.process_pair(&key, tier, time_control, pair).await {
                        Ok(Some(_)) => created += 1,
                        Ok(None) => {}
                        Err(err) => error!(%key, error = %err, "failed to start match"),
                    }
                }
                created
            });
        }

        let mut created = 0;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(n) => created += n,
                Err(err) => error!(%key, error = %err, "matchmaking worker failed"),
            }
        }
        created
    }

    /// Turn two waiting clients into a running match. Returns `None` when
    /// the pair is no longer waiting or belongs to another tier.
    #[instrument(skip(self, key, pair), fields(a = %pair[0], b = %pair[1]))]
    pub async fn process_pair(
        &self,
        key: &str,
        tier: AuthTier,
        time_control: TimeControl,
        pair: [Uuid; 2],
    ) -> Result<Option<Uuid>, HubError> {
        let shared = &self.shared;
        let mismatch = {
            let registry = shared.registry.read();
            pair.iter()
                .any(|id| registry.client(*id).is_some_and(|c| c.tier != tier))
        };
        if mismatch {
            warn!("tier mismatch, pair skipped");
            return Ok(None);
        }
        if !shared.collab.seeks.remove_pair(key, pair).await? {
            debug!("pair already taken");
            return Ok(None);
        }

        let (white, black) = if rand::random::<bool>() {
            (pair[0], pair[1])
        } else {
            (pair[1], pair[0])
        };
        let profiles = match tier {
            AuthTier::Authenticated => [self.profile(white).await, self.profile(black).await],
            AuthTier::Guest => [None, None],
        };

        let setup = MatchSetup {
            id: Uuid::new_v4(),
            players: [
                Player::new(white, Color::White),
                Player::new(black, Color::Black),
            ],
            tier,
            time_control,
            fen: None,
            first_move_timeout: shared.config.first_move_timeout,
            reconnect_timeout: shared.config.reconnect_timeout,
            queue_capacity: shared.config.match_queue_capacity,
            profiles,
        };
        let (game, handle) = Match::new(
            Arc::clone(&shared.rules),
            setup,
            shared.collab.clone(),
            Arc::new(self.clone()),
            shared.cancel.child_token(),
        )?;
        let match_id = game.id();

        let record = MatchRecord {
            id: match_id,
            white,
            black,
            tier,
            time_control,
            time_category: time_control.category(
                &shared.config.category_thresholds,
                shared.config.average_game_moves,
            ),
            first_move_timeout: shared.config.first_move_timeout,
            reconnect_timeout: shared.config.reconnect_timeout,
            state: MatchState::Initializing,
            fen: game.fen(),
            start_time: game.start_time(),
        };
        shared.collab.store.create_match(&record).await?;
        shared.collab.presence.set_active_match(&record).await?;
        for player in [white, black] {
            shared.collab.presence.set_player_match(player, match_id).await?;
        }

        {
            let mut registry = shared.registry.write();
            registry.insert_match(handle);
            for player in [white, black] {
                registry.join(player, Channel::Game(match_id));
            }
        }
        game.spawn();
        info!(%match_id, %white, %black, "match created");
        Ok(Some(match_id))
    }

    async fn profile(&self, user_id: Uuid) -> Option<Profile> {
        match self.shared.collab.profiles.fetch_profile(user_id).await {
            Ok(profile) => Some(profile),
            Err(err) => {
                error!(%user_id, error = %err, "failed to fetch profile");
                None
            }
        }
    }
}
