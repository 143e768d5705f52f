//! The task that owns one live match.
//!
//! A [`Match`] holds the game, the clock and the four timeout deadlines. Its
//! task is the only writer of that state: player commands, timer actions and
//! finish requests arrive over queues, and expiries are observed by sleeping
//! until the earliest armed deadline. The first event that ends the match
//! runs the finish bookkeeping and the task returns.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::handle::{MatchHandle, PlayerCommand};
use super::machine::{transition, Effect, MatchEvent, MatchState, Outcome, TimerAction};
use super::time_control::{seat_players, Player, TimeControl};
use super::AuthTier;
use crate::board::Color;
use crate::chess::Chess;
use crate::clock::{Clock, TimerState};
use crate::collab::{Collaborators, Profile};
use crate::error::{CollaboratorError, GameError};
use crate::events::{
    ChatMessage, Clocks, MatchFound, MoveRecord, OpponentInfo, Outbound, PlayedMoveInfo,
    ReceiveMove,
};
use crate::rules::Rules;

/// Rating shown for opponents until ratings are tracked.
const DEFAULT_RATING: u32 = 1500;
const CHAT_HISTORY_LIMIT: usize = 100;

/// Where a match sends its outbound events.
///
/// Sends wait for room downstream; nothing is dropped.
#[async_trait]
pub trait MatchOutlet: Send + Sync {
    /// Deliver to everyone on the match channel.
    async fn to_match(&self, match_id: Uuid, event: &Outbound);
    async fn to_client(&self, client_id: Uuid, event: &Outbound);
    /// Forget the match; called once, when it ends.
    fn release(&self, match_id: Uuid);
    /// Called after the final event has been sent.
    async fn closed(&self, _match_id: Uuid) {}
}

/// Everything needed to build a match.
#[derive(Debug, Clone)]
pub struct MatchSetup {
    pub id: Uuid,
    pub players: [Player; 2],
    pub tier: AuthTier,
    pub time_control: TimeControl,
    /// Starting position; the standard one when `None`.
    pub fen: Option<String>,
    pub first_move_timeout: Duration,
    pub reconnect_timeout: Duration,
    pub queue_capacity: usize,
    /// Profiles indexed by color, shown to the opponent.
    pub profiles: [Option<Profile>; 2],
}

/// What a finished match task reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSummary {
    pub outcome: Outcome,
    pub clocks: Clocks,
    pub clock_state: TimerState,
    pub moves_played: u32,
}

pub struct Match {
    id: Uuid,
    players: [Player; 2],
    tier: AuthTier,
    time_control: TimeControl,
    first_move_timeout: Duration,
    reconnect_timeout: Duration,
    profiles: [Option<Profile>; 2],

    chess: Chess,
    clock: Clock,
    state: MatchState,
    first_move: [Option<Instant>; 2],
    reconnect: [Option<Instant>; 2],
    history: Vec<MoveRecord>,
    start_time: DateTime<Utc>,
    draw_offer: Option<Color>,

    commands: mpsc::Receiver<PlayerCommand>,
    timers: mpsc::Receiver<TimerAction>,
    finish: mpsc::Receiver<Outcome>,
    state_tx: watch::Sender<MatchState>,
    cancel: CancellationToken,

    collab: Collaborators,
    outlet: Arc<dyn MatchOutlet>,
}

impl Match {
    /// Validate the setup and build the match with its handle. Nothing runs
    /// until [`Match::spawn`].
    pub fn new(
        rules: Arc<Rules>,
        setup: MatchSetup,
        collab: Collaborators,
        outlet: Arc<dyn MatchOutlet>,
        cancel: CancellationToken,
    ) -> Result<(Self, MatchHandle), GameError> {
        let players = seat_players(setup.players[0], setup.players[1])?;
        setup.time_control.validate()?;
        let chess = match &setup.fen {
            Some(fen) => Chess::from_fen(rules, fen)?,
            None => Chess::new(rules),
        };
        let clock = Clock::new(
            setup.time_control.clock_duration(),
            setup.time_control.increment_duration(),
        )
        .with_first_mover(chess.turn());

        let capacity = setup.queue_capacity.max(1);
        let (command_tx, commands) = mpsc::channel(capacity);
        let (timer_tx, timers) = mpsc::channel(capacity);
        let (finish_tx, finish) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(MatchState::Initializing);

        let handle = MatchHandle::new(
            setup.id,
            players,
            setup.tier,
            setup.time_control,
            command_tx,
            timer_tx,
            finish_tx,
            state_rx,
            cancel.clone(),
        );

        let history = vec![MoveRecord {
            fen: chess.fen(),
            check: chess.in_check(),
            played: None,
        }];

        let game = Match {
            id: setup.id,
            players,
            tier: setup.tier,
            time_control: setup.time_control,
            first_move_timeout: setup.first_move_timeout,
            reconnect_timeout: setup.reconnect_timeout,
            profiles: setup.profiles,
            chess,
            clock,
            state: MatchState::Initializing,
            first_move: [None; 2],
            reconnect: [None; 2],
            history,
            start_time: Utc::now(),
            draw_offer: None,
            commands,
            timers,
            finish,
            state_tx,
            cancel,
            collab,
            outlet,
        };
        Ok((game, handle))
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn fen(&self) -> String {
        self.chess.fen()
    }

    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn spawn(self) -> JoinHandle<MatchSummary> {
        tokio::spawn(self.run())
    }

    #[instrument(name = "match", skip_all, fields(match_id = %self.id))]
    async fn run(mut self) -> MatchSummary {
        info!(
            white = %self.players[0].id,
            black = %self.players[1].id,
            time_control = %self.time_control,
            tier = ?self.tier,
            "match started"
        );
        let mut ended = self.advance(MatchEvent::Started);
        for player in self.players {
            let snapshot = self.snapshot(player);
            self.outlet.to_client(player.id, &snapshot).await;
        }

        loop {
            if let Some(outcome) = ended {
                return self.complete(outcome).await;
            }
            ended = tokio::select! {
                biased;
                () = self.cancel.cancelled() => self.advance(MatchEvent::Cancelled),
                Some(outcome) = self.finish.recv() => {
                    self.advance(MatchEvent::FinishRequested(outcome))
                }
                () = sleep_opt(self.clock.deadline(Color::White)) => {
                    self.advance(MatchEvent::ClockExpired(Color::White))
                }
                () = sleep_opt(self.clock.deadline(Color::Black)) => {
                    self.advance(MatchEvent::ClockExpired(Color::Black))
                }
                () = sleep_opt(self.first_move[Color::White.index()]) => {
                    self.advance(MatchEvent::FirstMoveTimeout(Color::White))
                }
                () = sleep_opt(self.first_move[Color::Black.index()]) => {
                    self.advance(MatchEvent::FirstMoveTimeout(Color::Black))
                }
                () = sleep_opt(self.reconnect[Color::White.index()]) => {
                    self.advance(MatchEvent::ReconnectTimeout(Color::White))
                }
                () = sleep_opt(self.reconnect[Color::Black.index()]) => {
                    self.advance(MatchEvent::ReconnectTimeout(Color::Black))
                }
                Some(action) = self.timers.recv() => {
                    let ply = self.moves_played();
                    self.advance(MatchEvent::TimerAction { action, ply })
                }
                Some(command) = self.commands.recv() => self.handle_command(command).await,
            };
        }
    }

    /// Run one event through the transition table and apply its effects.
    /// Returns the outcome when the event ends the match.
    fn advance(&mut self, event: MatchEvent) -> Option<Outcome> {
        let step = transition(self.state, &event);
        if step.next != self.state {
            self.state = step.next;
            // Terminal states are published once the bookkeeping is done
            if !step.next.is_terminal() {
                self.state_tx.send_replace(step.next);
            }
        }

        let mut outcome = None;
        for effect in step.effects {
            match effect {
                Effect::ArmFirstMove(color) => {
                    self.first_move[color.index()] = Some(Instant::now() + self.first_move_timeout);
                }
                Effect::DisarmFirstMove(color) => self.first_move[color.index()] = None,
                Effect::ToggleClock => self.clock.toggle(),
                Effect::Apply(action) => self.apply_timer_action(action),
                Effect::Finish(o) => outcome = Some(o),
            }
        }
        outcome
    }

    fn apply_timer_action(&mut self, action: TimerAction) {
        let now = Instant::now();
        match action {
            TimerAction::StartFirstMove(c) => {
                self.first_move[c.index()] = Some(now + self.first_move_timeout);
            }
            TimerAction::StopFirstMove(c) => self.first_move[c.index()] = None,
            TimerAction::StartReconnect(c) => {
                self.reconnect[c.index()] = Some(now + self.reconnect_timeout);
            }
            TimerAction::StopReconnect(c) => self.reconnect[c.index()] = None,
            TimerAction::StartClock => self.clock.start(),
            TimerAction::PauseClock => self.clock.pause(),
            TimerAction::ToggleClock => self.clock.toggle(),
            TimerAction::ResetClock => self.clock.reset(),
            TimerAction::AddTime(c, d) => self.clock.add(c, d),
            TimerAction::StopAll => self.stop_timers(),
        }
    }

    /// Halt the clock and disarm every timeout without leaving the loop.
    fn stop_timers(&mut self) {
        self.clock.reset();
        self.first_move = [None; 2];
        self.reconnect = [None; 2];
    }

    async fn handle_command(&mut self, command: PlayerCommand) -> Option<Outcome> {
        let client = command.client();
        let Some(player) = self.players.into_iter().find(|p| p.id == client) else {
            warn!(client_id = %client, "command from non-participant dropped");
            return None;
        };
        if self.state != MatchState::InProgress {
            warn!(client_id = %client, state = ?self.state, "command for inactive match dropped");
            return None;
        }
        let color = player.color;
        let opponent = self.players[color.opponent().index()].id;
        let ply = self.moves_played();

        match command {
            PlayerCommand::PlayMove { uci, .. } => self.play_move(player, &uci).await,
            PlayerCommand::Abort { .. } => self.advance(MatchEvent::AbortRequested { by: color, ply }),
            PlayerCommand::Resign { .. } => self.advance(MatchEvent::Resigned { by: color, ply }),
            PlayerCommand::OfferDraw { .. } => {
                self.draw_offer = Some(color);
                self.outlet
                    .to_client(opponent, &Outbound::GameOfferDraw { client_id: client })
                    .await;
                None
            }
            PlayerCommand::DeclineDraw { .. } => {
                if self.draw_offer == Some(color.opponent()) {
                    self.draw_offer = None;
                }
                self.outlet
                    .to_client(opponent, &Outbound::GameDeclineDraw { client_id: client })
                    .await;
                None
            }
            PlayerCommand::AcceptDraw { .. } => {
                if self.draw_offer == Some(color.opponent()) {
                    self.advance(MatchEvent::DrawAccepted)
                } else {
                    warn!(client_id = %client, "draw accepted without an offer");
                    None
                }
            }
            PlayerCommand::Chat { message, .. } => {
                self.chat(client, message).await;
                None
            }
            PlayerCommand::Rejoin { last_chat_id, .. } => {
                self.rejoin(player, last_chat_id).await;
                None
            }
        }
    }

    async fn play_move(&mut self, player: Player, uci: &str) -> Option<Outcome> {
        if self.chess.turn() != player.color {
            warn!(client_id = %player.id, uci, "move out of turn dropped");
            return None;
        }
        let played = match self.chess.play_uci(uci) {
            Ok(played) => played,
            Err(err) => {
                self.outlet
                    .to_client(player.id, &Outbound::problem(err.to_string()))
                    .await;
                return None;
            }
        };

        self.draw_offer = None;
        self.history.push(MoveRecord {
            fen: played.fen.clone(),
            check: played.check,
            played: Some(PlayedMoveInfo {
                uci: played.uci.clone(),
                san: played.san.clone(),
                lan: played.lan.clone(),
                played_at: Utc::now(),
            }),
        });

        let outcome = Outcome::from_status(self.chess.status(), player.color);
        let ended = self.advance(MatchEvent::MovePlayed {
            ply: self.moves_played(),
            outcome,
        });

        let event = Outbound::ReceiveMove(ReceiveMove {
            uci: played.uci,
            lan: played.lan,
            san: played.san,
            fen: played.fen,
            ply: self.chess.ply(),
            legal_moves: self.chess.legal_moves_uci(),
            clocks: Clocks::of(&self.clock),
        });
        self.outlet.to_match(self.id, &event).await;
        ended
    }

    async fn chat(&self, client: Uuid, message: String) {
        match self.collab.chat.append(self.id, client, &message).await {
            Ok(id) => {
                let event = Outbound::GameChatReceive(ChatMessage {
                    id,
                    client_id: client,
                    message,
                });
                self.outlet.to_match(self.id, &event).await;
            }
            Err(err) => error!(client_id = %client, error = %err, "failed to store chat message"),
        }
    }

    async fn rejoin(&self, player: Player, last_chat_id: Option<u64>) {
        self.outlet.to_client(player.id, &self.snapshot(player)).await;

        match self
            .collab
            .chat
            .history(self.id, last_chat_id, CHAT_HISTORY_LIMIT)
            .await
        {
            Ok(messages) if messages.is_empty() => {}
            Ok(messages) => {
                self.outlet
                    .to_client(player.id, &Outbound::GameChatHistory { messages })
                    .await;
            }
            Err(err) => error!(client_id = %player.id, error = %err, "failed to fetch chat history"),
        }
    }

    /// The full match view for one player.
    fn snapshot(&self, player: Player) -> Outbound {
        let opponent_info = match self.tier {
            AuthTier::Authenticated => self.profiles[player.color.opponent().index()]
                .as_ref()
                .map(|p| OpponentInfo {
                    username: p.username.clone(),
                    avatar_url: p.avatar_url.clone(),
                    rating: DEFAULT_RATING,
                }),
            AuthTier::Guest => None,
        };

        Outbound::MatchFound(Box::new(MatchFound {
            game_id: self.id,
            client_id: player.id,
            color: player.color,
            fen: self.chess.fen(),
            ply: self.chess.ply(),
            clocks: Clocks::of(&self.clock),
            legal_moves: self.chess.legal_moves_uci(),
            game_state: self.state,
            time_control: self.time_control,
            reconnect_timeout_ms: duration_ms(self.reconnect_timeout),
            first_move_timeout_ms: duration_ms(self.first_move_timeout),
            history: self.history.clone(),
            start_time: self.start_time,
            opponent_info,
        }))
    }

    /// Finish bookkeeping, then report the final state.
    async fn complete(&mut self, outcome: Outcome) -> MatchSummary {
        info!(%outcome, moves = self.moves_played(), "match over");
        if let Err(err) = self.record_result(outcome).await {
            error!(error = %err, "failed to record match result");
        }
        self.outlet.release(self.id);
        self.outlet
            .to_match(
                self.id,
                &Outbound::GameFinished {
                    result: outcome.result,
                    result_status: outcome.status,
                    state: outcome.state(),
                },
            )
            .await;
        self.outlet.closed(self.id).await;
        self.state_tx.send_replace(outcome.state());

        MatchSummary {
            outcome,
            clocks: Clocks::of(&self.clock),
            clock_state: self.clock.state(),
            moves_played: self.moves_played(),
        }
    }

    /// Stops at the first collaborator failure.
    async fn record_result(&self, outcome: Outcome) -> Result<(), CollaboratorError> {
        let collab = &self.collab;
        collab
            .store
            .persist_result(self.id, outcome, &self.history, Utc::now())
            .await?;
        collab.presence.clear_active_match(self.id).await?;
        for player in self.players {
            collab.presence.clear_player_match(player.id).await?;
        }
        Ok(())
    }

    fn moves_played(&self) -> u32 {
        u32::try_from(self.history.len().saturating_sub(1)).unwrap_or(u32::MAX)
    }
}

async fn sleep_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::collab::memory::MemoryMatchStore;
    use crate::collab::MatchRecord;
    use crate::game::{GameResult, ResultStatus, TimeCategory};
    use crate::rules::shared_for_tests;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Match(Outbound),
        Client(Uuid, Outbound),
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Sent>>,
        released: Mutex<Vec<Uuid>>,
    }

    impl Recorder {
        fn to(&self, client: Uuid) -> Vec<Outbound> {
            self.sent
                .lock()
                .iter()
                .filter_map(|s| match s {
                    Sent::Client(id, event) if *id == client => Some(event.clone()),
                    _ => None,
                })
                .collect()
        }

        fn broadcast(&self) -> Vec<Outbound> {
            self.sent
                .lock()
                .iter()
                .filter_map(|s| match s {
                    Sent::Match(event) => Some(event.clone()),
                    Sent::Client(..) => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl MatchOutlet for Recorder {
        async fn to_match(&self, _match_id: Uuid, event: &Outbound) {
            self.sent.lock().push(Sent::Match(event.clone()));
        }

        async fn to_client(&self, client_id: Uuid, event: &Outbound) {
            self.sent.lock().push(Sent::Client(client_id, event.clone()));
        }

        fn release(&self, match_id: Uuid) {
            self.released.lock().push(match_id);
        }
    }

    struct Fixture {
        handle: MatchHandle,
        task: JoinHandle<MatchSummary>,
        recorder: Arc<Recorder>,
        store: Arc<MemoryMatchStore>,
        collab: Collaborators,
        white: Uuid,
        black: Uuid,
    }

    fn setup(time_control: TimeControl) -> MatchSetup {
        MatchSetup {
            id: Uuid::new_v4(),
            players: [
                Player::new(Uuid::new_v4(), Color::Black),
                Player::new(Uuid::new_v4(), Color::White),
            ],
            tier: AuthTier::Guest,
            time_control,
            fen: None,
            first_move_timeout: Duration::from_secs(10),
            reconnect_timeout: Duration::from_secs(15),
            queue_capacity: 16,
            profiles: [None, None],
        }
    }

    async fn start(setup: MatchSetup) -> Fixture {
        let store = Arc::new(MemoryMatchStore::default());
        let collab = Collaborators {
            store: store.clone(),
            ..Collaborators::in_memory()
        };
        let record = MatchRecord {
            id: setup.id,
            white: setup.players[1].id,
            black: setup.players[0].id,
            tier: setup.tier,
            time_control: setup.time_control,
            time_category: TimeCategory::Blitz,
            first_move_timeout: setup.first_move_timeout,
            reconnect_timeout: setup.reconnect_timeout,
            state: MatchState::Initializing,
            fen: String::new(),
            start_time: Utc::now(),
        };
        collab.store.create_match(&record).await.unwrap();

        let recorder = Arc::new(Recorder::default());
        let (game, handle) = Match::new(
            shared_for_tests(),
            setup,
            collab.clone(),
            recorder.clone(),
            CancellationToken::new(),
        )
        .unwrap();
        let [white, black] = handle.players().map(|p| p.id);
        Fixture {
            handle,
            task: game.spawn(),
            recorder,
            store,
            collab,
            white,
            black,
        }
    }

    fn play(fx: &Fixture, client: Uuid, uci: &str) {
        fx.handle.command(PlayerCommand::PlayMove {
            client,
            uci: uci.to_string(),
        });
    }

    /// Timer actions and cancellation outrank queued commands, so let the
    /// moves land first.
    async fn moves_landed(fx: &Fixture, count: usize) {
        let landed = || {
            fx.recorder
                .broadcast()
                .iter()
                .filter(|e| matches!(e, Outbound::ReceiveMove(_)))
                .count()
        };
        while landed() < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_rejects_invalid_setups() {
        let mut same = setup(TimeControl::new(60, 0));
        same.players[1].id = same.players[0].id;
        let err = Match::new(
            shared_for_tests(),
            same,
            Collaborators::in_memory(),
            Arc::new(Recorder::default()),
            CancellationToken::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GameError::InvalidPlayers { .. }));

        let err = Match::new(
            shared_for_tests(),
            setup(TimeControl::new(0, 1)),
            Collaborators::in_memory(),
            Arc::new(Recorder::default()),
            CancellationToken::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GameError::InvalidTimeControl { .. }));

        let mut bad_fen = setup(TimeControl::new(60, 0));
        bad_fen.fen = Some("not a fen".into());
        let err = Match::new(
            shared_for_tests(),
            bad_fen,
            Collaborators::in_memory(),
            Arc::new(Recorder::default()),
            CancellationToken::new(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, GameError::InvalidPosition(_)));
    }

    #[tokio::test]
    async fn test_clock_starts_with_the_side_to_move() {
        let mut black_first = setup(TimeControl::new(60, 0));
        black_first.fen =
            Some("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".into());
        let (game, _handle) = Match::new(
            shared_for_tests(),
            black_first,
            Collaborators::in_memory(),
            Arc::new(Recorder::default()),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(game.clock.active(), Color::Black);

        let (game, _handle) = Match::new(
            shared_for_tests(),
            setup(TimeControl::new(60, 0)),
            Collaborators::in_memory(),
            Arc::new(Recorder::default()),
            CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(game.clock.active(), Color::White);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unplayed_match_is_aborted_without_starting_the_clock() {
        let fx = start(setup(TimeControl::new(60, 0))).await;
        let summary = fx.task.await.unwrap();

        assert_eq!(summary.outcome, Outcome::aborted());
        assert_eq!(summary.clock_state, TimerState::Idle);
        assert_eq!(summary.moves_played, 0);
        assert_eq!(summary.clocks.white_ms, 60_000);
        assert_eq!(fx.handle.state(), MatchState::Interrupted);

        for client in [fx.white, fx.black] {
            let sent = fx.recorder.to(client);
            assert!(matches!(&sent[0], Outbound::MatchFound(found) if found.client_id == client));
        }
        assert_eq!(*fx.recorder.released.lock(), vec![fx.handle.id()]);
        assert!(fx.recorder.broadcast().contains(&Outbound::GameFinished {
            result: GameResult::Interrupted,
            result_status: ResultStatus::Aborted,
            state: MatchState::Interrupted,
        }));
        let stored = fx.store.get(fx.handle.id()).unwrap();
        assert_eq!(stored.outcome, Some(Outcome::aborted()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_player_loses_on_time() {
        let fx = start(setup(TimeControl::new(1, 0))).await;
        play(&fx, fx.white, "e2e4");
        play(&fx, fx.black, "e7e5");

        let summary = fx.task.await.unwrap();
        assert_eq!(summary.outcome, Outcome::win(Color::Black, ResultStatus::Flagged));
        assert_eq!(summary.clocks.white_ms, 0);
        assert_eq!(summary.clocks.black_ms, 1_000);
        assert_eq!(summary.moves_played, 2);

        let moves: Vec<_> = fx
            .recorder
            .broadcast()
            .into_iter()
            .filter_map(|e| match e {
                Outbound::ReceiveMove(m) => Some(m.san),
                _ => None,
            })
            .collect();
        assert_eq!(moves, ["e4", "e5"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_turn_and_illegal_moves_are_not_played() {
        let mut fx = start(setup(TimeControl::new(60, 0))).await;
        play(&fx, fx.black, "e7e5");
        play(&fx, fx.white, "e2e5");
        play(&fx, Uuid::new_v4(), "e2e4");

        let summary = fx.task.await.unwrap();
        assert_eq!(summary.moves_played, 0);
        assert_eq!(summary.outcome, Outcome::aborted());
        assert_eq!(fx.handle.finished().await, MatchState::Interrupted);
        assert!(fx
            .recorder
            .to(fx.white)
            .iter()
            .any(|e| matches!(e, Outbound::Problem { message } if message.contains("e2e5"))));
        assert_eq!(fx.recorder.to(fx.black).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_checkmate_finishes_and_records_history() {
        let fx = start(setup(TimeControl::new(60, 0))).await;
        for (client, uci) in [
            (fx.white, "f2f3"),
            (fx.black, "e7e5"),
            (fx.white, "g2g4"),
            (fx.black, "d8h4"),
        ] {
            play(&fx, client, uci);
        }

        let summary = fx.task.await.unwrap();
        assert_eq!(summary.outcome, Outcome::win(Color::Black, ResultStatus::Checkmate));

        let stored = fx.store.get(fx.handle.id()).unwrap();
        assert_eq!(stored.history.len(), 5);
        assert!(stored.history[0].played.is_none());
        let last = stored.history[4].played.as_ref().unwrap();
        assert_eq!(last.san, "Qh4#");
        assert!(stored.history[4].check);
        assert_eq!(fx.collab.presence.player_match(fx.white).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_draw_needs_a_pending_offer() {
        let fx = start(setup(TimeControl::new(60, 0))).await;
        play(&fx, fx.white, "e2e4");
        fx.handle.command(PlayerCommand::AcceptDraw { client: fx.black });
        fx.handle.command(PlayerCommand::OfferDraw { client: fx.white });
        fx.handle.command(PlayerCommand::AcceptDraw { client: fx.white });
        fx.handle.command(PlayerCommand::AcceptDraw { client: fx.black });

        let summary = fx.task.await.unwrap();
        assert_eq!(summary.outcome, Outcome::draw(ResultStatus::DrawAgreed));
        assert_eq!(summary.moves_played, 1);
        assert!(fx
            .recorder
            .to(fx.black)
            .contains(&Outbound::GameOfferDraw { client_id: fx.white }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_offer_cannot_be_accepted() {
        let fx = start(setup(TimeControl::new(60, 0))).await;
        play(&fx, fx.white, "e2e4");
        play(&fx, fx.black, "e7e5");
        fx.handle.command(PlayerCommand::OfferDraw { client: fx.black });
        fx.handle.command(PlayerCommand::DeclineDraw { client: fx.white });
        fx.handle.command(PlayerCommand::AcceptDraw { client: fx.white });
        fx.handle.command(PlayerCommand::Resign { client: fx.white });

        let summary = fx.task.await.unwrap();
        assert_eq!(summary.outcome, Outcome::win(Color::Black, ResultStatus::Resignation));
        assert!(fx
            .recorder
            .to(fx.black)
            .contains(&Outbound::GameDeclineDraw { client_id: fx.white }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_early_resignation_aborts() {
        let fx = start(setup(TimeControl::new(60, 0))).await;
        fx.handle.command(PlayerCommand::Resign { client: fx.black });

        let summary = fx.task.await.unwrap();
        assert_eq!(summary.outcome, Outcome::aborted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_timers_keep_the_match_alive() {
        let fx = start(setup(TimeControl::new(5, 0))).await;
        play(&fx, fx.white, "e2e4");
        play(&fx, fx.black, "e7e5");
        moves_landed(&fx, 2).await;
        fx.handle.stop_timers();

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(fx.handle.state(), MatchState::InProgress);
        assert!(!fx.task.is_finished());

        fx.handle.finish(Outcome::draw(ResultStatus::DrawAgreed));
        let summary = fx.task.await.unwrap();
        assert_eq!(summary.outcome, Outcome::draw(ResultStatus::DrawAgreed));
        assert_eq!(summary.clock_state, TimerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_timeout_awards_the_opponent() {
        let fx = start(setup(TimeControl::new(60, 0))).await;
        play(&fx, fx.white, "e2e4");
        play(&fx, fx.black, "e7e5");
        moves_landed(&fx, 2).await;
        fx.handle.timer(TimerAction::StartReconnect(Color::Black));

        let summary = fx.task.await.unwrap();
        assert_eq!(summary.outcome, Outcome::win(Color::White, ResultStatus::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejoin_resends_snapshot_and_newer_chat() {
        let fx = start(setup(TimeControl::new(60, 0))).await;
        play(&fx, fx.white, "e2e4");
        fx.handle.command(PlayerCommand::Chat {
            client: fx.white,
            message: "good luck".into(),
        });
        fx.handle.command(PlayerCommand::Chat {
            client: fx.black,
            message: "you too".into(),
        });
        fx.handle.command(PlayerCommand::Rejoin {
            client: fx.black,
            last_chat_id: Some(1),
        });
        fx.task.await.unwrap();

        let sent = fx.recorder.to(fx.black);
        let snapshots: Vec<_> = sent
            .iter()
            .filter_map(|e| match e {
                Outbound::MatchFound(found) => Some(found),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].history.len(), 2);
        assert_eq!(snapshots[1].ply, 1);
        assert_eq!(snapshots[1].game_state, MatchState::InProgress);

        let history = sent.iter().find_map(|e| match e {
            Outbound::GameChatHistory { messages } => Some(messages.clone()),
            _ => None,
        });
        let history = history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].message, "you too");
        let chat = fx
            .recorder
            .broadcast()
            .into_iter()
            .filter(|e| matches!(e, Outbound::GameChatReceive(_)))
            .count();
        assert_eq!(chat, 2);
    }
}
