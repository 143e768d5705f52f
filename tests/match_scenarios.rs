//! Whole-match scenarios driven through the public match API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chess_hub::board::Color;
use chess_hub::clock::TimerState;
use chess_hub::collab::Collaborators;
use chess_hub::events::Outbound;
use chess_hub::game::{
    AuthTier, GameResult, Match, MatchHandle, MatchOutlet, MatchSetup, MatchState, MatchSummary,
    Player, PlayerCommand, ResultStatus, TimeControl,
};
use chess_hub::rules::Rules;

struct Discard;

#[async_trait]
impl MatchOutlet for Discard {
    async fn to_match(&self, _match_id: Uuid, _event: &Outbound) {}
    async fn to_client(&self, _client_id: Uuid, _event: &Outbound) {}
    fn release(&self, _match_id: Uuid) {}
}

fn start(clock_secs: u32) -> (MatchHandle, tokio::task::JoinHandle<MatchSummary>) {
    let setup = MatchSetup {
        id: Uuid::new_v4(),
        players: [
            Player::new(Uuid::new_v4(), Color::White),
            Player::new(Uuid::new_v4(), Color::Black),
        ],
        tier: AuthTier::Guest,
        time_control: TimeControl::new(clock_secs, 0),
        fen: None,
        first_move_timeout: Duration::from_secs(10),
        reconnect_timeout: Duration::from_secs(15),
        queue_capacity: 16,
        profiles: [None, None],
    };
    let (game, handle) = Match::new(
        Rules::shared(),
        setup,
        Collaborators::in_memory(),
        Arc::new(Discard),
        CancellationToken::new(),
    )
    .unwrap();
    (handle, game.spawn())
}

fn play(handle: &MatchHandle, color: Color, uci: &str) {
    handle.command(PlayerCommand::PlayMove {
        client: handle.players()[color.index()].id,
        uci: uci.into(),
    });
}

#[tokio::test(start_paused = true)]
async fn abandoned_match_is_interrupted() {
    let (mut handle, task) = start(60);
    let summary = task.await.unwrap();

    assert_eq!(summary.outcome.result, GameResult::Interrupted);
    assert_eq!(summary.outcome.status, ResultStatus::Aborted);
    assert_eq!(summary.clock_state, TimerState::Idle);
    assert_eq!(summary.clocks.white_ms, 60_000);
    assert_eq!(summary.clocks.black_ms, 60_000);
    assert_eq!(handle.finished().await, MatchState::Interrupted);
}

#[tokio::test(start_paused = true)]
async fn white_loses_on_time() {
    let (handle, task) = start(1);
    play(&handle, Color::White, "e2e4");
    play(&handle, Color::Black, "e7e5");

    let summary = task.await.unwrap();
    assert_eq!(summary.outcome.result, GameResult::BlackWon);
    assert_eq!(summary.outcome.status, ResultStatus::Flagged);
    assert_eq!(summary.clocks.white_ms, 0);
    assert!(handle.is_finished());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_running_match() {
    let (handle, task) = start(300);
    handle.cancel();

    let summary = task.await.unwrap();
    assert_eq!(summary.outcome.result, GameResult::Interrupted);
    assert_eq!(handle.state(), MatchState::Interrupted);
}

#[tokio::test(start_paused = true)]
async fn commands_after_the_end_are_dropped() {
    let (handle, task) = start(60);
    handle.cancel();
    task.await.unwrap();

    // The queues are closed; sending must not panic or block.
    play(&handle, Color::White, "e2e4");
    handle.stop_timers();
    assert!(handle.is_finished());
}
