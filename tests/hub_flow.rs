//! Clients, matchmaking and play through a running hub.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use chess_hub::board::Color;
use chess_hub::collab::memory::MemoryMatchStore;
use chess_hub::collab::Collaborators;
use chess_hub::config::HubConfig;
use chess_hub::events::{Frame, Inbound, MatchFound, Outbound};
use chess_hub::game::{AuthTier, GameResult, MatchState, ResultStatus, TimeControl};
use chess_hub::hub::{seek_key, Channel, Hub};
use chess_hub::rules::Rules;

const WAIT: Duration = Duration::from_secs(5);
const SEEK_BLITZ: &str = r#"{"type":"seek_game","data":{"time_control":{"clock":180,"increment":2}}}"#;

fn hub_with_store() -> (Hub, Arc<MemoryMatchStore>) {
    hub_with_config(HubConfig::default())
}

fn hub_with_config(config: HubConfig) -> (Hub, Arc<MemoryMatchStore>) {
    let store = Arc::new(MemoryMatchStore::default());
    let collab = Collaborators {
        store: store.clone(),
        ..Collaborators::in_memory()
    };
    let hub = Hub::new(
        config,
        Rules::shared(),
        collab,
        CancellationToken::new(),
    )
    .unwrap();
    (hub, store)
}

async fn expect<F>(frames: &mut mpsc::Receiver<Frame>, mut wanted: F) -> Outbound
where
    F: FnMut(&Outbound) -> bool,
{
    loop {
        let frame = timeout(WAIT, frames.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("client queue closed");
        let event: Outbound = serde_json::from_str(&frame).unwrap();
        if wanted(&event) {
            return event;
        }
    }
}

async fn match_found(frames: &mut mpsc::Receiver<Frame>) -> MatchFound {
    match expect(frames, |e| matches!(e, Outbound::MatchFound(_))).await {
        Outbound::MatchFound(found) => *found,
        _ => unreachable!(),
    }
}

async fn waiting_seekers(hub: &Hub, key: &str, count: usize) {
    timeout(WAIT, async {
        while hub.collaborators().seeks.waiting(key).await.unwrap().len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("seekers never queued");
}

fn play(uci: &str) -> String {
    format!(r#"{{"type":"play_move_uci","data":{{"uci":"{uci}"}}}}"#)
}

#[tokio::test]
async fn five_seekers_make_two_matches() {
    let (hub, store) = hub_with_store();
    let time_control = TimeControl::new(180, 2);
    let clients: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    for client in &clients {
        hub.dispatch(*client, AuthTier::Guest, Inbound::SeekGame { time_control })
            .await;
    }

    assert_eq!(hub.sweep().await, 2);
    assert_eq!(store.len(), 2);
    assert_eq!(hub.live_matches().len(), 2);

    let key = seek_key(AuthTier::Guest, time_control);
    let left = hub.collaborators().seeks.waiting(&key).await.unwrap();
    assert_eq!(left, vec![clients[4]]);

    // Nothing left to pair
    assert_eq!(hub.sweep().await, 0);
    hub.shutdown();
}

#[tokio::test]
async fn tiers_are_never_mixed() {
    let (hub, _) = hub_with_store();
    let time_control = TimeControl::new(60, 0);
    hub.dispatch(Uuid::new_v4(), AuthTier::Guest, Inbound::SeekGame { time_control })
        .await;
    hub.dispatch(
        Uuid::new_v4(),
        AuthTier::Authenticated,
        Inbound::SeekGame { time_control },
    )
    .await;

    assert_eq!(hub.sweep().await, 0);
    hub.shutdown();
}

#[tokio::test]
async fn full_game_through_the_hub() {
    let (hub, store) = hub_with_store();
    let runner = tokio::spawn({
        let hub = hub.clone();
        async move { hub.run().await }
    });

    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut a_frames = hub.connect(a, AuthTier::Guest, None).await.unwrap();
    let mut b_frames = hub.connect(b, AuthTier::Guest, None).await.unwrap();
    expect(&mut b_frames, |e| matches!(e, Outbound::HubInfo { lobby: 2, .. })).await;

    hub.receive(a, AuthTier::Guest, SEEK_BLITZ).await.unwrap();
    hub.receive(b, AuthTier::Guest, SEEK_BLITZ).await.unwrap();
    let key = seek_key(AuthTier::Guest, TimeControl::new(180, 2));
    waiting_seekers(&hub, &key, 2).await;
    assert_eq!(hub.sweep().await, 1);

    let found_a = match_found(&mut a_frames).await;
    let found_b = match_found(&mut b_frames).await;
    assert_eq!(found_a.game_id, found_b.game_id);
    assert_ne!(found_a.color, found_b.color);
    assert_eq!(found_a.legal_moves.len(), 20);
    assert_eq!(found_a.game_state, MatchState::InProgress);
    let game_id = found_a.game_id;
    assert_eq!(hub.primary_channel(a), Some(Channel::Game(game_id)));

    let (white, black, mut white_frames, mut black_frames) = if found_a.color == Color::White {
        (a, b, a_frames, b_frames)
    } else {
        (b, a, b_frames, a_frames)
    };

    hub.receive(white, AuthTier::Guest, &play("e2e4")).await.unwrap();
    for frames in [&mut white_frames, &mut black_frames] {
        let event = expect(frames, |e| matches!(e, Outbound::ReceiveMove(_))).await;
        let Outbound::ReceiveMove(moved) = event else {
            unreachable!()
        };
        assert_eq!(moved.san, "e4");
        assert_eq!(moved.ply, 1);
    }

    // Bad input is answered with a problem and changes nothing
    hub.receive(black, AuthTier::Guest, "{not json").await.unwrap();
    expect(&mut black_frames, |e| matches!(e, Outbound::Problem { .. })).await;
    hub.receive(black, AuthTier::Guest, &play("e7e4")).await.unwrap();
    expect(&mut black_frames, |e| matches!(e, Outbound::Problem { .. })).await;

    hub.receive(black, AuthTier::Guest, &play("e7e5")).await.unwrap();
    expect(&mut white_frames, |e| matches!(e, Outbound::ReceiveMove(m) if m.san == "e5")).await;

    // Black drops and comes back to a full snapshot
    hub.disconnect(black).await.unwrap();
    expect(&mut white_frames, |e| {
        matches!(e, Outbound::ClientDisconnected { client_id } if *client_id == black)
    })
    .await;
    let mut black_frames = hub.connect(black, AuthTier::Guest, None).await.unwrap();
    expect(&mut white_frames, |e| {
        matches!(e, Outbound::ClientConnected { client_id } if *client_id == black)
    })
    .await;
    let snapshot = match_found(&mut black_frames).await;
    assert_eq!(snapshot.game_id, game_id);
    assert_eq!(snapshot.ply, 2);
    assert_eq!(snapshot.history.len(), 3);

    hub.receive(white, AuthTier::Guest, r#"{"type":"game_resign"}"#)
        .await
        .unwrap();
    let finished = Outbound::GameFinished {
        result: GameResult::BlackWon,
        result_status: ResultStatus::Resignation,
        state: MatchState::Finished,
    };
    expect(&mut black_frames, |e| *e == finished).await;
    expect(&mut white_frames, |e| *e == finished).await;

    // Both players land back in the lobby after the result
    for (client, frames) in [(white, &mut white_frames), (black, &mut black_frames)] {
        expect(frames, |e| matches!(e, Outbound::HubInfo { playing: 0, .. })).await;
        assert_eq!(hub.primary_channel(client), Some(Channel::Lobby));
    }
    assert_eq!(hub.occupancy(), (2, 0));

    assert!(hub.match_handle(game_id).is_none());
    let stored = store.get(game_id).unwrap();
    assert_eq!(stored.history.len(), 3);
    assert_eq!(
        stored.outcome.map(|o| o.result),
        Some(GameResult::BlackWon)
    );

    hub.shutdown();
    assert!(runner.await.unwrap().is_ok());
}

#[tokio::test]
async fn a_stalled_client_is_dropped_and_others_keep_receiving() {
    let (hub, _) = hub_with_config(HubConfig {
        client_queue_capacity: 4,
        ..HubConfig::default()
    });
    let runner = tokio::spawn({
        let hub = hub.clone();
        async move { hub.run().await }
    });

    let stalled = Uuid::new_v4();
    let peer = Uuid::new_v4();
    let mut stalled_frames = hub.connect(stalled, AuthTier::Guest, None).await.unwrap();
    let mut peer_frames = hub.connect(peer, AuthTier::Guest, None).await.unwrap();
    expect(&mut peer_frames, |e| matches!(e, Outbound::HubInfo { lobby: 2, .. })).await;

    // The stalled client never reads, so its queue fills up
    for i in 0..6 {
        let notice = Outbound::problem(format!("notice {i}"));
        hub.broadcast(Channel::Lobby, &notice).await;
        expect(&mut peer_frames, |e| *e == notice).await;
    }

    timeout(WAIT, async {
        while hub.primary_channel(stalled).is_some() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("stalled client was never removed");
    assert_eq!(hub.primary_channel(peer), Some(Channel::Lobby));
    assert_eq!(hub.occupancy().0, 1);

    // Whatever was queued is still readable, then the queue closes
    let mut queued = 0;
    while timeout(WAIT, stalled_frames.recv())
        .await
        .expect("stalled queue never closed")
        .is_some()
    {
        queued += 1;
    }
    assert!(queued <= 4);

    let last = Outbound::problem("after");
    hub.broadcast(Channel::Lobby, &last).await;
    expect(&mut peer_frames, |e| *e == last).await;

    hub.shutdown();
    assert!(runner.await.unwrap().is_ok());
}
