use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::{AuthTier, MatchState, Outcome, Player, TimeControl, TimerAction};
use crate::board::Color;

/// Player actions routed to a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerCommand {
    PlayMove { client: Uuid, uci: String },
    Abort { client: Uuid },
    Resign { client: Uuid },
    OfferDraw { client: Uuid },
    DeclineDraw { client: Uuid },
    AcceptDraw { client: Uuid },
    Chat { client: Uuid, message: String },
    /// Resend the full match snapshot and chat newer than `last_chat_id`.
    Rejoin {
        client: Uuid,
        last_chat_id: Option<u64>,
    },
}

impl PlayerCommand {
    /// The client that issued the command.
    #[must_use]
    pub fn client(&self) -> Uuid {
        match self {
            PlayerCommand::PlayMove { client, .. }
            | PlayerCommand::Abort { client }
            | PlayerCommand::Resign { client }
            | PlayerCommand::OfferDraw { client }
            | PlayerCommand::DeclineDraw { client }
            | PlayerCommand::AcceptDraw { client }
            | PlayerCommand::Chat { client, .. }
            | PlayerCommand::Rejoin { client, .. } => *client,
        }
    }
}

/// Sending side of a running match.
///
/// Every send is best effort: once the match task has exited its queues are
/// closed and messages are dropped.
#[derive(Debug, Clone)]
pub struct MatchHandle {
    id: Uuid,
    players: [Player; 2],
    tier: AuthTier,
    time_control: TimeControl,
    pub(super) commands: mpsc::Sender<PlayerCommand>,
    pub(super) timers: mpsc::Sender<TimerAction>,
    pub(super) finish: mpsc::Sender<Outcome>,
    pub(super) state: watch::Receiver<MatchState>,
    pub(super) cancel: CancellationToken,
}

impl MatchHandle {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        id: Uuid,
        players: [Player; 2],
        tier: AuthTier,
        time_control: TimeControl,
        commands: mpsc::Sender<PlayerCommand>,
        timers: mpsc::Sender<TimerAction>,
        finish: mpsc::Sender<Outcome>,
        state: watch::Receiver<MatchState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            players,
            tier,
            time_control,
            commands,
            timers,
            finish,
            state,
            cancel,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn tier(&self) -> AuthTier {
        self.tier
    }

    #[must_use]
    pub fn time_control(&self) -> TimeControl {
        self.time_control
    }

    /// White then black.
    #[must_use]
    pub fn players(&self) -> [Player; 2] {
        self.players
    }

    #[must_use]
    pub fn color_of(&self, client: Uuid) -> Option<Color> {
        self.players.iter().find(|p| p.id == client).map(|p| p.color)
    }

    #[must_use]
    pub fn opponent_of(&self, client: Uuid) -> Option<Uuid> {
        let color = self.color_of(client)?;
        Some(self.players[color.opponent().index()].id)
    }

    /// Latest state published by the match task.
    #[must_use]
    pub fn state(&self) -> MatchState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state().is_terminal() || self.commands.is_closed()
    }

    /// Wait until the match reaches a terminal state.
    pub async fn finished(&mut self) -> MatchState {
        if self.state.wait_for(|s| s.is_terminal()).await.is_err() {
            debug!(match_id = %self.id, "match task gone before finishing");
        }
        *self.state.borrow()
    }

    pub fn command(&self, command: PlayerCommand) {
        if let Err(err) = self.commands.try_send(command) {
            debug!(match_id = %self.id, error = %err, "match command dropped");
        }
    }

    pub fn timer(&self, action: TimerAction) {
        if let Err(err) = self.timers.try_send(action) {
            debug!(match_id = %self.id, ?action, error = %err, "timer action dropped");
        }
    }

    /// Ask the match to end with `outcome`.
    pub fn finish(&self, outcome: Outcome) {
        if let Err(err) = self.finish.try_send(outcome) {
            debug!(match_id = %self.id, error = %err, "finish request dropped");
        }
    }

    /// Halt the clock and every timeout. The task keeps serving its queues.
    pub fn stop_timers(&self) {
        self.timer(TimerAction::StopAll);
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}
