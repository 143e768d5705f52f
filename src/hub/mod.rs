//! The hub: connected clients, broadcast channels and live matches.
//!
//! One task runs the hub loop, which admits and releases clients and
//! publishes outbound events to the broker. A second task subscribes to the
//! broker and delivers what arrives to local clients, so an event reaches
//! every instance holding one of its recipients. A third task runs the
//! matchmaking sweep. If either helper stops, the run fails and
//! [`Hub::run_supervised`] restarts all three together.

mod channel;
mod fanout;
mod matchmaking;
mod registry;
mod supervisor;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use channel::Channel;
pub use fanout::Topic;
pub use matchmaking::seek_key;
pub use supervisor::supervise;

use registry::Registry;

use crate::collab::Collaborators;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::events::{Frame, Inbound, Outbound};
use crate::game::{AuthTier, MatchHandle, MatchOutlet, PlayerCommand, TimeControl, TimerAction};
use crate::rules::Rules;

/// Topics every instance listens on.
const SUBSCRIPTIONS: [&str; 7] = [
    "ipc",
    "ipc.*",
    "wsc.*",
    "lobby",
    "game.*",
    "gametv.*",
    "client.*",
];

struct Connection {
    client: Uuid,
    tier: AuthTier,
    last_chat_id: Option<u64>,
    egress: mpsc::Sender<Frame>,
}

struct Delivery {
    topic: Topic,
    frame: Frame,
}

/// Receiving ends of the hub loop's queues. They outlive a single run so a
/// restarted loop picks up where the last one stopped.
struct Queues {
    connections: mpsc::Receiver<Connection>,
    disconnections: mpsc::Receiver<Uuid>,
    deliveries: mpsc::Receiver<Delivery>,
}

struct Shared {
    config: HubConfig,
    rules: Arc<Rules>,
    collab: Collaborators,
    registry: RwLock<Registry>,
    connections: mpsc::Sender<Connection>,
    disconnections: mpsc::Sender<Uuid>,
    deliveries: mpsc::Sender<Delivery>,
    queues: Mutex<Queues>,
    cancel: CancellationToken,
}

#[derive(Clone)]
pub struct Hub {
    shared: Arc<Shared>,
}

impl Hub {
    /// Build a hub. Nothing runs until [`Hub::run`] or
    /// [`Hub::run_supervised`]; cancelling `cancel` stops the hub and every
    /// match it started.
    pub fn new(
        config: HubConfig,
        rules: Arc<Rules>,
        collab: Collaborators,
        cancel: CancellationToken,
    ) -> Result<Self, HubError> {
        config.validate()?;
        let (connections, connections_rx) = mpsc::channel(config.broadcast_queue_capacity);
        let (disconnections, disconnections_rx) = mpsc::channel(config.broadcast_queue_capacity);
        let (deliveries, deliveries_rx) = mpsc::channel(config.broadcast_queue_capacity);
        let queues = Queues {
            connections: connections_rx,
            disconnections: disconnections_rx,
            deliveries: deliveries_rx,
        };
        Ok(Hub {
            shared: Arc::new(Shared {
                config,
                rules,
                collab,
                registry: RwLock::new(Registry::default()),
                connections,
                disconnections,
                deliveries,
                queues: Mutex::new(queues),
                cancel,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.shared.collab
    }

    pub fn shutdown(&self) {
        info!("hub shutdown requested");
        self.shared.cancel.cancel();
    }

    /// Register a client connection. Frames for the client arrive on the
    /// returned queue; it closes when the client is removed.
    pub async fn connect(
        &self,
        client: Uuid,
        tier: AuthTier,
        last_chat_id: Option<u64>,
    ) -> Result<mpsc::Receiver<Frame>, HubError> {
        if self.shared.cancel.is_cancelled() {
            return Err(HubError::ShuttingDown);
        }
        let (egress, frames) = mpsc::channel(self.shared.config.client_queue_capacity);
        self.shared
            .connections
            .send(Connection {
                client,
                tier,
                last_chat_id,
                egress,
            })
            .await
            .map_err(|_| HubError::ShuttingDown)?;
        Ok(frames)
    }

    pub async fn disconnect(&self, client: Uuid) -> Result<(), HubError> {
        self.shared
            .disconnections
            .send(client)
            .await
            .map_err(|_| HubError::ShuttingDown)
    }

    /// Accept a raw inbound payload from a client. It is republished on the
    /// client's inbound topic and handled by whichever instance picks it up.
    pub async fn receive(&self, client: Uuid, tier: AuthTier, payload: &str) -> Result<(), HubError> {
        let topic = Topic::Inbound { client, tier };
        self.shared
            .collab
            .broker
            .publish(&topic.to_string(), payload)
            .await?;
        Ok(())
    }

    /// Act on a decoded inbound event.
    pub async fn dispatch(&self, client: Uuid, tier: AuthTier, event: Inbound) {
        match event {
            Inbound::SeekGame { time_control } => self.seek(client, tier, time_control).await,
            Inbound::CancelSeekGame => match self.shared.collab.seeks.cancel(client).await {
                Ok(Some(key)) => debug!(client_id = %client, %key, "seek cancelled"),
                Ok(None) => {}
                Err(err) => error!(client_id = %client, error = %err, "failed to cancel seek"),
            },
            event => {
                let Some(command) = player_command(client, event) else {
                    return;
                };
                let Some(handle) = self.live_match_of(client).await else {
                    warn!(client_id = %client, "game event without a live match");
                    return;
                };
                if handle.tier() != tier {
                    warn!(client_id = %client, %tier, match_tier = %handle.tier(), "tier mismatch");
                    return;
                }
                handle.command(command);
            }
        }
    }

    async fn seek(&self, client: Uuid, tier: AuthTier, time_control: TimeControl) {
        if !self.shared.config.quick_games.contains(&time_control) {
            self.send_to(
                client,
                &Outbound::problem(format!("unsupported time control {time_control}")),
            )
            .await;
            return;
        }
        if self.live_match_of(client).await.is_some() {
            warn!(client_id = %client, "seek while playing dropped");
            return;
        }
        let key = seek_key(tier, time_control);
        match self.shared.collab.seeks.enqueue(&key, client).await {
            Ok(()) => debug!(client_id = %client, %key, "seek queued"),
            Err(err) => error!(client_id = %client, %key, error = %err, "failed to queue seek"),
        }
    }

    /// Watch a live match from the side. The client keeps its primary channel.
    pub fn spectate(&self, client: Uuid, match_id: Uuid) -> bool {
        let mut registry = self.shared.registry.write();
        if registry.get_match(match_id).is_none() {
            return false;
        }
        registry.join(client, Channel::GameTv(match_id))
    }

    pub fn stop_spectating(&self, client: Uuid, match_id: Uuid) {
        self.shared
            .registry
            .write()
            .leave(client, Channel::GameTv(match_id));
    }

    #[must_use]
    pub fn match_handle(&self, match_id: Uuid) -> Option<MatchHandle> {
        self.shared.registry.read().get_match(match_id).cloned()
    }

    #[must_use]
    pub fn live_matches(&self) -> Vec<MatchHandle> {
        self.shared.registry.read().matches().cloned().collect()
    }

    /// Clients in the lobby and clients seated in local matches.
    #[must_use]
    pub fn occupancy(&self) -> (usize, usize) {
        let registry = self.shared.registry.read();
        (
            registry.member_count(Channel::Lobby),
            registry.match_count() * 2,
        )
    }

    #[must_use]
    pub fn primary_channel(&self, client: Uuid) -> Option<Channel> {
        self.shared.registry.read().primary_channel(client)
    }

    /// Queue `event` for everyone on `channel`, on every instance. Waits
    /// while the outbound queue is full.
    pub async fn broadcast(&self, channel: Channel, event: &Outbound) {
        if let Some(frame) = encode(Topic::Channel(channel), event) {
            self.enqueue(Topic::Channel(channel), frame).await;
        }
    }

    pub async fn send_to(&self, client: Uuid, event: &Outbound) {
        if let Some(frame) = encode(Topic::Client(client), event) {
            self.enqueue(Topic::Client(client), frame).await;
        }
    }

    /// Events are only given up once the hub is shutting down.
    async fn enqueue(&self, topic: Topic, frame: Frame) {
        let delivery = Delivery { topic, frame };
        tokio::select! {
            sent = self.shared.deliveries.send(delivery) => {
                if sent.is_err() {
                    warn!(%topic, "outbound queue closed, event dropped");
                }
            }
            () = self.shared.cancel.cancelled() => {
                debug!(%topic, "hub stopped, event dropped");
            }
        }
    }

    async fn live_match_of(&self, client: Uuid) -> Option<MatchHandle> {
        match self.shared.collab.presence.player_match(client).await {
            Ok(Some(match_id)) => self.match_handle(match_id).filter(|h| !h.is_finished()),
            Ok(None) => None,
            Err(err) => {
                error!(client_id = %client, error = %err, "presence lookup failed");
                None
            }
        }
    }

    /// Run the hub loop until the hub is cancelled.
    ///
    /// Fails with [`HubError::TaskFailed`] when the fan-out or matchmaking
    /// task stops on its own, since events would no longer reach clients.
    pub async fn run(&self) -> Result<(), HubError> {
        let mut queues = self.shared.queues.lock().await;
        let messages = self.shared.collab.broker.subscribe(&SUBSCRIPTIONS).await?;

        // Stops the fan-out and matchmaking tasks however this run ends
        let children = self.shared.cancel.child_token();
        let _children_guard = children.clone().drop_guard();
        let mut fan_out = tokio::spawn({
            let hub = self.clone();
            let cancel = children.clone();
            async move { hub.fan_out(messages, cancel).await }
        });
        let mut matchmaking = tokio::spawn({
            let hub = self.clone();
            async move { hub.matchmaking(children).await }
        });

        info!("hub running");
        let Queues {
            connections,
            disconnections,
            deliveries,
        } = &mut *queues;
        loop {
            tokio::select! {
                biased;
                () = self.shared.cancel.cancelled() => break,
                joined = &mut fan_out => return Err(child_failed("fan-out", joined)),
                joined = &mut matchmaking => return Err(child_failed("matchmaking", joined)),
                Some(connection) = connections.recv() => self.admit(connection).await,
                Some(client) = disconnections.recv() => self.release_client(client).await,
                Some(delivery) = deliveries.recv() => self.publish(delivery).await,
            }
        }
        info!("hub stopped");
        Ok(())
    }

    async fn admit(&self, connection: Connection) {
        let Connection {
            client,
            tier,
            last_chat_id,
            egress,
        } = connection;
        let live = self.live_match_of(client).await;
        let primary = live
            .as_ref()
            .map_or(Channel::Lobby, |handle| Channel::Game(handle.id()));
        self.shared
            .registry
            .write()
            .add_client(client, tier, egress, primary);
        info!(client_id = %client, %tier, channel = %primary, "client connected");

        if let Some(handle) = live {
            if let Some(color) = handle.color_of(client) {
                handle.timer(TimerAction::StopReconnect(color));
            }
            self.publish_now(Topic::Channel(primary), &Outbound::ClientConnected { client_id: client })
                .await;
            handle.command(PlayerCommand::Rejoin {
                client,
                last_chat_id,
            });
        }
        self.signal_instances().await;
    }

    async fn release_client(&self, client: Uuid) {
        let removed = {
            let mut registry = self.shared.registry.write();
            let primary = registry.primary_channel(client);
            registry.remove_client(client).map(|_| primary)
        };
        let Some(primary) = removed else {
            return;
        };
        info!(client_id = %client, "client disconnected");

        if let Err(err) = self.shared.collab.seeks.cancel(client).await {
            error!(client_id = %client, error = %err, "failed to cancel seek");
        }
        if let Some(Channel::Game(match_id)) = primary {
            let handle = self.match_handle(match_id).filter(|h| !h.is_finished());
            if let Some(handle) = handle {
                if let Some(color) = handle.color_of(client) {
                    handle.timer(TimerAction::StartReconnect(color));
                }
                self.publish_now(
                    Topic::Channel(Channel::Game(match_id)),
                    &Outbound::ClientDisconnected { client_id: client },
                )
                .await;
            }
        }
        self.signal_instances().await;
    }

    async fn publish(&self, delivery: Delivery) {
        let topic = delivery.topic.to_string();
        if let Err(err) = self.shared.collab.broker.publish(&topic, &delivery.frame).await {
            error!(%topic, error = %err, "failed to publish event");
        }
    }

    /// Publish from the hub loop itself, which must not wait on its own
    /// queue.
    async fn publish_now(&self, topic: Topic, event: &Outbound) {
        if let Some(frame) = encode(topic, event) {
            self.publish(Delivery { topic, frame }).await;
        }
    }

    /// Tell every instance that occupancy changed.
    async fn signal_instances(&self) {
        if let Err(err) = self
            .shared
            .collab
            .broker
            .publish(&Topic::Ipc.to_string(), "occupancy")
            .await
        {
            error!(error = %err, "failed to publish ipc signal");
        }
    }
}

#[async_trait]
impl MatchOutlet for Hub {
    async fn to_match(&self, match_id: Uuid, event: &Outbound) {
        self.broadcast(Channel::Game(match_id), event).await;
    }

    async fn to_client(&self, client_id: Uuid, event: &Outbound) {
        self.send_to(client_id, event).await;
    }

    fn release(&self, match_id: Uuid) {
        if self.shared.registry.write().remove_match(match_id).is_some() {
            debug!(%match_id, "match released");
        }
    }

    /// Queued behind the match's last events, so players see the result
    /// before they are moved back to the lobby.
    async fn closed(&self, match_id: Uuid) {
        let topic = Topic::MatchClosed(match_id);
        self.enqueue(topic, Frame::from(match_id.to_string())).await;
    }
}

fn encode(topic: Topic, event: &Outbound) -> Option<Frame> {
    match event.encode() {
        Ok(frame) => Some(frame),
        Err(err) => {
            error!(%topic, error = %err, "failed to encode event");
            None
        }
    }
}

fn child_failed(task: &'static str, joined: Result<(), JoinError>) -> HubError {
    let reason = match joined {
        Ok(()) => "exited".to_string(),
        Err(err) if err.is_panic() => {
            format!("panicked: {}", supervisor::panic_message(err.into_panic()))
        }
        Err(err) => err.to_string(),
    };
    error!(task, %reason, "hub task stopped");
    HubError::TaskFailed { task, reason }
}

fn player_command(client: Uuid, event: Inbound) -> Option<PlayerCommand> {
    let command = match event {
        Inbound::GameAbort => PlayerCommand::Abort { client },
        Inbound::GameOfferDraw => PlayerCommand::OfferDraw { client },
        Inbound::GameResign => PlayerCommand::Resign { client },
        Inbound::GameDeclineDraw => PlayerCommand::DeclineDraw { client },
        Inbound::GameAcceptDraw => PlayerCommand::AcceptDraw { client },
        Inbound::GameChat { message } => PlayerCommand::Chat { client, message },
        Inbound::PlayMoveUci { uci } => PlayerCommand::PlayMove { client, uci },
        Inbound::SeekGame { .. } | Inbound::CancelSeekGame => return None,
    };
    Some(command)
}
