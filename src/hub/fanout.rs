//! Broker topics and delivery of broker traffic to local clients.

use std::fmt;
use std::str::FromStr;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Channel, Hub};
use crate::collab::BrokerMessage;
use crate::error::HubError;
use crate::events::{Frame, Inbound, Outbound};
use crate::game::AuthTier;

/// A broker topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Signals between hub instances.
    Ipc,
    /// A match ended; its players go back to the lobby.
    MatchClosed(Uuid),
    /// A client's raw inbound messages, `wsc.{client}.{tier}`.
    Inbound { client: Uuid, tier: AuthTier },
    Channel(Channel),
    /// Direct delivery, `client.{id}`.
    Client(Uuid),
    /// Delivery to a client only while it is in `channel`.
    ClientChannel { client: Uuid, channel: Channel },
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Ipc => f.write_str("ipc"),
            Topic::MatchClosed(id) => write!(f, "ipc.closed.{id}"),
            Topic::Inbound { client, tier } => write!(f, "wsc.{client}.{tier}"),
            Topic::Channel(channel) => write!(f, "{channel}"),
            Topic::Client(client) => write!(f, "client.{client}"),
            Topic::ClientChannel { client, channel } => write!(f, "client.{client}.{channel}"),
        }
    }
}

impl FromStr for Topic {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || HubError::MalformedTopic {
            topic: s.to_string(),
        };
        let client_id = |id: &str| Uuid::parse_str(id).map_err(|_| malformed());

        if s == "ipc" {
            return Ok(Topic::Ipc);
        }
        if let Some(id) = s.strip_prefix("ipc.closed.") {
            return Uuid::parse_str(id)
                .map(Topic::MatchClosed)
                .map_err(|_| malformed());
        }
        if let Some(rest) = s.strip_prefix("wsc.") {
            let (client, tier) = rest.split_once('.').ok_or_else(malformed)?;
            let tier = tier.parse().map_err(|()| malformed())?;
            return Ok(Topic::Inbound {
                client: client_id(client)?,
                tier,
            });
        }
        if let Some(rest) = s.strip_prefix("client.") {
            return match rest.split_once('.') {
                Some((client, channel)) => Ok(Topic::ClientChannel {
                    client: client_id(client)?,
                    channel: channel.parse().map_err(|_| malformed())?,
                }),
                None => Ok(Topic::Client(client_id(rest)?)),
            };
        }
        s.parse().map(Topic::Channel).map_err(|_| malformed())
    }
}

impl Hub {
    /// Deliver broker traffic until cancelled or the subscription closes.
    pub(super) async fn fan_out(
        &self,
        mut messages: mpsc::UnboundedReceiver<BrokerMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                message = messages.recv() => match message {
                    Some(message) => self.route(message).await,
                    None => {
                        warn!("broker subscription closed");
                        break;
                    }
                },
            }
        }
        debug!("fan-out stopped");
    }

    async fn route(&self, message: BrokerMessage) {
        let topic = match message.topic.parse::<Topic>() {
            Ok(topic) => topic,
            Err(err) => {
                warn!(error = %err, "dropping broker message");
                return;
            }
        };
        match topic {
            Topic::Ipc => self.announce_occupancy(),
            Topic::MatchClosed(match_id) => self.return_to_lobby(match_id),
            Topic::Inbound { client, tier } => match Inbound::decode(&message.payload) {
                Ok(event) => self.dispatch(client, tier, event).await,
                Err(source) => {
                    self.send_to(client, &Outbound::problem(format!("invalid message: {source}")))
                        .await;
                    let err = HubError::MalformedPayload {
                        topic: message.topic,
                        source,
                    };
                    warn!(client_id = %client, error = %err, "rejected inbound payload");
                }
            },
            Topic::Channel(channel) => self.deliver_local(channel, Frame::from(message.payload)),
            Topic::Client(client) => self.deliver_client(client, None, Frame::from(message.payload)),
            Topic::ClientChannel { client, channel } => {
                self.deliver_client(client, Some(channel), Frame::from(message.payload));
            }
        }
    }

    /// Send a lobby and playing count to local lobby members.
    fn announce_occupancy(&self) {
        let (lobby, playing) = self.occupancy();
        match (Outbound::HubInfo { lobby, playing }).encode() {
            Ok(frame) => self.deliver_local(Channel::Lobby, frame),
            Err(err) => warn!(error = %err, "failed to encode hub info"),
        }
    }

    /// Move local players of a finished match to the lobby and drop its
    /// spectators.
    fn return_to_lobby(&self, match_id: Uuid) {
        let players = {
            let mut registry = self.shared.registry.write();
            let players: Vec<Uuid> = registry
                .members(Channel::Game(match_id))
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            for id in &players {
                registry.join(*id, Channel::Lobby);
            }
            for (id, _) in registry.members(Channel::GameTv(match_id)) {
                registry.leave(id, Channel::GameTv(match_id));
            }
            players
        };
        if !players.is_empty() {
            debug!(%match_id, players = players.len(), "players back in the lobby");
            self.announce_occupancy();
        }
    }

    /// Match frames also reach the match's spectators.
    fn deliver_local(&self, channel: Channel, frame: Frame) {
        let recipients = {
            let registry = self.shared.registry.read();
            let mut recipients = registry.members(channel);
            if let Channel::Game(id) = channel {
                recipients.extend(registry.members(Channel::GameTv(id)));
            }
            recipients
        };
        let dead: Vec<Uuid> = recipients
            .into_iter()
            .filter(|(_, egress)| egress.try_send(frame.clone()).is_err())
            .map(|(id, _)| id)
            .collect();
        self.drop_dead(dead);
    }

    fn deliver_client(&self, client: Uuid, channel: Option<Channel>, frame: Frame) {
        let egress = {
            let registry = self.shared.registry.read();
            registry
                .client(client)
                .filter(|entry| channel.map_or(true, |c| entry.channels.contains(&c)))
                .map(|entry| entry.egress.clone())
        };
        if let Some(egress) = egress {
            if egress.try_send(frame).is_err() {
                self.drop_dead(vec![client]);
            }
        }
    }

    /// Clients whose queue is full or closed are removed, never waited on.
    fn drop_dead(&self, dead: Vec<Uuid>) {
        for client in dead {
            warn!(client_id = %client, "client queue full or closed, removing");
            if self.shared.disconnections.try_send(client).is_err() {
                warn!(client_id = %client, "disconnect queue full");
            }
        }
    }
}
