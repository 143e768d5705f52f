//! Who is connected, who listens where, and which matches are live.

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use uuid::Uuid;

use super::Channel;
use crate::events::Frame;
use crate::game::{AuthTier, MatchHandle};

#[derive(Debug)]
pub(crate) struct ClientEntry {
    pub tier: AuthTier,
    pub egress: mpsc::Sender<Frame>,
    pub channels: HashSet<Channel>,
}

/// Clients, channel membership and matches. Guarded as a whole by the hub's
/// lock.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    clients: HashMap<Uuid, ClientEntry>,
    channels: HashMap<Channel, HashSet<Uuid>>,
    matches: HashMap<Uuid, MatchHandle>,
}

impl Registry {
    /// Add a client to `primary`, replacing any earlier connection with the
    /// same id.
    pub fn add_client(
        &mut self,
        id: Uuid,
        tier: AuthTier,
        egress: mpsc::Sender<Frame>,
        primary: Channel,
    ) {
        self.remove_client(id);
        self.clients.insert(
            id,
            ClientEntry {
                tier,
                egress,
                channels: HashSet::new(),
            },
        );
        self.join(id, primary);
    }

    pub fn remove_client(&mut self, id: Uuid) -> Option<ClientEntry> {
        let entry = self.clients.remove(&id)?;
        for channel in &entry.channels {
            self.drop_member(*channel, id);
        }
        Some(entry)
    }

    pub fn client(&self, id: Uuid) -> Option<&ClientEntry> {
        self.clients.get(&id)
    }

    /// Joining a primary channel leaves the current one.
    pub fn join(&mut self, id: Uuid, channel: Channel) -> bool {
        let Some(entry) = self.clients.get_mut(&id) else {
            return false;
        };
        let mut left = Vec::new();
        if channel.is_primary() {
            entry.channels.retain(|c| {
                let keep = !c.is_primary();
                if !keep {
                    left.push(*c);
                }
                keep
            });
        }
        entry.channels.insert(channel);
        for old in left {
            self.drop_member(old, id);
        }
        self.channels.entry(channel).or_default().insert(id);
        true
    }

    pub fn leave(&mut self, id: Uuid, channel: Channel) {
        if let Some(entry) = self.clients.get_mut(&id) {
            entry.channels.remove(&channel);
        }
        self.drop_member(channel, id);
    }

    fn drop_member(&mut self, channel: Channel, id: Uuid) {
        if let Some(members) = self.channels.get_mut(&channel) {
            members.remove(&id);
            if members.is_empty() {
                self.channels.remove(&channel);
            }
        }
    }

    /// The lobby or match channel the client is in.
    pub fn primary_channel(&self, id: Uuid) -> Option<Channel> {
        self.clients
            .get(&id)?
            .channels
            .iter()
            .copied()
            .find(Channel::is_primary)
    }

    /// Egress queues of every member of `channel`.
    pub fn members(&self, channel: Channel) -> Vec<(Uuid, mpsc::Sender<Frame>)> {
        self.channels
            .get(&channel)
            .into_iter()
            .flatten()
            .filter_map(|id| self.clients.get(id).map(|c| (*id, c.egress.clone())))
            .collect()
    }

    pub fn member_count(&self, channel: Channel) -> usize {
        self.channels.get(&channel).map_or(0, HashSet::len)
    }

    pub fn insert_match(&mut self, handle: MatchHandle) {
        self.matches.insert(handle.id(), handle);
    }

    pub fn remove_match(&mut self, id: Uuid) -> Option<MatchHandle> {
        self.matches.remove(&id)
    }

    pub fn get_match(&self, id: Uuid) -> Option<&MatchHandle> {
        self.matches.get(&id)
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn matches(&self) -> impl Iterator<Item = &MatchHandle> {
        self.matches.values()
    }
}
