//! In-process collaborators.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::{
    Broker, BrokerMessage, ChatLog, MatchRecord, MatchStore, PresenceStore, Profile,
    ProfileFetcher, SeekQueue,
};
use crate::error::CollaboratorError;
use crate::events::{ChatMessage, MoveRecord};
use crate::game::Outcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMatch {
    pub record: MatchRecord,
    pub outcome: Option<Outcome>,
    pub history: Vec<MoveRecord>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MemoryMatchStore {
    matches: Mutex<HashMap<Uuid, StoredMatch>>,
}

impl MemoryMatchStore {
    #[must_use]
    pub fn get(&self, match_id: Uuid) -> Option<StoredMatch> {
        self.matches.lock().get(&match_id).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.matches.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.lock().is_empty()
    }
}

#[async_trait]
impl MatchStore for MemoryMatchStore {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), CollaboratorError> {
        self.matches.lock().insert(
            record.id,
            StoredMatch {
                record: record.clone(),
                outcome: None,
                history: Vec::new(),
                ended_at: None,
            },
        );
        Ok(())
    }

    async fn persist_result(
        &self,
        match_id: Uuid,
        outcome: Outcome,
        history: &[MoveRecord],
        ended_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        let mut matches = self.matches.lock();
        let stored = matches
            .get_mut(&match_id)
            .ok_or_else(|| CollaboratorError::Unavailable {
                operation: "persist_result",
                reason: format!("unknown match {match_id}"),
            })?;
        stored.outcome = Some(outcome);
        stored.history = history.to_vec();
        stored.ended_at = Some(ended_at);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryPresence {
    active: Mutex<HashMap<Uuid, MatchRecord>>,
    players: Mutex<HashMap<Uuid, Uuid>>,
}

impl MemoryPresence {
    #[must_use]
    pub fn is_active(&self, match_id: Uuid) -> bool {
        self.active.lock().contains_key(&match_id)
    }
}

#[async_trait]
impl PresenceStore for MemoryPresence {
    async fn set_active_match(&self, record: &MatchRecord) -> Result<(), CollaboratorError> {
        self.active.lock().insert(record.id, record.clone());
        Ok(())
    }

    async fn clear_active_match(&self, match_id: Uuid) -> Result<(), CollaboratorError> {
        self.active.lock().remove(&match_id);
        Ok(())
    }

    async fn set_player_match(
        &self,
        player: Uuid,
        match_id: Uuid,
    ) -> Result<(), CollaboratorError> {
        self.players.lock().insert(player, match_id);
        Ok(())
    }

    async fn clear_player_match(&self, player: Uuid) -> Result<(), CollaboratorError> {
        self.players.lock().remove(&player);
        Ok(())
    }

    async fn player_match(&self, player: Uuid) -> Result<Option<Uuid>, CollaboratorError> {
        Ok(self.players.lock().get(&player).copied())
    }
}

#[derive(Debug, Default)]
pub struct MemoryProfiles {
    profiles: Mutex<HashMap<Uuid, Profile>>,
}

impl MemoryProfiles {
    pub fn insert(&self, profile: Profile) {
        self.profiles.lock().insert(profile.user_id, profile);
    }
}

#[async_trait]
impl ProfileFetcher for MemoryProfiles {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile, CollaboratorError> {
        self.profiles
            .lock()
            .get(&user_id)
            .cloned()
            .ok_or(CollaboratorError::ProfileNotFound { user_id })
    }
}

/// True if `topic` is matched by an exact pattern or a `prefix*` pattern.
pub(crate) fn topic_matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

struct Subscriber {
    patterns: Vec<String>,
    tx: mpsc::UnboundedSender<BrokerMessage>,
}

/// Single-process broker: every publish is delivered to matching local
/// subscribers.
#[derive(Default)]
pub struct MemoryBroker {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl std::fmt::Debug for MemoryBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBroker")
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), CollaboratorError> {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|sub| {
            if !sub.patterns.iter().any(|p| topic_matches(p, topic)) {
                return !sub.tx.is_closed();
            }
            let message = BrokerMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
            };
            // Only fails once the receiver is gone
            let delivered = sub.tx.send(message).is_ok();
            if !delivered {
                debug!(topic, "dropping closed broker subscription");
            }
            delivered
        });
        Ok(())
    }

    async fn subscribe(
        &self,
        patterns: &[&str],
    ) -> Result<mpsc::UnboundedReceiver<BrokerMessage>, CollaboratorError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(Subscriber {
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            tx,
        });
        Ok(rx)
    }
}

#[derive(Debug, Default)]
struct SeekState {
    queues: HashMap<String, VecDeque<Uuid>>,
    seeking: HashMap<Uuid, String>,
}

impl SeekState {
    fn remove(&mut self, key: &str, client: Uuid) {
        if let Some(queue) = self.queues.get_mut(key) {
            queue.retain(|c| *c != client);
            if queue.is_empty() {
                self.queues.remove(key);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct MemorySeekQueue {
    state: Mutex<SeekState>,
}

#[async_trait]
impl SeekQueue for MemorySeekQueue {
    async fn enqueue(&self, key: &str, client: Uuid) -> Result<(), CollaboratorError> {
        let mut state = self.state.lock();
        // A new seek replaces any earlier one
        if let Some(previous) = state.seeking.remove(&client) {
            state.remove(&previous, client);
        }
        state
            .queues
            .entry(key.to_string())
            .or_default()
            .push_back(client);
        state.seeking.insert(client, key.to_string());
        Ok(())
    }

    async fn cancel(&self, client: Uuid) -> Result<Option<String>, CollaboratorError> {
        let mut state = self.state.lock();
        let key = state.seeking.remove(&client);
        if let Some(key) = &key {
            state.remove(key, client);
        }
        Ok(key)
    }

    async fn waiting(&self, key: &str) -> Result<Vec<Uuid>, CollaboratorError> {
        let state = self.state.lock();
        Ok(state
            .queues
            .get(key)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn remove_pair(&self, key: &str, pair: [Uuid; 2]) -> Result<bool, CollaboratorError> {
        let mut state = self.state.lock();
        let both_waiting = pair
            .iter()
            .all(|c| state.seeking.get(c).is_some_and(|k| k == key));
        if !both_waiting {
            return Ok(false);
        }
        for client in pair {
            state.seeking.remove(&client);
            state.remove(key, client);
        }
        Ok(true)
    }
}

#[derive(Debug, Default)]
pub struct MemoryChatLog {
    logs: Mutex<HashMap<Uuid, Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatLog for MemoryChatLog {
    async fn append(
        &self,
        match_id: Uuid,
        client_id: Uuid,
        message: &str,
    ) -> Result<u64, CollaboratorError> {
        let mut logs = self.logs.lock();
        let log = logs.entry(match_id).or_default();
        let id = log.len() as u64 + 1;
        log.push(ChatMessage {
            id,
            client_id,
            message: message.to_string(),
        });
        Ok(id)
    }

    async fn history(
        &self,
        match_id: Uuid,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, CollaboratorError> {
        let logs = self.logs.lock();
        Ok(logs
            .get(&match_id)
            .map(|log| {
                log.iter()
                    .filter(|m| after.map_or(true, |after| m.id > after))
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_patterns() {
        assert!(topic_matches("lobby", "lobby"));
        assert!(!topic_matches("lobby", "lobby2"));
        assert!(topic_matches("game.*", "game.123"));
        assert!(!topic_matches("game.*", "gametv.123"));
        assert!(topic_matches("wsc.*", "wsc.abc.1"));
    }

    #[tokio::test]
    async fn test_broker_delivers_to_matching_subscribers() {
        let broker = MemoryBroker::default();
        let mut games = broker.subscribe(&["game.*"]).await.unwrap();
        let mut lobby = broker.subscribe(&["lobby"]).await.unwrap();

        broker.publish("game.42", "hello").await.unwrap();
        broker.publish("lobby", "hi").await.unwrap();

        let msg = games.recv().await.unwrap();
        assert_eq!(msg.topic, "game.42");
        assert_eq!(msg.payload, "hello");
        assert_eq!(lobby.recv().await.unwrap().payload, "hi");
        assert!(games.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_broker_keeps_bursts_in_order() {
        let broker = MemoryBroker::default();
        let mut games = broker.subscribe(&["game.*"]).await.unwrap();
        for i in 0..5000 {
            broker.publish("game.1", &i.to_string()).await.unwrap();
        }
        for i in 0..5000 {
            assert_eq!(games.recv().await.unwrap().payload, i.to_string());
        }

        drop(games);
        broker.publish("game.1", "late").await.unwrap();
        assert_eq!(broker.subscribers.lock().len(), 0);
    }

    #[tokio::test]
    async fn test_seek_queue_keeps_order_and_reverse_index() {
        let queue = MemorySeekQueue::default();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            queue.enqueue("seek_game.0.60_0", *id).await.unwrap();
        }
        assert_eq!(queue.waiting("seek_game.0.60_0").await.unwrap(), ids);

        let key = queue.cancel(ids[1]).await.unwrap();
        assert_eq!(key.as_deref(), Some("seek_game.0.60_0"));
        assert_eq!(queue.cancel(ids[1]).await.unwrap(), None);
        assert_eq!(
            queue.waiting("seek_game.0.60_0").await.unwrap(),
            vec![ids[0], ids[2]]
        );
    }

    #[tokio::test]
    async fn test_seek_queue_pair_removal_is_all_or_nothing() {
        let queue = MemorySeekQueue::default();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        queue.enqueue("k", a).await.unwrap();
        queue.enqueue("k", b).await.unwrap();

        assert!(!queue.remove_pair("k", [a, c]).await.unwrap());
        assert_eq!(queue.waiting("k").await.unwrap(), vec![a, b]);

        assert!(queue.remove_pair("k", [a, b]).await.unwrap());
        assert!(queue.waiting("k").await.unwrap().is_empty());
        assert!(!queue.remove_pair("k", [a, b]).await.unwrap());
    }

    #[tokio::test]
    async fn test_seek_replaces_previous_bucket() {
        let queue = MemorySeekQueue::default();
        let a = Uuid::new_v4();
        queue.enqueue("k1", a).await.unwrap();
        queue.enqueue("k2", a).await.unwrap();
        assert!(queue.waiting("k1").await.unwrap().is_empty());
        assert_eq!(queue.waiting("k2").await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn test_chat_history_after_id() {
        let chat = MemoryChatLog::default();
        let (game, client) = (Uuid::new_v4(), Uuid::new_v4());
        for text in ["gl", "hf", "gg"] {
            chat.append(game, client, text).await.unwrap();
        }
        let all = chat.history(game, None, 100).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, 1);

        let newer = chat.history(game, Some(2), 100).await.unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].message, "gg");
        assert!(chat.history(Uuid::new_v4(), None, 100).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_presence_round_trip() {
        let presence = MemoryPresence::default();
        let (player, game) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(presence.player_match(player).await.unwrap(), None);
        presence.set_player_match(player, game).await.unwrap();
        assert_eq!(presence.player_match(player).await.unwrap(), Some(game));
        presence.clear_player_match(player).await.unwrap();
        assert_eq!(presence.player_match(player).await.unwrap(), None);
    }
}
