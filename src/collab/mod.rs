//! Narrow interfaces to the services the hub depends on.
//!
//! Storage, presence, profiles, the cross-process broker, the seek queue and
//! the chat log are all external to this crate. Each is reached through one
//! small async trait; [`memory`] provides in-process implementations used by
//! the binary and the tests.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::CollaboratorError;
use crate::events::{ChatMessage, MoveRecord};
use crate::game::{AuthTier, MatchState, Outcome, TimeCategory, TimeControl};

/// A newly paired match, as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub id: Uuid,
    pub white: Uuid,
    pub black: Uuid,
    pub tier: AuthTier,
    pub time_control: TimeControl,
    pub time_category: TimeCategory,
    pub first_move_timeout: Duration,
    pub reconnect_timeout: Duration,
    pub state: MatchState,
    pub fen: String,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub user_id: Uuid,
    pub username: String,
    pub avatar_url: String,
}

/// A message received from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: String,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn create_match(&self, record: &MatchRecord) -> Result<(), CollaboratorError>;

    async fn persist_result(
        &self,
        match_id: Uuid,
        outcome: Outcome,
        history: &[MoveRecord],
        ended_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError>;
}

/// Which matches are live and which player sits in which.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn set_active_match(&self, record: &MatchRecord) -> Result<(), CollaboratorError>;
    async fn clear_active_match(&self, match_id: Uuid) -> Result<(), CollaboratorError>;
    async fn set_player_match(&self, player: Uuid, match_id: Uuid)
        -> Result<(), CollaboratorError>;
    async fn clear_player_match(&self, player: Uuid) -> Result<(), CollaboratorError>;
    async fn player_match(&self, player: Uuid) -> Result<Option<Uuid>, CollaboratorError>;
}

#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Profile, CollaboratorError>;
}

/// Cross-process publish/subscribe.
///
/// Patterns are exact topic names or a prefix followed by `*`, as in
/// `game.*`. A subscription buffers whatever it has not read yet and
/// preserves publish order.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), CollaboratorError>;

    async fn subscribe(
        &self,
        patterns: &[&str],
    ) -> Result<mpsc::UnboundedReceiver<BrokerMessage>, CollaboratorError>;
}

/// Clients waiting for a pairing, ordered by the time they asked.
///
/// A client waits in at most one queue; the queue key it waits under is
/// remembered so it can be cancelled without knowing the key.
#[async_trait]
pub trait SeekQueue: Send + Sync {
    async fn enqueue(&self, key: &str, client: Uuid) -> Result<(), CollaboratorError>;

    /// Drop the client's pending seek, returning the key it waited under.
    async fn cancel(&self, client: Uuid) -> Result<Option<String>, CollaboratorError>;

    async fn waiting(&self, key: &str) -> Result<Vec<Uuid>, CollaboratorError>;

    /// Remove both clients from `key` together. Returns false, removing
    /// neither, when either is no longer waiting there.
    async fn remove_pair(&self, key: &str, pair: [Uuid; 2]) -> Result<bool, CollaboratorError>;
}

#[async_trait]
pub trait ChatLog: Send + Sync {
    /// Store a message, returning its id. Ids increase within a match.
    async fn append(
        &self,
        match_id: Uuid,
        client_id: Uuid,
        message: &str,
    ) -> Result<u64, CollaboratorError>;

    /// Up to `limit` messages newer than `after`, oldest first.
    async fn history(
        &self,
        match_id: Uuid,
        after: Option<u64>,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, CollaboratorError>;
}

/// Every collaborator the hub and its matches talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn MatchStore>,
    pub presence: Arc<dyn PresenceStore>,
    pub profiles: Arc<dyn ProfileFetcher>,
    pub broker: Arc<dyn Broker>,
    pub seeks: Arc<dyn SeekQueue>,
    pub chat: Arc<dyn ChatLog>,
}

impl Collaborators {
    /// All in-memory implementations, with the broker shared so tests can
    /// publish into it.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(memory::MemoryMatchStore::default()),
            presence: Arc::new(memory::MemoryPresence::default()),
            profiles: Arc::new(memory::MemoryProfiles::default()),
            broker: Arc::new(memory::MemoryBroker::default()),
            seeks: Arc::new(memory::MemorySeekQueue::default()),
            chat: Arc::new(memory::MemoryChatLog::default()),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
