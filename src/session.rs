//! # Sessions
//!
//! Per-chat conversation sessions kept in teloxide dialogue storage.
//! [`SessionStorage`] wraps [`InMemStorage`] and remembers when each chat
//! was last seen, so sessions idle for longer than the TTL are dropped.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage, InMemStorageError, Storage};
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::dialogue::ConversationState;
use crate::services::Location;

/// Everything remembered about one chat
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub state: ConversationState,
    /// Last location shared by the user, in or outside the data entry flow
    pub location: Option<Location>,
    /// Company chosen or added during data entry
    pub company: Option<String>,
}

impl Session {
    pub fn record_location(&mut self, location: Location) {
        self.location = Some(location);
    }
}

/// Type alias for the conversation dialogue
pub type SessionDialogue = Dialogue<Session, SessionStorage>;

/// In-memory dialogue storage with idle expiry
pub struct SessionStorage {
    inner: Arc<InMemStorage<Session>>,
    last_seen: Mutex<HashMap<ChatId, Instant>>,
    ttl: Option<Duration>,
}

impl SessionStorage {
    /// Create a storage; `ttl` of `None` keeps sessions forever
    pub fn new(ttl: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemStorage::new(),
            last_seen: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn is_expired(&self, last_seen: Instant, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(last_seen) > ttl)
    }

    async fn forget(&self, chat_id: ChatId) {
        // Not finding the dialogue is fine
        let _ = Arc::clone(&self.inner).remove_dialogue(chat_id).await;
    }

    /// Drop every expired session, returning how many were removed
    pub async fn evict_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let now = Instant::now();
        let mut last_seen = self.last_seen.lock().await;
        let expired: Vec<ChatId> = last_seen
            .iter()
            .filter(|(_, seen)| self.is_expired(**seen, now))
            .map(|(chat_id, _)| *chat_id)
            .collect();
        for chat_id in &expired {
            last_seen.remove(chat_id);
            self.forget(*chat_id).await;
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.last_seen.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Storage<Session> for SessionStorage {
    type Error = InMemStorageError;

    fn remove_dialogue(
        self: Arc<Self>,
        chat_id: ChatId,
    ) -> BoxFuture<'static, Result<(), Self::Error>> {
        Box::pin(async move {
            let mut last_seen = self.last_seen.lock().await;
            last_seen.remove(&chat_id);
            Arc::clone(&self.inner).remove_dialogue(chat_id).await
        })
    }

    fn update_dialogue(
        self: Arc<Self>,
        chat_id: ChatId,
        dialogue: Session,
    ) -> BoxFuture<'static, Result<(), Self::Error>> {
        Box::pin(async move {
            let mut last_seen = self.last_seen.lock().await;
            last_seen.insert(chat_id, Instant::now());
            Arc::clone(&self.inner)
                .update_dialogue(chat_id, dialogue)
                .await
        })
    }

    /// Reading a live session counts as activity and restarts its TTL
    fn get_dialogue(
        self: Arc<Self>,
        chat_id: ChatId,
    ) -> BoxFuture<'static, Result<Option<Session>, Self::Error>> {
        Box::pin(async move {
            let now = Instant::now();
            let mut last_seen = self.last_seen.lock().await;
            match last_seen.get(&chat_id).copied() {
                None => return Ok(None),
                Some(seen) if self.is_expired(seen, now) => {
                    debug!(chat_id = %chat_id, "Session expired, starting over");
                    last_seen.remove(&chat_id);
                    self.forget(chat_id).await;
                    return Ok(None);
                }
                Some(_) => {
                    last_seen.insert(chat_id, now);
                }
            }
            Arc::clone(&self.inner).get_dialogue(chat_id).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dialogue(storage: &Arc<SessionStorage>, chat: i64) -> SessionDialogue {
        Dialogue::new(Arc::clone(storage), ChatId(chat))
    }

    fn located(latitude: f64, longitude: f64) -> Session {
        let mut session = Session::default();
        session.record_location(Location::new(latitude, longitude));
        session
    }

    #[tokio::test]
    async fn test_sessions_are_created_lazily() {
        let storage = SessionStorage::new(None);
        let chat = dialogue(&storage, 1);

        assert_eq!(chat.get().await.unwrap(), None);
        assert_eq!(chat.get_or_default().await.unwrap(), Session::default());
        assert!(storage.is_empty().await);

        chat.update(Session {
            state: ConversationState::AwaitingLocation,
            ..Session::default()
        })
        .await
        .unwrap();
        assert_eq!(storage.len().await, 1);
        assert_eq!(
            chat.get().await.unwrap().unwrap().state,
            ConversationState::AwaitingLocation
        );
    }

    #[tokio::test]
    async fn test_exit_forgets_session() {
        let storage = SessionStorage::new(None);
        let chat = dialogue(&storage, 5);
        chat.update(located(49.84, 24.03)).await.unwrap();

        chat.exit().await.unwrap();

        assert_eq!(chat.get().await.unwrap(), None);
        assert!(storage.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_sessions_are_evicted() {
        let storage = SessionStorage::new(Some(Duration::from_secs(60)));
        let first = dialogue(&storage, 1);
        let second = dialogue(&storage, 2);
        first.update(located(50.45, 30.52)).await.unwrap();
        second.update(located(49.84, 24.03)).await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        second.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;

        // chat 1 idle for 75s, chat 2 for 30s
        assert_eq!(storage.evict_expired().await, 1);
        assert_eq!(storage.len().await, 1);
        assert_eq!(first.get().await.unwrap(), None);
        assert!(second.get().await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_keep_session_alive() {
        let storage = SessionStorage::new(Some(Duration::from_secs(10)));
        let chat = dialogue(&storage, 3);
        chat.update(located(49.84, 24.03)).await.unwrap();

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(8)).await;
            assert!(chat.get().await.unwrap().is_some());
        }

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(chat.get().await.unwrap(), None);
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_no_ttl_never_evicts() {
        let storage = SessionStorage::new(None);
        dialogue(&storage, 1)
            .update(Session::default())
            .await
            .unwrap();
        assert_eq!(storage.evict_expired().await, 0);
        assert_eq!(storage.len().await, 1);
    }
}
