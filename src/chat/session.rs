//! Per-user conversation sessions
//!
//! Holds a bounded, time-decaying turn history per requester. Expiry is
//! lazy: staleness is evaluated on access, there is no background sweep.
//! The system prompt is supplied fresh by the caller on every completion
//! call and is never part of the stored history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A user's stored conversation state.
#[derive(Debug, Default)]
struct ConversationSession {
    turns: VecDeque<Turn>,
    last_activity: Option<DateTime<Utc>>,
}

/// Store of per-user conversation sessions.
pub struct SessionStore {
    cap: usize,
    timeout: Duration,
    sessions: Arc<RwLock<HashMap<String, ConversationSession>>>,
}

impl SessionStore {
    /// Create a store capping each session at `cap` turns and expiring
    /// after `timeout_secs` of inactivity.
    pub fn new(cap: usize, timeout_secs: i64) -> Self {
        Self {
            cap,
            timeout: Duration::seconds(timeout_secs),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Return the stored turns for `key`, clearing them first when the
    /// session has been inactive longer than the timeout. Reading counts
    /// as activity.
    pub async fn history(&self, key: &str, now: DateTime<Utc>) -> Vec<Turn> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(key.to_string()).or_default();

        if let Some(last) = session.last_activity {
            if now - last > self.timeout {
                session.turns.clear();
            }
        }
        session.last_activity = Some(now);
        session.turns.iter().cloned().collect()
    }

    /// Append a turn for `key`, truncating the oldest turns once the cap
    /// is exceeded. The most recent turns always survive.
    pub async fn append(&self, key: &str, role: Role, content: &str, now: DateTime<Utc>) {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(key.to_string()).or_default();

        session.turns.push_back(Turn::new(role, content));
        if session.turns.len() > self.cap {
            // Keep the most recent cap-1 turns, matching the stored-history
            // truncation of the deployed bot.
            while session.turns.len() > self.cap.saturating_sub(1) {
                session.turns.pop_front();
            }
        }
        session.last_activity = Some(now);
    }

    /// Empty the stored turns for `key` without touching the session record.
    pub async fn clear(&self, key: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(key) {
            session.turns.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_access_creates_empty_session() {
        let store = SessionStore::new(20, 600);
        let history = store.history("user-1", Utc::now()).await;
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_append_and_history_roundtrip() {
        let store = SessionStore::new(20, 600);
        let now = Utc::now();

        store.append("user-1", Role::User, "bonjour", now).await;
        store.append("user-1", Role::Assistant, "salut", now).await;

        let history = store.history("user-1", now).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].content, "salut");
    }

    #[tokio::test]
    async fn test_cap_never_exceeded_and_newest_survives() {
        let store = SessionStore::new(20, 600);
        let now = Utc::now();

        for i in 0..50 {
            store
                .append("user-1", Role::User, &format!("message-{}", i), now)
                .await;
        }

        let history = store.history("user-1", now).await;
        assert!(history.len() <= 20);
        assert_eq!(history.last().unwrap().content, "message-49");
    }

    #[tokio::test]
    async fn test_lazy_expiry_on_read() {
        let store = SessionStore::new(20, 600);
        let now = Utc::now();

        store.append("user-1", Role::User, "hello", now).await;

        // Just inside the timeout: history survives.
        let later = now + Duration::seconds(599);
        assert_eq!(store.history("user-1", later).await.len(), 1);

        // Past the timeout: the next read returns empty.
        let expired = later + Duration::seconds(601);
        assert!(store.history("user-1", expired).await.is_empty());

        // A fresh append after expiry starts a new sequence.
        store.append("user-1", Role::User, "again", expired).await;
        assert_eq!(store.history("user-1", expired).await.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_empties_turns_only() {
        let store = SessionStore::new(20, 600);
        let now = Utc::now();

        store.append("user-1", Role::User, "hello", now).await;
        store.clear("user-1").await;

        assert!(store.history("user-1", now).await.is_empty());

        // The session record still exists and accepts appends.
        store.append("user-1", Role::User, "fresh", now).await;
        assert_eq!(store.history("user-1", now).await.len(), 1);
    }

    #[tokio::test]
    async fn test_keys_do_not_share_history() {
        let store = SessionStore::new(20, 600);
        let now = Utc::now();

        store.append("user-1", Role::User, "mine", now).await;
        assert!(store.history("user-2", now).await.is_empty());
    }
}
