//! Conversation store
//!
//! Conversation id to bounded message deque, shared across requests.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Messages kept per conversation
pub const MAX_STORED_MESSAGES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

struct Session {
    messages: VecDeque<ChatMessage>,
    last_active: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            messages: VecDeque::new(),
            last_active: Instant::now(),
        }
    }

    fn push(&mut self, message: ChatMessage) {
        if self.messages.len() == MAX_STORED_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        self.last_active = Instant::now();
    }
}

/// Keyed conversation histories
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    history_exchanges: usize,
}

impl SessionManager {
    /// `history_exchanges` user/assistant pairs are replayed to the model
    pub fn new(history_exchanges: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            history_exchanges,
        }
    }

    /// The most recent messages to send with the next model call
    pub async fn history(&self, conversation_id: &str) -> Vec<ChatMessage> {
        let sessions = self.sessions.read().await;
        let Some(session) = sessions.get(conversation_id) else {
            return Vec::new();
        };

        let keep = self.history_exchanges * 2;
        let skip = session.messages.len().saturating_sub(keep);
        session.messages.iter().skip(skip).cloned().collect()
    }

    pub async fn append(&self, conversation_id: &str, message: ChatMessage) {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(conversation_id.to_string())
            .or_insert_with(Session::new)
            .push(message);
    }

    /// Record a user turn and its answer under one lock
    pub async fn record_exchange(&self, conversation_id: &str, user: &str, assistant: &str) {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(conversation_id.to_string())
            .or_insert_with(Session::new);
        session.push(ChatMessage::user(user));
        session.push(ChatMessage::assistant(assistant));
    }

    /// Drop a conversation; false if it did not exist
    pub async fn reset(&self, conversation_id: &str) -> bool {
        self.sessions.write().await.remove(conversation_id).is_some()
    }

    /// Drop conversations idle for longer than `older_than`
    pub async fn evict_idle(&self, older_than: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active.elapsed() <= older_than);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted idle conversations");
        }
        evicted
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Stored message count for a conversation
    pub async fn stored_len(&self, conversation_id: &str) -> usize {
        self.sessions
            .read()
            .await
            .get(conversation_id)
            .map_or(0, |s| s.messages.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_truncated_to_exchanges() {
        let sessions = SessionManager::new(8);
        for i in 0..10 {
            sessions
                .record_exchange("c1", &format!("q{}", i), &format!("a{}", i))
                .await;
        }

        let history = sessions.history("c1").await;
        assert_eq!(history.len(), 16);
        assert_eq!(history[0], ChatMessage::user("q2"));
        assert_eq!(history[15], ChatMessage::assistant("a9"));
        assert_eq!(sessions.stored_len("c1").await, 20);
    }

    #[tokio::test]
    async fn test_stored_history_capped() {
        let sessions = SessionManager::new(8);
        for i in 0..30 {
            sessions.record_exchange("c1", &format!("q{}", i), "a").await;
        }
        assert_eq!(sessions.stored_len("c1").await, MAX_STORED_MESSAGES);
    }

    #[tokio::test]
    async fn test_reset() {
        let sessions = SessionManager::new(8);
        sessions.append("c1", ChatMessage::user("hola")).await;
        sessions.append("c2", ChatMessage::user("hello")).await;
        assert_eq!(sessions.active_count().await, 2);

        assert!(sessions.reset("c1").await);
        assert!(!sessions.reset("c1").await);
        assert!(sessions.history("c1").await.is_empty());
        assert_eq!(sessions.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_evict_idle() {
        let sessions = SessionManager::new(8);
        sessions.append("c1", ChatMessage::user("hola")).await;

        assert_eq!(sessions.evict_idle(Duration::from_secs(3600)).await, 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(sessions.evict_idle(Duration::from_millis(1)).await, 1);
        assert_eq!(sessions.active_count().await, 0);
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }
}
