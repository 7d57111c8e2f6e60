//! Chat service
//!
//! Screens the question, pulls guide context, calls the model with the
//! conversation history and records both turns.

use serde::Serialize;
use std::sync::Arc;

use super::guide::ReferenceGuide;
use super::llm::ChatModel;
use super::session::{ChatMessage, SessionManager};
use super::topic::{TopicFilter, REFUSAL};
use super::{ChatError, ChatResult};

/// Longest accepted user message, in characters
pub const MAX_MESSAGE_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a diabetes education assistant focused on type 1 diabetes.

Only answer questions about: type 1 diabetes; glucose, insulin and glucose monitoring; \
nutrition and carbohydrate counting for people with diabetes; exercise and diabetes; \
hypoglycemia and hyperglycemia; complications; diabetes technology such as pumps, sensors \
and meters; symptoms, diagnosis and treatment.

If a question is not about type 1 diabetes, reply exactly with the refusal sentence below.

Never give personalised medical advice or specific doses. Recommend consulting the treating \
physician for important decisions, and say so when you lack enough information.

Answer clearly and with empathy, in the same language the user writes in.";

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub conversation_id: String,
    pub response: String,
    /// False when the topic filter answered instead of the model
    pub answered_by_model: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatHealth {
    pub status: &'static str,
    pub model: String,
    pub guide_loaded: bool,
    pub guide_chunks: usize,
    pub active_conversations: usize,
}

pub struct ChatService {
    sessions: SessionManager,
    model: Arc<dyn ChatModel>,
    guide: Option<ReferenceGuide>,
    filter: TopicFilter,
}

impl ChatService {
    pub fn new(
        model: Arc<dyn ChatModel>,
        sessions: SessionManager,
        guide: Option<ReferenceGuide>,
    ) -> Self {
        Self {
            sessions,
            model,
            guide,
            filter: TopicFilter,
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    fn system_message(&self, question: &str) -> ChatMessage {
        let context = self
            .guide
            .as_ref()
            .and_then(|g| g.context_for(question))
            .map(|c| format!("\n\n{}", c))
            .unwrap_or_default();

        ChatMessage::system(format!(
            "{}\n\nRefusal sentence: \"{}\"{}",
            SYSTEM_PROMPT, REFUSAL, context
        ))
    }

    /// Answer a message within a conversation, starting one if needed
    pub async fn respond(
        &self,
        conversation_id: Option<String>,
        message: &str,
    ) -> ChatResult<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ChatError::Validation("message must not be empty".to_string()));
        }
        if message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ChatError::Validation(format!(
                "message longer than {} characters",
                MAX_MESSAGE_CHARS
            )));
        }

        let conversation_id = conversation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if !self.filter.is_on_topic(message) {
            tracing::info!(conversation_id = %conversation_id, "Question rejected by topic filter");
            self.sessions
                .record_exchange(&conversation_id, message, REFUSAL)
                .await;
            return Ok(ChatReply {
                conversation_id,
                response: REFUSAL.to_string(),
                answered_by_model: false,
            });
        }

        let mut messages = vec![self.system_message(message)];
        messages.extend(self.sessions.history(&conversation_id).await);
        messages.push(ChatMessage::user(message));

        let answer = self.model.chat(&messages).await?;

        let (response, answered_by_model) = if self.filter.is_off_topic_answer(&answer) {
            tracing::warn!(conversation_id = %conversation_id, "Off-topic answer replaced");
            (REFUSAL.to_string(), false)
        } else {
            (answer, true)
        };

        self.sessions
            .record_exchange(&conversation_id, message, &response)
            .await;

        tracing::debug!(
            conversation_id = %conversation_id,
            history = messages.len() - 2,
            "Chat answered"
        );

        Ok(ChatReply {
            conversation_id,
            response,
            answered_by_model,
        })
    }

    pub async fn reset(&self, conversation_id: &str) -> bool {
        self.sessions.reset(conversation_id).await
    }

    pub async fn health(&self) -> ChatHealth {
        let status = match self.model.health_check().await {
            Ok(()) => "online",
            Err(e) => {
                tracing::warn!(error = %e, "Chat model health check failed");
                "unavailable"
            }
        };

        ChatHealth {
            status,
            model: self.model.name().to_string(),
            guide_loaded: self.guide.as_ref().is_some_and(|g| !g.is_empty()),
            guide_chunks: self.guide.as_ref().map_or(0, |g| g.len()),
            active_conversations: self.sessions.active_count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::testing::{DownChat, ScriptedChat};
    use crate::chat::Role;

    fn service(model: Arc<dyn ChatModel>) -> ChatService {
        ChatService::new(
            model,
            SessionManager::new(8),
            Some(ReferenceGuide::from_text(
                "Basal insulin covers background needs between meals.",
            )),
        )
    }

    #[tokio::test]
    async fn test_on_topic_reaches_model() {
        let model = Arc::new(ScriptedChat::new("Basal insulin works in the background."));
        let chat = service(model.clone());

        let reply = chat
            .respond(Some("c1".into()), "What does basal insulin do?")
            .await
            .unwrap();
        assert_eq!(reply.conversation_id, "c1");
        assert!(reply.answered_by_model);
        assert_eq!(reply.response, "Basal insulin works in the background.");

        let seen = model.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent[0].role, Role::System);
        assert!(sent[0].content.contains("Basal insulin covers"));
        assert_eq!(sent.last().unwrap(), &ChatMessage::user("What does basal insulin do?"));
    }

    #[tokio::test]
    async fn test_off_topic_refused_without_model() {
        let model = Arc::new(ScriptedChat::new("unused"));
        let chat = service(model.clone());

        let reply = chat.respond(None, "Explain the french revolution").await.unwrap();
        assert_eq!(reply.response, REFUSAL);
        assert!(!reply.answered_by_model);
        assert!(!reply.conversation_id.is_empty());
        assert_eq!(model.calls(), 0);

        // Refusal is recorded
        assert_eq!(chat.sessions().stored_len(&reply.conversation_id).await, 2);
    }

    #[tokio::test]
    async fn test_off_topic_answer_replaced() {
        let chat = service(Arc::new(ScriptedChat::new("Sure! Here is some python code.")));
        let reply = chat.respond(None, "help me with my glucose log").await.unwrap();
        assert_eq!(reply.response, REFUSAL);
    }

    #[tokio::test]
    async fn test_history_replayed() {
        let model = Arc::new(ScriptedChat::new("ok, glucose noted"));
        let chat = service(model.clone());

        chat.respond(Some("c1".into()), "my glucose is 90").await.unwrap();
        chat.respond(Some("c1".into()), "and insulin?").await.unwrap();

        let seen = model.seen.lock().unwrap();
        // system + 1 prior exchange + new question
        assert_eq!(seen[1].len(), 4);
        assert_eq!(seen[1][1], ChatMessage::user("my glucose is 90"));
    }

    #[tokio::test]
    async fn test_model_down_is_error() {
        let chat = service(Arc::new(DownChat));
        let err = chat.respond(None, "insulin question").await.unwrap_err();
        assert!(matches!(err, ChatError::Model(_)));

        let health = chat.health().await;
        assert_eq!(health.status, "unavailable");
        assert!(health.guide_loaded);
        assert_eq!(health.guide_chunks, 1);
    }

    #[tokio::test]
    async fn test_validation_and_reset() {
        let chat = service(Arc::new(ScriptedChat::new("glucose info")));
        assert!(matches!(
            chat.respond(None, "   ").await.unwrap_err(),
            ChatError::Validation(_)
        ));
        let long = "glucose ".repeat(300);
        assert!(chat.respond(None, &long).await.is_err());

        chat.respond(Some("c9".into()), "glucose?").await.unwrap();
        assert!(chat.reset("c9").await);
        assert!(!chat.reset("c9").await);
        assert_eq!(chat.health().await.active_conversations, 0);
    }
}
