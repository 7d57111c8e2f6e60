//! LLM runtime adapter
//!
//! Ollama-style `/api/chat`: non-streaming, one assistant message back.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::session::ChatMessage;
use crate::models::{ModelClient, ModelError};

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier reported in health
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;

    async fn health_check(&self) -> Result<(), ModelError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model: String,
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "llama3.2:3b".to_string(),
            temperature: 0.3,
        }
    }
}

pub struct OllamaChat {
    client: ModelClient,
    config: OllamaConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OllamaChat {
    pub fn new(client: ModelClient, config: OllamaConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
            },
        };

        let response: ChatResponse = self.client.post_json("api/chat", &body).await?;
        let content = response.message.content.trim().to_string();
        if content.is_empty() {
            return Err(ModelError::InvalidResponse("empty chat answer".to_string()));
        }
        Ok(content)
    }

    async fn health_check(&self) -> Result<(), ModelError> {
        self.client.probe("api/tags").await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hola")];
        let body = ChatRequest {
            model: "llama3.2:3b",
            messages: &messages,
            stream: false,
            options: ChatOptions { temperature: 0.3 },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "llama3.2:3b");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hola");
    }

    #[test]
    fn test_response_parse() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"model":"llama3.2:3b","message":{"role":"assistant","content":" Hi "},"done":true}"#,
        )
        .unwrap();
        assert_eq!(parsed.message.content, " Hi ");
    }
}
