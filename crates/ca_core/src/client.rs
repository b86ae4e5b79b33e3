use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

/// One turn in a model conversation. `reasoning_details` carries an opaque
/// reasoning trace across turns when the provider supports it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_details: Option<serde_json::Value>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
            reasoning_details: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            reasoning_details: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
            reasoning_details: None,
        }
    }
}

/// A structured-output request. When `schema` is set the backend sends an
/// explicit JSON schema; otherwise it asks for a generic JSON object.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub schema: Option<serde_json::Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            schema: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Result of a research call: raw content (JSON, possibly wrapped in prose)
/// plus whatever source list and reasoning trace the provider surfaced.
#[derive(Debug, Clone)]
pub struct ResearchOutput {
    pub content: String,
    pub citations: Option<Vec<String>>,
    pub reasoning_details: Option<serde_json::Value>,
}

/// Capability boundary to the AI provider. The retry, cache, and citation
/// layers never know which backend is in play.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str;

    /// One structured-output call; returns the raw message content.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// One research call against a reasoning-capable model.
    async fn deep_research(&self, messages: &[ChatMessage]) -> Result<ResearchOutput>;
}
