use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use ca_core::{ChatMessage, CompletionRequest, Error, ModelClient, ResearchOutput, Result};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_RESEARCH_MODEL: &str = "perplexity/sonar-deep-research";
const DEFAULT_CONTENT_MODEL: &str = "openai/gpt-4o-mini";

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    json_schema: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    citations: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    reasoning_details: Option<serde_json::Value>,
}

pub struct OpenRouterClient {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    research_model: String,
    content_model: String,
}

impl fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("research_model", &self.research_model)
            .field("content_model", &self.content_model)
            .finish()
    }
}

impl OpenRouterClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .ok_or_else(|| Error::Config("OpenRouter API key is required".to_string()))?;
        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            research_model: DEFAULT_RESEARCH_MODEL.to_string(),
            content_model: DEFAULT_CONTENT_MODEL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_research_model(mut self, model: impl Into<String>) -> Self {
        self.research_model = model.into();
        self
    }

    pub fn with_content_model(mut self, model: impl Into<String>) -> Self {
        self.content_model = model.into();
        self
    }

    pub fn content_model(&self) -> &str {
        &self.content_model
    }

    async fn post_chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // The body text rides along in the error message so the retry
            // layer can classify the failure by substring.
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Model(format!(
                "OpenRouter returned {}: {}",
                status.as_u16(),
                body
            )));
        }

        Ok(response.json::<ChatResponse>().await?)
    }
}

#[async_trait]
impl ModelClient for OpenRouterClient {
    fn name(&self) -> &str {
        "OpenRouter"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let model = if request.model.is_empty() {
            self.content_model.clone()
        } else {
            request.model
        };
        let response_format = Some(match request.schema {
            Some(schema) => ResponseFormat {
                kind: "json_schema".to_string(),
                json_schema: Some(schema),
            },
            None => ResponseFormat {
                kind: "json_object".to_string(),
                json_schema: None,
            },
        });

        let response = self
            .post_chat(ChatRequest {
                model,
                messages: request.messages,
                response_format,
            })
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Model("OpenRouter response contained no choices".to_string()))
    }

    async fn deep_research(&self, messages: &[ChatMessage]) -> Result<ResearchOutput> {
        let response = self
            .post_chat(ChatRequest {
                model: self.research_model.clone(),
                messages: messages.to_vec(),
                response_format: None,
            })
            .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("OpenRouter response contained no choices".to_string()))?;

        Ok(ResearchOutput {
            content: choice.message.content,
            citations: response.citations,
            reasoning_details: choice.message.reasoning_details,
        })
    }
}
