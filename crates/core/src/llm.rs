//! Chat-completion and embedding client.
//!
//! OpenAI and OpenRouter both expose the OpenAI wire format, so one reqwest-based client
//! covers both. There is no retry: a failed call surfaces as an error to the caller.

use crate::config::LlmConfig;
use crate::prompt::CompletionRequest;
use crate::{NarrativeError, NarrativeResult};
use async_trait::async_trait;
use serde_json::json;

/// Text generation and embedding backend used by the narrative, chat and knowledge services.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run a chat completion and return the assistant's text.
    async fn complete(&self, request: &CompletionRequest) -> NarrativeResult<String>;

    /// Embed `text` for knowledge-base similarity search.
    async fn embed(&self, text: &str) -> NarrativeResult<Vec<f32>>;
}

/// Client for any endpoint speaking the OpenAI chat-completions API.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

impl OpenAiCompatibleClient {
    pub fn new(http: reqwest::Client, config: &LlmConfig) -> Self {
        Self {
            http,
            base_url: config.base_url().to_string(),
            api_key: config.api_key().to_string(),
            chat_model: config.chat_model().to_string(),
            embedding_model: config.embedding_model().to_string(),
        }
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> NarrativeResult<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NarrativeError::LlmAuth);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "language model call to {path} failed");
            return Err(NarrativeError::LlmApi {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!("language model call to {path} returned a non-JSON body");
            NarrativeError::LlmInvalidResponse(e.to_string())
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> NarrativeResult<String> {
        let body = json!({
            "model": self.chat_model,
            "messages": request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let json = self.post("chat/completions", &body).await?;

        json["choices"]
            .as_array()
            .and_then(|choices| choices.first())
            .and_then(|choice| choice["message"]["content"].as_str())
            .map(str::to_string)
            .ok_or_else(|| NarrativeError::LlmInvalidResponse("missing message content".into()))
    }

    async fn embed(&self, text: &str) -> NarrativeResult<Vec<f32>> {
        let body = json!({
            "model": self.embedding_model,
            "input": text,
        });

        let json = self.post("embeddings", &body).await?;

        let values = json["data"]
            .as_array()
            .and_then(|data| data.first())
            .and_then(|item| item["embedding"].as_array())
            .ok_or_else(|| NarrativeError::LlmInvalidResponse("missing embedding".into()))?;

        values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| NarrativeError::LlmInvalidResponse("non-numeric embedding".into()))
            })
            .collect()
    }
}
