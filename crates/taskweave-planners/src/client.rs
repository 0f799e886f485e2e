//! Transport-neutral completion interface shared by all backends.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

/// What the planner expects back from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    #[default]
    Text,
    /// Ask the backend for a single JSON object (OpenAI `json_object`,
    /// Gemini `application/json`).
    JsonObject,
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    /// Empty means the client's configured model.
    pub model: String,
    pub temperature: f32,
    pub format: ResponseFormat,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

#[async_trait]
impl LlmClient for Arc<dyn LlmClient> {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        (**self).complete(request).await
    }
}

/// Canned reply; remembers the last request it saw.
#[derive(Debug, Default)]
pub struct MockLlmClient {
    pub response: String,
    last_request: Mutex<Option<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            last_request: Mutex::new(None),
        }
    }

    pub fn last_request(&self) -> Option<LlmRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }
        Ok(self.response.clone())
    }
}

/// Pick the request model, falling back to the client default.
pub(crate) fn effective_model<'a>(request: &'a LlmRequest, default: &'a str) -> &'a str {
    if request.model.trim().is_empty() {
        default
    } else {
        request.model.as_str()
    }
}

/// Read a non-2xx body into an error without losing the status.
pub(crate) async fn status_error(response: reqwest::Response) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    LlmError::Response(format!("HTTP {}: {}", status, body.trim()))
}
