//! Chat-completions client for OpenAI and servers that speak its protocol
//! (vLLM, Ollama, LM Studio, ...).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{
    effective_model, status_error, LlmClient, LlmError, LlmRequest, ResponseFormat,
};

pub const OPENAI_CHAT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Clone)]
pub struct OpenAiClientConfig {
    /// Full chat-completions URL
    pub endpoint: String,
    /// Sent as a bearer token when present
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for OpenAiClientConfig {
    fn default() -> Self {
        Self {
            endpoint: OPENAI_CHAT_ENDPOINT.to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiClientConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }

    fn body(&self, request: &LlmRequest) -> Value {
        let mut messages = Vec::with_capacity(2);
        if !request.system.trim().is_empty() {
            messages.push(json!({"role": "system", "content": request.system}));
        }
        messages.push(json!({"role": "user", "content": request.user}));

        let mut body = json!({
            "model": effective_model(request, &self.config.model),
            "messages": messages,
            "temperature": request.temperature,
        });
        if request.format == ResponseFormat::JsonObject {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

fn completion_text(completion: Completion) -> Result<String, LlmError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Response("completion has no choices".to_string()))?;
    if let Some(refusal) = choice.message.refusal.filter(|r| !r.is_empty()) {
        return Err(LlmError::Response(format!("model refused: {}", refusal)));
    }
    match choice.message.content.filter(|c| !c.trim().is_empty()) {
        Some(content) => Ok(content),
        None => Err(LlmError::Response(format!(
            "empty completion (finish_reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        ))),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let mut call = self.http.post(&self.config.endpoint).json(&self.body(&request));
        if let Some(key) = &self.config.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().await.map_err(|e| LlmError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let completion: Completion = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;
        completion_text(completion)
    }
}
