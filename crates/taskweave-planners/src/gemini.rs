//! Google Gemini `generateContent` backend.
//!
//! The key travels in the `x-goog-api-key` header rather than the query
//! string, so it never ends up in request logs. JSON-object requests turn on
//! Gemini's JSON mode (`responseMimeType: application/json`).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::client::{
    effective_model, status_error, LlmClient, LlmError, LlmRequest, ResponseFormat,
};

pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Clone)]
pub struct GeminiClientConfig {
    pub api_key: String,
    pub model: String,
    /// API root; `/models/{model}:generateContent` is appended
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for GeminiClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.0-flash".to_string(),
            endpoint: GEMINI_ENDPOINT.to_string(),
            timeout_secs: 30,
        }
    }
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiClientConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Http("Gemini API key is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GeminiClientConfig {
        &self.config
    }

    fn url(&self, request: &LlmRequest) -> String {
        let model = effective_model(request, &self.config.model);
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        )
    }
}

fn generate_body(request: &LlmRequest) -> Value {
    let mut generation = json!({
        "temperature": request.temperature,
        "candidateCount": 1,
    });
    if request.format == ResponseFormat::JsonObject {
        generation["responseMimeType"] = json!("application/json");
    }
    let mut body = json!({
        "contents": [{"role": "user", "parts": [{"text": request.user}]}],
        "generationConfig": generation,
    });
    if !request.system.trim().is_empty() {
        body["systemInstruction"] = json!({"parts": [{"text": request.system}]});
    }
    body
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Generated {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

/// Text of the first candidate, or why there is none.
fn candidate_text(generated: Generated) -> Result<String, LlmError> {
    if let Some(reason) = generated.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::Response(format!("prompt blocked: {}", reason)));
    }
    let candidate = generated
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Response("Gemini returned no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if !text.trim().is_empty() {
        return Ok(text);
    }
    Err(LlmError::Response(format!(
        "Gemini candidate has no text (finishReason: {})",
        candidate.finish_reason.as_deref().unwrap_or("unknown")
    )))
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError> {
        let response = self
            .http
            .post(self.url(&request))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&generate_body(&request))
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;
        if !response.status().is_success() {
            return Err(status_error(response).await);
        }
        let generated: Generated = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;
        candidate_text(generated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(endpoint: &str) -> GeminiClient {
        GeminiClient::new(GeminiClientConfig {
            api_key: "k".to_string(),
            endpoint: endpoint.to_string(),
            ..Default::default()
        })
        .expect("client")
    }

    #[test]
    fn test_url_keeps_key_out_and_normalizes_model() {
        let client = client("https://example.test/v1beta/");
        let mut request = LlmRequest::default();
        assert_eq!(
            client.url(&request),
            "https://example.test/v1beta/models/gemini-2.0-flash:generateContent"
        );
        request.model = "models/gemini-1.5-pro".to_string();
        assert_eq!(
            client.url(&request),
            "https://example.test/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let result = GeminiClient::new(GeminiClientConfig::default());
        assert!(matches!(result, Err(LlmError::Http(_))));
    }

    #[test]
    fn test_json_mode_and_system_instruction() {
        let request = LlmRequest {
            system: "plan tools".to_string(),
            user: "goal".to_string(),
            format: ResponseFormat::JsonObject,
            ..LlmRequest::default()
        };
        let body = generate_body(&request);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], json!("plan tools"));

        let body = generate_body(&LlmRequest::default());
        assert!(body["generationConfig"].get("responseMimeType").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn test_candidate_text_reports_blocks_and_finish_reason() {
        let ok: Generated = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"steps\":"}, {"text": "[]}"}]}}]
        }))
        .expect("json");
        assert_eq!(candidate_text(ok).expect("text"), "{\"steps\":[]}");

        let blocked: Generated =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}}))
                .expect("json");
        assert!(matches!(
            candidate_text(blocked),
            Err(LlmError::Response(m)) if m.contains("SAFETY")
        ));

        let cut: Generated =
            serde_json::from_value(json!({"candidates": [{"finishReason": "MAX_TOKENS"}]}))
                .expect("json");
        assert!(matches!(
            candidate_text(cut),
            Err(LlmError::Response(m)) if m.contains("MAX_TOKENS")
        ));
    }

    #[tokio::test]
    #[ignore = "requires GEMINI_API_KEY and network"]
    async fn test_live_json_mode_completion() {
        let Ok(api_key) = std::env::var("GEMINI_API_KEY") else {
            return;
        };
        let client = GeminiClient::new(GeminiClientConfig {
            api_key,
            ..Default::default()
        })
        .expect("client");
        let reply = client
            .complete(LlmRequest {
                user: "Return {\"steps\": []} and nothing else.".to_string(),
                format: ResponseFormat::JsonObject,
                ..LlmRequest::default()
            })
            .await
            .expect("completion");
        assert!(reply.contains("steps"));
    }
}
