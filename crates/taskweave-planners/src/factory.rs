//! LLM client factory for building clients from backend configuration.

use std::sync::Arc;

use thiserror::Error;

use taskweave_config::{ApiKeyError, BackendSpec, PlannerConfig};

use crate::client::LlmClient;
use crate::gemini::{GeminiClient, GeminiClientConfig};
use crate::openai::{OpenAiClient, OpenAiClientConfig, OPENAI_CHAT_ENDPOINT};
use crate::planner::{LlmPlanner, LlmPlannerConfig};

/// Errors that can occur when building an LLM client.
#[derive(Debug, Error)]
pub enum LlmBuildError {
    #[error("unknown backend kind: {0}")]
    UnknownKind(String),
    #[error("missing API key for backend")]
    MissingApiKey,
    #[error("environment variable '{0}' not found")]
    EnvNotFound(String),
    #[error("backend kind '{0}' requires an endpoint")]
    MissingEndpoint(String),
    #[error("client initialization failed: {0}")]
    Client(String),
}

impl From<ApiKeyError> for LlmBuildError {
    fn from(err: ApiKeyError) -> Self {
        match err {
            ApiKeyError::NotConfigured => LlmBuildError::MissingApiKey,
            ApiKeyError::EnvNotFound(name) => LlmBuildError::EnvNotFound(name),
        }
    }
}

/// Factory trait for building LLM clients.
pub trait LlmClientFactory: Send + Sync {
    fn build(&self, backend: &BackendSpec) -> Result<Arc<dyn LlmClient>, LlmBuildError>;
}

/// Default factory: Gemini or OpenAI-compatible HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLlmClientFactory;

impl LlmClientFactory for DefaultLlmClientFactory {
    fn build(&self, backend: &BackendSpec) -> Result<Arc<dyn LlmClient>, LlmBuildError> {
        build_client_from_backend(backend)
    }
}

/// Build an LLM client from a backend spec.
///
/// `gemini`/`google` need an API key; `openai` defaults its endpoint;
/// `openai_compatible` needs an explicit endpoint and may run without a key.
pub fn build_client_from_backend(
    backend: &BackendSpec,
) -> Result<Arc<dyn LlmClient>, LlmBuildError> {
    match backend.kind.to_lowercase().as_str() {
        "gemini" | "google" => {
            let api_key = backend.resolve_api_key()?;
            let mut config = GeminiClientConfig {
                api_key,
                model: backend.model.clone(),
                timeout_secs: backend.timeout_secs,
                ..GeminiClientConfig::default()
            };
            if let Some(endpoint) = &backend.endpoint {
                config.endpoint = endpoint.clone();
            }
            let client =
                GeminiClient::new(config).map_err(|e| LlmBuildError::Client(e.to_string()))?;
            Ok(Arc::new(client))
        }
        kind @ ("openai" | "openai_compatible") => {
            let endpoint = match (&backend.endpoint, kind) {
                (Some(endpoint), _) => endpoint.clone(),
                (None, "openai") => OPENAI_CHAT_ENDPOINT.to_string(),
                (None, _) => return Err(LlmBuildError::MissingEndpoint(backend.kind.clone())),
            };
            let api_key = match backend.resolve_api_key() {
                Ok(key) => Some(key),
                Err(ApiKeyError::NotConfigured) if kind != "openai" => None,
                Err(err) => return Err(err.into()),
            };
            let config = OpenAiClientConfig {
                endpoint,
                api_key,
                model: backend.model.clone(),
                timeout_secs: backend.timeout_secs,
            };
            let client =
                OpenAiClient::new(config).map_err(|e| LlmBuildError::Client(e.to_string()))?;
            Ok(Arc::new(client))
        }
        _ => Err(LlmBuildError::UnknownKind(backend.kind.clone())),
    }
}

/// Build the LLM planner described by the `planner` config section.
pub fn build_planner_from_config(
    config: &PlannerConfig,
    factory: &dyn LlmClientFactory,
) -> Result<LlmPlanner<Arc<dyn LlmClient>>, LlmBuildError> {
    let client = factory.build(&config.backend)?;
    let planner_config = LlmPlannerConfig {
        model: config.backend.model.clone(),
        temperature: config.backend.temperature,
        max_history: config.max_history,
        ..LlmPlannerConfig::default()
    };
    Ok(LlmPlanner::new(client, planner_config))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_backend(kind: &str, api_key_env: Option<&str>) -> BackendSpec {
        BackendSpec {
            kind: kind.to_string(),
            endpoint: None,
            model: "test-model".to_string(),
            api_key_env: api_key_env.map(str::to_string),
            temperature: 0.2,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_unknown_kind() {
        let result = build_client_from_backend(&make_backend("not-a-real-backend-kind", None));
        assert!(matches!(result, Err(LlmBuildError::UnknownKind(_))));
    }

    #[test]
    fn test_missing_env_var() {
        let backend = make_backend("gemini", Some("TASKWEAVE_TEST_MISSING_KEY"));
        std::env::remove_var("TASKWEAVE_TEST_MISSING_KEY");
        let result = build_client_from_backend(&backend);
        assert!(matches!(result, Err(LlmBuildError::EnvNotFound(_))));

        let result = build_client_from_backend(&make_backend("openai", None));
        assert!(matches!(result, Err(LlmBuildError::MissingApiKey)));
    }

    #[test]
    fn test_openai_compatible_requires_endpoint_but_not_key() {
        let mut backend = make_backend("openai_compatible", None);
        assert!(matches!(
            build_client_from_backend(&backend),
            Err(LlmBuildError::MissingEndpoint(_))
        ));

        backend.endpoint = Some("http://localhost:11434/v1/chat/completions".to_string());
        assert!(build_client_from_backend(&backend).is_ok());
    }

    #[test]
    fn test_build_planner_from_config_carries_model_settings() {
        let mut config = PlannerConfig::default();
        config.backend = make_backend("openai_compatible", None);
        config.backend.endpoint = Some("http://localhost:8080/v1/chat/completions".to_string());
        config.max_history = 5;

        let planner =
            build_planner_from_config(&config, &DefaultLlmClientFactory).expect("planner");
        assert_eq!(planner.config.model, "test-model");
        assert_eq!(planner.config.max_history, 5);
    }
}
