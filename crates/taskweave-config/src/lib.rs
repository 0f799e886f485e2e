//! # Taskweave Config
//!
//! Single-file configuration for taskweave. One `taskweave.yaml` configures
//! the planner backend, the rule-based fallback, session limits, env
//! overrides for `{env.NAME}` placeholders, and observability.

mod loader;

pub use loader::{load_config, parse_config, validate_config, ConfigError};

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

/// Top-level configuration schema.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskweaveConfig {
    /// Config schema version.
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// Values consulted before the process environment
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_version() -> u32 {
    1
}

impl Default for TaskweaveConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            app: AppConfig::default(),
            planner: PlannerConfig::default(),
            fallback: FallbackConfig::default(),
            session: SessionConfig::default(),
            env: BTreeMap::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
        }
    }
}

fn default_app_name() -> String {
    "taskweave".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlannerConfig {
    /// When false, plans always come from the rule-based planner
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub backend: BackendSpec,
    /// History entries handed to the planner prompt
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: BackendSpec::default(),
            max_history: default_max_history(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    3
}

/// LLM backend used by the planner.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendSpec {
    /// `gemini`, `openai` or any OpenAI-compatible label
    #[serde(default = "default_backend_kind")]
    pub kind: String,
    /// Optional API base URL override.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Env var holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendSpec {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            endpoint: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BackendSpec {
    /// Resolve API key from the configured env var
    pub fn resolve_api_key(&self) -> Result<String, ApiKeyError> {
        let env_name = self.api_key_env.as_ref().ok_or(ApiKeyError::NotConfigured)?;
        std::env::var(env_name)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ApiKeyError::EnvNotFound(env_name.clone()))
    }
}

fn default_backend_kind() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> Option<String> {
    Some("GEMINI_API_KEY".to_string())
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    30
}

/// API key resolution errors.
#[derive(Debug, Error)]
pub enum ApiKeyError {
    #[error("API key environment variable not configured")]
    NotConfigured,
    #[error("Environment variable '{0}' not found")]
    EnvNotFound(String),
}

/// Rule-based planner settings.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_standings_url")]
    pub standings_url: String,
    #[serde(default = "default_standings_url_env")]
    pub standings_url_env: String,
    #[serde(default = "default_recipient_env")]
    pub recipient_env: String,
    #[serde(default = "default_recipient")]
    pub default_recipient: String,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            standings_url: default_standings_url(),
            standings_url_env: default_standings_url_env(),
            recipient_env: default_recipient_env(),
            default_recipient: default_recipient(),
        }
    }
}

fn default_standings_url() -> String {
    "https://www.formula1.com/en/results/2025/drivers".to_string()
}

fn default_standings_url_env() -> String {
    "F1_STANDINGS_URL".to_string()
}

fn default_recipient_env() -> String {
    "SELF_EMAIL".to_string()
}

fn default_recipient() -> String {
    "your_email@example.com".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Messages kept per conversation
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Conversations kept in memory before the least recently used is evicted
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// JSONL conversation log; unset disables it
    #[serde(default)]
    pub scratchpad_path: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_sessions: default_max_sessions(),
            scratchpad_path: None,
        }
    }
}

fn default_history_window() -> usize {
    10
}

fn default_max_sessions() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub traces_enabled: bool,
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            traces_enabled: false,
            log_file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
