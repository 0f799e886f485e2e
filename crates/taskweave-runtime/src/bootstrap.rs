//! Bootstrap helpers for starting taskweave from a single YAML config.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use thiserror::Error;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use taskweave_config::{load_config, ConfigError, ObservabilityConfig, TaskweaveConfig};
use taskweave_core::env::{EnvLookup, LayeredEnv, ProcessEnv, StaticEnv};
use taskweave_core::planner::{
    FallbackPlanner, PlanError, Planner, RuleBasedPlanner, RuleBasedSettings,
};
use taskweave_core::{Executor, ToolRegistry};
use taskweave_planners::{build_planner_from_config, DefaultLlmClientFactory, LlmClientFactory};

use crate::agent::Agent;
use crate::scratchpad::Scratchpad;
use crate::session::SessionStore;

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("planning failed: {0}")]
    Planning(#[from] PlanError),
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();
const LOG_FILE_ENV: &str = "TASKWEAVE_LOG_FILE";

impl Agent {
    /// Create an agent from a single `taskweave.yaml`.
    pub fn from_config_path(
        path: impl AsRef<Path>,
        tools: ToolRegistry,
    ) -> Result<Self, RuntimeError> {
        let config = load_config(path.as_ref())?;
        init_tracing_if_needed(&config.observability);
        Ok(build_agent(&config, tools))
    }
}

/// Build an agent from loaded config using the default LLM client factory.
pub fn build_agent(config: &TaskweaveConfig, tools: ToolRegistry) -> Agent {
    build_agent_with_factory(config, tools, &DefaultLlmClientFactory)
}

/// Build an agent, creating LLM clients through `factory`.
pub fn build_agent_with_factory(
    config: &TaskweaveConfig,
    tools: ToolRegistry,
    factory: &dyn LlmClientFactory,
) -> Agent {
    let env = build_env(config);
    let planner = build_planner(config, env.clone(), factory);
    let executor = Executor::new(tools).with_env(env);
    let agent = Agent::new(
        Arc::new(planner),
        executor,
        SessionStore::from_config(&config.session),
    )
    .with_max_history(config.planner.max_history);
    match open_scratchpad(config) {
        Some(scratchpad) => agent.with_scratchpad(Arc::new(scratchpad)),
        None => agent,
    }
}

/// Scratchpad at `session.scratchpad_path`. A file that cannot be opened
/// leaves the agent without one.
fn open_scratchpad(config: &TaskweaveConfig) -> Option<Scratchpad> {
    let path = config.session.scratchpad_path.as_deref()?;
    match Scratchpad::open(path) {
        Ok(scratchpad) => {
            tracing::info!(path, "scratchpad ready");
            Some(scratchpad)
        }
        Err(err) => {
            tracing::warn!(path, error = %err, "scratchpad unavailable");
            None
        }
    }
}

/// Config `env:` overrides first, then the process environment.
pub fn build_env(config: &TaskweaveConfig) -> Arc<dyn EnvLookup> {
    let overrides: StaticEnv = config
        .env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<std::collections::HashMap<_, _>>()
        .into();
    Arc::new(LayeredEnv::new(vec![
        Arc::new(overrides),
        Arc::new(ProcessEnv),
    ]))
}

/// LLM oracle when enabled and buildable, wrapped with the rule-based
/// fallback. A backend that fails to build degrades to rule-based planning.
pub fn build_planner(
    config: &TaskweaveConfig,
    env: Arc<dyn EnvLookup>,
    factory: &dyn LlmClientFactory,
) -> FallbackPlanner {
    let settings = RuleBasedSettings {
        standings_url: config.fallback.standings_url.clone(),
        standings_url_env: config.fallback.standings_url_env.clone(),
        recipient_env: config.fallback.recipient_env.clone(),
        default_recipient: config.fallback.default_recipient.clone(),
    };
    let rule_based = RuleBasedPlanner::new(settings, env);

    if !config.planner.enabled {
        tracing::info!("llm planner disabled, using rule-based planning only");
        return FallbackPlanner::new(None, rule_based);
    }

    let built = build_planner_from_config(&config.planner, factory);
    let oracle: Option<Arc<dyn Planner>> = match built {
        Ok(planner) => {
            tracing::info!(
                backend = %config.planner.backend.kind,
                model = %config.planner.backend.model,
                "llm planner ready"
            );
            Some(Arc::new(planner))
        }
        Err(err) => {
            tracing::warn!(
                backend = %config.planner.backend.kind,
                error = %err,
                "llm planner unavailable, using rule-based planning"
            );
            None
        }
    };
    FallbackPlanner::new(oracle, rule_based)
}

/// Install the global fmt subscriber once per process.
pub fn init_tracing_if_needed(observability: &ObservabilityConfig) {
    TRACING_INIT.get_or_init(|| {
        let log_file_path = std::env::var(LOG_FILE_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| observability.log_file.clone());
        let file_writer = log_file_path.as_deref().and_then(create_log_writer);
        let fallback_level = match observability.log_level.trim().to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => "info",
        };
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback_level))
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let span_events = if observability.traces_enabled {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let to_file = file_writer.is_some();
        let writer = match file_writer {
            Some(writer) => BoxMakeWriter::new(writer),
            None => BoxMakeWriter::new(std::io::stderr),
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_ansi(!to_file)
            .with_writer(writer)
            .with_span_events(span_events)
            .try_init();

        tracing::info!(
            log_level = %observability.log_level,
            traces_enabled = observability.traces_enabled,
            log_file = log_file_path.as_deref().unwrap_or("(stderr)"),
            "tracing initialized"
        );
    });
}

fn create_log_writer(path: &str) -> Option<SharedFileMakeWriter> {
    use std::fs::{create_dir_all, OpenOptions};

    let file_path = Path::new(path);
    if let Some(parent) = file_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = create_dir_all(parent) {
                eprintln!(
                    "failed to create log directory '{}': {}",
                    parent.display(),
                    err
                );
                return None;
            }
        }
    }
    match OpenOptions::new().create(true).append(true).open(file_path) {
        Ok(file) => Some(SharedFileMakeWriter::new(file)),
        Err(err) => {
            eprintln!("failed to open log file '{}': {}", file_path.display(), err);
            None
        }
    }
}

#[derive(Clone)]
struct SharedFileMakeWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl SharedFileMakeWriter {
    fn new(file: std::fs::File) -> Self {
        Self {
            file: Arc::new(std::sync::Mutex::new(file)),
        }
    }
}

struct SharedFileWriter {
    file: Arc<std::sync::Mutex<std::fs::File>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedFileMakeWriter {
    type Writer = SharedFileWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileWriter {
            file: self.file.clone(),
        }
    }
}

impl std::io::Write for SharedFileWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file mutex poisoned"))?;
        file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| std::io::Error::other("log file mutex poisoned"))?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskweave_config::BackendSpec;
    use taskweave_planners::{LlmBuildError, LlmClient, MockLlmClient};

    struct MockFactory;

    impl LlmClientFactory for MockFactory {
        fn build(&self, _backend: &BackendSpec) -> Result<Arc<dyn LlmClient>, LlmBuildError> {
            Ok(Arc::new(MockLlmClient::new(r#"{"steps": []}"#)))
        }
    }

    #[test]
    fn test_config_env_overrides_process_env() {
        let mut config = TaskweaveConfig::default();
        config
            .env
            .insert("TASKWEAVE_TEST_SELF_EMAIL".to_string(), "cfg@example.com".to_string());
        let env = build_env(&config);
        assert_eq!(
            env.lookup("TASKWEAVE_TEST_SELF_EMAIL").as_deref(),
            Some("cfg@example.com")
        );
        assert_eq!(env.lookup("TASKWEAVE_TEST_NOT_SET_ANYWHERE"), None);
    }

    #[test]
    fn test_disabled_planner_has_no_oracle() {
        let mut config = TaskweaveConfig::default();
        config.planner.enabled = false;
        let planner = build_planner(&config, build_env(&config), &MockFactory);
        assert!(!planner.has_oracle());
    }

    #[test]
    fn test_enabled_planner_uses_factory() {
        let config = TaskweaveConfig::default();
        let planner = build_planner(&config, build_env(&config), &MockFactory);
        assert!(planner.has_oracle());
    }

    #[test]
    fn test_unbuildable_backend_degrades_to_rule_based() {
        let mut config = TaskweaveConfig::default();
        config.planner.backend.kind = "not-a-backend".to_string();
        let planner = build_planner(&config, build_env(&config), &DefaultLlmClientFactory);
        assert!(!planner.has_oracle());
    }

    #[test]
    fn test_scratchpad_is_opened_only_when_configured() {
        let mut config = TaskweaveConfig::default();
        let agent = build_agent_with_factory(&config, ToolRegistry::new(), &MockFactory);
        assert!(agent.scratchpad().is_none());

        let path = std::env::temp_dir()
            .join(format!("taskweave-boot-{}", uuid::Uuid::new_v4()))
            .join("scratchpad.jsonl");
        config.session.scratchpad_path = Some(path.display().to_string());
        let agent = build_agent_with_factory(&config, ToolRegistry::new(), &MockFactory);
        assert_eq!(agent.scratchpad().map(Scratchpad::path), Some(path.as_path()));
        let _ = std::fs::remove_file(&path);

        config.session.scratchpad_path = Some("/dev/null/taskweave/pad.jsonl".to_string());
        let agent = build_agent_with_factory(&config, ToolRegistry::new(), &MockFactory);
        assert!(agent.scratchpad().is_none());
    }

    #[test]
    fn test_from_config_path_reports_missing_file() {
        let result = Agent::from_config_path(
            "/nonexistent/taskweave-test/taskweave.yaml",
            ToolRegistry::new(),
        );
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }
}
