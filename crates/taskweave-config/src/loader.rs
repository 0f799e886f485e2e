//! Configuration loading and validation.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::TaskweaveConfig;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Load and validate configuration from a YAML file.
pub fn load_config(path: &Path) -> Result<TaskweaveConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from YAML text.
pub fn parse_config(content: &str) -> Result<TaskweaveConfig, ConfigError> {
    let config: TaskweaveConfig = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &TaskweaveConfig) -> Result<(), ConfigError> {
    if config.version == 0 {
        return Err(ConfigError::Invalid(
            "version must be greater than 0".to_string(),
        ));
    }

    if config.app.name.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "app.name must not be empty".to_string(),
        ));
    }

    if config.planner.enabled {
        let backend = &config.planner.backend;
        if backend.kind.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "planner.backend.kind must not be empty".to_string(),
            ));
        }
        if backend.model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "planner.backend.model must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&backend.temperature) {
            return Err(ConfigError::Invalid(format!(
                "planner.backend.temperature must be within 0..=2, got {}",
                backend.temperature
            )));
        }
    }

    if config.session.history_window == 0 {
        return Err(ConfigError::Invalid(
            "session.history_window must be > 0".to_string(),
        ));
    }

    if config.session.max_sessions == 0 {
        return Err(ConfigError::Invalid(
            "session.max_sessions must be > 0".to_string(),
        ));
    }

    if matches!(config.session.scratchpad_path.as_deref(), Some(path) if path.trim().is_empty()) {
        return Err(ConfigError::Invalid(
            "session.scratchpad_path must not be empty when set".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_config_accepts_defaults() {
        let config = TaskweaveConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.session.history_window, 10);
        assert_eq!(config.planner.backend.kind, "gemini");
    }

    #[test]
    fn test_parse_config_fills_missing_sections() {
        let config = parse_config(
            r#"
version: 1
planner:
  backend:
    kind: openai
    model: gpt-4o-mini
    api_key_env: OPENAI_API_KEY
env:
  SELF_EMAIL: me@example.com
"#,
        )
        .expect("config");

        assert_eq!(config.planner.backend.kind, "openai");
        assert_eq!(config.planner.backend.timeout_secs, 30);
        assert_eq!(config.fallback.recipient_env, "SELF_EMAIL");
        assert_eq!(config.env.get("SELF_EMAIL").map(String::as_str), Some("me@example.com"));
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_validate_config_rejects_bad_values() {
        let mut config = TaskweaveConfig::default();
        config.session.history_window = 0;
        assert!(matches!(validate_config(&config), Err(ConfigError::Invalid(_))));

        let mut config = TaskweaveConfig::default();
        config.planner.backend.temperature = 3.5;
        assert!(matches!(validate_config(&config), Err(ConfigError::Invalid(_))));

        let mut config = TaskweaveConfig::default();
        config.session.scratchpad_path = Some("  ".to_string());
        assert!(matches!(validate_config(&config), Err(ConfigError::Invalid(_))));

        let mut config = TaskweaveConfig::default();
        config.planner.enabled = false;
        config.planner.backend.model = String::new();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_parse_config_reports_yaml_errors() {
        assert!(matches!(parse_config("version: [1"), Err(ConfigError::Parse(_))));
        assert!(matches!(parse_config("version: 0"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_config_reads_file() {
        let path = std::env::temp_dir().join(format!("taskweave-{}.yaml", uuid::Uuid::new_v4()));
        fs::write(&path, "app:\n  name: weave-test\n").expect("write config");
        let config = load_config(&path).expect("load");
        let _ = fs::remove_file(&path);
        assert_eq!(config.app.name, "weave-test");

        assert!(matches!(
            load_config(Path::new("/nonexistent/taskweave.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
