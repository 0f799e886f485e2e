//! Environment configuration lookup for `{env.NAME}` placeholders

use std::collections::HashMap;
use std::sync::Arc;

/// Name -> value lookup consulted by the placeholder resolver.
pub trait EnvLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

impl<T: EnvLookup + ?Sized> EnvLookup for Arc<T> {
    fn lookup(&self, name: &str) -> Option<String> {
        (**self).lookup(name)
    }
}

/// Reads the process environment. Empty values count as unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvLookup for ProcessEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Fixed in-memory values.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    values: HashMap<String, String>,
}

impl StaticEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl From<HashMap<String, String>> for StaticEnv {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}

impl EnvLookup for StaticEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// First layer that knows the name wins.
pub struct LayeredEnv {
    layers: Vec<Arc<dyn EnvLookup>>,
}

impl LayeredEnv {
    pub fn new(layers: Vec<Arc<dyn EnvLookup>>) -> Self {
        Self { layers }
    }
}

impl EnvLookup for LayeredEnv {
    fn lookup(&self, name: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.lookup(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_env_prefers_first_layer() {
        let env = LayeredEnv::new(vec![
            Arc::new(StaticEnv::new().with("SELF_EMAIL", "override@example.com")),
            Arc::new(
                StaticEnv::new()
                    .with("SELF_EMAIL", "base@example.com")
                    .with("CHAT_ID", "42"),
            ),
        ]);
        assert_eq!(
            env.lookup("SELF_EMAIL").as_deref(),
            Some("override@example.com")
        );
        assert_eq!(env.lookup("CHAT_ID").as_deref(), Some("42"));
        assert_eq!(env.lookup("MISSING"), None);
    }
}
