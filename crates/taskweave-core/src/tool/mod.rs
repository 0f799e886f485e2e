//! Tool abstraction module
//!
//! - Tool: an opaque async function identified by name
//! - ToolMeta: planner-facing description
//! - ToolRegistry: name -> tool lookup shared with the executor

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::catalog;
use crate::types::ToolOutput;

/// Tool invocation errors
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Failed(String),
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        ToolError::Failed(message.into())
    }
}

/// Tool trait - one external capability the executor can dispatch to
///
/// Implementations receive fully resolved arguments and return either an
/// output mapping or an error. Any retry or timeout policy is theirs.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name, matched against `PlanStep::tool`
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description())
    }

    async fn call(&self, args: Map<String, Value>) -> Result<ToolOutput, ToolError>;
}

/// Tool metadata for planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMeta {
    pub name: String,
    pub description: String,
    pub required_args: Vec<String>,
}

impl ToolMeta {
    /// Create metadata, taking required arguments from the catalog when known
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let required_args = catalog::lookup(&name)
            .map(|spec| spec.required_args.iter().map(|a| a.to_string()).collect())
            .unwrap_or_default();
        Self {
            name,
            description: description.into(),
            required_args,
        }
    }
}

/// Metadata for every built-in catalog tool, in catalog order
pub fn catalog_metadata() -> Vec<ToolMeta> {
    catalog::BUILTIN_TOOLS
        .iter()
        .map(|spec| ToolMeta::new(spec.name, spec.description))
        .collect()
}

/// Tool registry for looking up tools by name
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool of the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn metadata(&self) -> Vec<ToolMeta> {
        let mut metas: Vec<ToolMeta> = self.tools.values().map(|tool| tool.metadata()).collect();
        metas.sort_by(|a, b| a.name.cmp(&b.name));
        metas
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
