//! Planning: goal text in, `ExecutionPlan` out.
//!
//! A planner picks catalog tools and wires their outputs together with
//! placeholders and `depends_on` edges. It never resolves placeholders or
//! schedules anything; that is the executor's job.

mod fallback;

pub use fallback::{FallbackPlanner, RuleBasedPlanner, RuleBasedSettings};

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::Blackboard;
use crate::tool::ToolMeta;
use crate::types::ExecutionPlan;

#[derive(Debug, Error)]
pub enum PlanError {
    /// Nothing the oracle proposed maps onto a catalog tool
    #[error("No suitable tools found for goal")]
    NoSuitableTools,

    /// Oracle answered but the answer is not a usable plan
    #[error("Failed to generate plan: {0}")]
    Generation(String),

    /// Oracle could not be reached or refused to answer
    #[error("Planning oracle error: {0}")]
    Oracle(String),
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn create_plan(
        &self,
        goal: &str,
        context: &PlannerContext,
    ) -> Result<ExecutionPlan, PlanError>;
}

/// Everything a planner may look at. Owned snapshot, safe to hand to a
/// remote oracle.
#[derive(Debug, Clone, Default)]
pub struct PlannerContext {
    pub available_tools: Vec<ToolMeta>,
    /// Oldest first
    pub history: Vec<HistoryItem>,
    pub blackboard: Blackboard,
}

impl PlannerContext {
    pub fn new(available_tools: Vec<ToolMeta>) -> Self {
        Self {
            available_tools,
            ..Self::default()
        }
    }

    pub fn with_history(mut self, history: Vec<HistoryItem>) -> Self {
        self.history = history;
        self
    }

    pub fn with_blackboard(mut self, blackboard: Blackboard) -> Self {
        self.blackboard = blackboard;
        self
    }

    /// The last `n` history entries, oldest first.
    pub fn recent_history(&self, n: usize) -> &[HistoryItem] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn get_tool(&self, name: &str) -> Option<&ToolMeta> {
        self.available_tools.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        })
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl HistoryItem {
    pub fn user(content: impl Into<String>) -> Self {
        Self::at(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::at(Role::Assistant, content)
    }

    fn at(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::catalog_metadata;
    use serde_json::json;

    #[test]
    fn test_recent_history_is_a_tail_window() {
        let context = PlannerContext::new(catalog_metadata()).with_history(vec![
            HistoryItem::user("a"),
            HistoryItem::assistant("b"),
            HistoryItem::user("c"),
        ]);
        let tail: Vec<_> = context
            .recent_history(2)
            .iter()
            .map(|h| h.content.as_str())
            .collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert_eq!(context.recent_history(0).len(), 0);
        assert_eq!(context.recent_history(9).len(), 3);
    }

    #[test]
    fn test_history_role_serializes_lowercase() {
        let item = HistoryItem::assistant("done");
        let value = serde_json::to_value(&item).expect("json");
        assert_eq!(value["role"], json!("assistant"));
        assert_eq!(Role::User.to_string(), "user");
    }
}
