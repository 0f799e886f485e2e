//! Step type definitions
//!
//! A PlanStep is one tool invocation inside an ExecutionPlan, together with
//! its dependency edges and the status the engine has driven it to.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::ToolResult;

/// Strongly-typed Step ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StepId(pub String);

impl StepId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StepId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StepId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&StepId> for StepId {
    fn from(value: &StepId) -> Self {
        value.clone()
    }
}

impl From<StepId> for String {
    fn from(value: StepId) -> Self {
        value.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for StepId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for StepId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for StepId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Lifecycle status shared by steps and plans.
///
/// Transitions are monotonic: pending -> in_progress -> {completed, failed}.
/// A pending entry may also fail directly (rejected before dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl Status {
    /// Check if this status is terminal
    pub fn is_settled(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    /// Whether moving from `self` to `next` respects the monotonic order.
    pub fn can_transition_to(&self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Pending, Status::InProgress)
                | (Status::Pending, Status::Failed)
                | (Status::InProgress, Status::Completed)
                | (Status::InProgress, Status::Failed)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::Pending => "pending",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A single step in the execution plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique identifier for this step within its plan
    #[serde(alias = "id")]
    pub step_id: StepId,
    /// Name of the tool to invoke
    pub tool: String,
    /// Raw arguments; strings may embed `{source.path}` placeholders
    #[serde(default)]
    pub args: Map<String, Value>,
    /// IDs of steps this step depends on, in declaration order
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    #[serde(default)]
    pub status: Status,
    /// Present once the step is settled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolResult>,
    /// Human-readable description (not used by the engine)
    #[serde(default)]
    pub description: String,
}

impl PlanStep {
    /// Create a new pending step
    pub fn new(step_id: impl Into<StepId>, tool: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            args: Map::new(),
            depends_on: Vec::new(),
            status: Status::Pending,
            result: None,
            description: String::new(),
        }
    }

    /// Set arguments. Non-object values are ignored.
    pub fn with_args(mut self, args: Value) -> Self {
        if let Value::Object(map) = args {
            self.args = map;
        }
        self
    }

    /// Add dependencies
    pub fn with_depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StepId>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Add a description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Error message recorded for a failed step, if any
    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().and_then(|r| r.error.as_deref())
    }

    pub(crate) fn mark_in_progress(&mut self) -> bool {
        self.advance(Status::InProgress)
    }

    pub(crate) fn settle(&mut self, result: ToolResult) -> bool {
        let next = if result.success {
            Status::Completed
        } else {
            Status::Failed
        };
        if self.advance(next) {
            self.result = Some(result);
            true
        } else {
            false
        }
    }

    fn advance(&mut self, next: Status) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                step_id = %self.step_id,
                from = %self.status,
                to = %next,
                "ignored non-monotonic step transition"
            );
            return false;
        }
        self.status = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_transitions_are_monotonic() {
        assert!(Status::Pending.can_transition_to(Status::InProgress));
        assert!(Status::Pending.can_transition_to(Status::Failed));
        assert!(Status::InProgress.can_transition_to(Status::Completed));
        assert!(!Status::Completed.can_transition_to(Status::Pending));
        assert!(!Status::Failed.can_transition_to(Status::InProgress));
        assert!(!Status::Pending.can_transition_to(Status::Completed));
    }

    #[test]
    fn test_settled_step_cannot_restart() {
        let mut step = PlanStep::new("step1", "extract_webpage");
        assert!(step.mark_in_progress());
        assert!(step.settle(ToolResult::failure("step1", "extract_webpage", "boom")));
        assert_eq!(step.status, Status::Failed);
        assert!(!step.mark_in_progress());
        assert_eq!(step.error(), Some("boom"));
    }

    #[test]
    fn test_step_deserializes_with_planner_defaults() {
        let step: PlanStep = serde_json::from_value(json!({
            "step_id": "step2",
            "tool": "google_sheets_upsert",
            "args": {"rows": "{step1.rows}"},
            "depends_on": ["step1"],
            "description": "write sheet"
        }))
        .expect("step");
        assert_eq!(step.status, Status::Pending);
        assert_eq!(step.depends_on, vec![StepId::from("step1")]);
        assert!(step.result.is_none());
    }
}
