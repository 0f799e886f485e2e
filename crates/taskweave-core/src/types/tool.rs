//! Tool request/result contracts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::StepId;

/// Output mapping produced by a successful tool call.
pub type ToolOutput = Map<String, Value>;

/// Fully resolved, validated unit of work handed to a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Tool name
    pub name: String,
    /// Concrete arguments
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Carried through from the originating step for traceability
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    /// Originating step id
    pub request_id: StepId,
}

/// Immutable outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub request_id: StepId,
    pub name: String,
    pub success: bool,
    /// Present iff `success`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ToolOutput>,
    /// Present iff not `success`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    pub fn success(
        request_id: impl Into<StepId>,
        name: impl Into<String>,
        output: ToolOutput,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            name: name.into(),
            success: true,
            output: Some(output),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        request_id: impl Into<StepId>,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            name: name.into(),
            success: false,
            output: None,
            error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }
}
