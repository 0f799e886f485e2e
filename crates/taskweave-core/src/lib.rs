//! # Taskweave Core
//!
//! Plan graph and deterministic execution logic for the taskweave agent.
//!
//! This crate contains:
//! - ExecutionPlan / PlanStep / ToolRequest / ToolResult definitions
//! - Placeholder grammar, argument preprocessing and request validation
//! - Wave-based plan execution with blackboard projection
//! - Tool and Planner abstractions plus the rule-based fallback planner
//!
//! This crate does NOT care about:
//! - Which LLM produces plans
//! - How tools talk to external services
//! - How sessions are stored or logs are written

pub mod catalog;
pub mod env;
pub mod executor;
pub mod placeholder;
pub mod planner;
pub mod request;
pub mod store;
pub mod tool;
pub mod types;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::catalog::{ToolSpec, BUILTIN_TOOLS};
    pub use crate::env::{EnvLookup, LayeredEnv, ProcessEnv, StaticEnv};
    pub use crate::executor::{
        ExecutionProgressEvent, ExecutionProgressReporter, ExecutionResult, Executor,
    };
    pub use crate::placeholder::{Placeholder, ResolveScope, Source, StepResults};
    pub use crate::planner::{
        FallbackPlanner, HistoryItem, PlanError, Planner, PlannerContext, Role, RuleBasedPlanner,
        RuleBasedSettings,
    };
    pub use crate::request::{
        prepare_tool_request, validate_tool_request, RequestPreparer, ValidationError,
    };
    pub use crate::store::{project_step_output, Blackboard};
    pub use crate::tool::{Tool, ToolError, ToolMeta, ToolRegistry};
    pub use crate::types::{
        ExecutionPlan, PlanId, PlanStep, Status, StepId, ToolOutput, ToolRequest, ToolResult,
    };
}

// Re-export key types at crate root
pub use executor::{ExecutionProgressEvent, ExecutionProgressReporter, ExecutionResult, Executor};
pub use planner::{Planner, PlannerContext};
pub use store::Blackboard;
pub use tool::{Tool, ToolRegistry};
pub use types::{ExecutionPlan, PlanStep, Status, StepId, ToolRequest, ToolResult};
