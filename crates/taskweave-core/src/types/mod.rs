//! Core type definitions
//!
//! - ExecutionPlan: a goal with its dependency-ordered steps
//! - PlanStep: one tool invocation plus status and result
//! - ToolRequest / ToolResult: the resolved unit of work and its outcome

mod plan;
mod step;
mod tool;

pub use plan::{ExecutionPlan, PlanId};
pub use step::{PlanStep, Status, StepId};
pub use tool::{ToolOutput, ToolRequest, ToolResult};
