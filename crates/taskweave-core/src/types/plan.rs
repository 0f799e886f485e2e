//! Plan type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{PlanStep, Status};

/// Type alias for Plan ID
pub type PlanId = String;

/// A goal plus its steps. Steps are kept in creation order; execution order
/// comes from `depends_on` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub plan_id: PlanId,
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<PlanStep>,
    #[serde(default)]
    pub status: Status,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionPlan {
    /// Create a new pending plan with a fresh id
    pub fn new(goal: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            goal: goal.into(),
            steps,
            status: Status::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Get a step by ID
    pub fn get_step(&self, step_id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }

    /// Steps that have reached `status`
    pub fn steps_with_status(&self, status: Status) -> impl Iterator<Item = &PlanStep> {
        self.steps.iter().filter(move |s| s.status == status)
    }

    /// First failed step in plan order, used for user-facing reports
    pub fn first_failed_step(&self) -> Option<&PlanStep> {
        self.steps_with_status(Status::Failed).next()
    }

    pub(crate) fn start(&mut self) {
        if self.status == Status::Pending {
            self.status = Status::InProgress;
        }
    }

    pub(crate) fn complete(&mut self) {
        if self.status.can_transition_to(Status::Completed) {
            self.status = Status::Completed;
            self.completed_at = Some(Utc::now());
        }
    }

    pub(crate) fn fail(&mut self) {
        if self.status.can_transition_to(Status::Failed) {
            self.status = Status::Failed;
        }
    }
}
