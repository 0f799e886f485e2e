//! Agent - goal in, report out
//!
//! One `process_goal` call records the user goal in the conversation
//! history, asks the planner for a plan, runs it against the session's
//! blackboard and turns the outcome into a short user-facing report.
//! `execute_workflow` runs a goal once on a throwaway blackboard.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use taskweave_core::executor::{truncate_for_log, ExecutionResult};
use taskweave_core::planner::{HistoryItem, Planner, PlannerContext};
use taskweave_core::tool::catalog_metadata;
use taskweave_core::types::{ExecutionPlan, Status};
use taskweave_core::{Blackboard, Executor};

use crate::bootstrap::RuntimeError;
use crate::scratchpad::{EntryKind, Scratchpad, ScratchpadEntry};
use crate::session::SessionStore;

const DEFAULT_MAX_HISTORY: usize = 3;

/// Outcome of one goal
#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub conversation_id: String,
    pub success: bool,
    pub plan: ExecutionPlan,
    pub message: String,
}

/// Outcome of a one-shot workflow run
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub conversation_id: String,
    pub plan: ExecutionPlan,
    pub result: ExecutionResult,
    pub blackboard: Blackboard,
}

impl WorkflowRun {
    pub fn success(&self) -> bool {
        self.result.is_completed()
    }
}

pub struct Agent {
    planner: Arc<dyn Planner>,
    executor: Executor,
    sessions: SessionStore,
    max_history: usize,
    scratchpad: Option<Arc<Scratchpad>>,
}

impl Agent {
    pub fn new(planner: Arc<dyn Planner>, executor: Executor, sessions: SessionStore) -> Self {
        Self {
            planner,
            executor,
            sessions,
            max_history: DEFAULT_MAX_HISTORY,
            scratchpad: None,
        }
    }

    /// Also log every goal and reply to `scratchpad`
    pub fn with_scratchpad(mut self, scratchpad: Arc<Scratchpad>) -> Self {
        self.scratchpad = Some(scratchpad);
        self
    }

    pub fn scratchpad(&self) -> Option<&Scratchpad> {
        self.scratchpad.as_deref()
    }

    /// Number of history entries handed to the planner
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Plan and execute `goal` inside a conversation.
    ///
    /// A missing conversation id starts a fresh conversation. Goals on the
    /// same conversation are serialized by the session lock.
    pub async fn process_goal(
        &self,
        goal: &str,
        conversation_id: Option<&str>,
    ) -> Result<AgentReply, RuntimeError> {
        let conversation_id = conversation_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = self.sessions.session(&conversation_id).await;
        let mut guard = session.lock().await;
        let session = &mut *guard;

        tracing::info!(
            conversation_id = %conversation_id,
            goal = %truncate_for_log(goal, 200),
            "processing goal"
        );
        session.push_history(HistoryItem::user(goal));

        let context = PlannerContext::new(catalog_metadata())
            .with_history(session.recent_history(self.max_history))
            .with_blackboard(session.blackboard.clone());
        let mut plan = self.planner.create_plan(goal, &context).await?;
        tracing::info!(
            conversation_id = %conversation_id,
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            "plan created"
        );

        let result = self
            .executor
            .execute_plan(&mut plan, &mut session.blackboard)
            .await;
        let success = result.is_completed();
        let message = compose_message(&plan, &result, &session.blackboard);

        session.push_history(HistoryItem::assistant(message.clone()));
        session.last_plan = Some(plan.clone());
        self.record(&[
            ScratchpadEntry::new(&conversation_id, EntryKind::UserMessage, goal),
            ScratchpadEntry::new(&conversation_id, EntryKind::AgentResponse, message.as_str())
                .with_meta("plan_id", json!(plan.plan_id))
                .with_meta("success", json!(success)),
        ]);

        if success {
            tracing::info!(
                conversation_id = %conversation_id,
                plan_id = %plan.plan_id,
                "goal completed"
            );
        } else {
            tracing::warn!(
                conversation_id = %conversation_id,
                plan_id = %plan.plan_id,
                error = result.error().as_deref().unwrap_or(""),
                "goal failed"
            );
        }

        Ok(AgentReply {
            conversation_id,
            success,
            plan,
            message,
        })
    }

    /// Plan and run `goal` once on a fresh blackboard.
    ///
    /// The planner sees only the tool catalog. Session history and the
    /// session blackboard are left alone; when a conversation id is given,
    /// the finished plan becomes that session's `last_plan`.
    pub async fn execute_workflow(
        &self,
        goal: &str,
        conversation_id: Option<&str>,
    ) -> Result<WorkflowRun, RuntimeError> {
        let context = PlannerContext::new(catalog_metadata());
        let mut plan = self.planner.create_plan(goal, &context).await?;
        let mut blackboard = Blackboard::new();
        tracing::info!(
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            goal = %truncate_for_log(goal, 200),
            "executing workflow"
        );
        let result = self.executor.execute_plan(&mut plan, &mut blackboard).await;

        let conversation_id = match conversation_id {
            Some(id) => {
                let session = self.sessions.session(id).await;
                session.lock().await.last_plan = Some(plan.clone());
                id.to_string()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        tracing::info!(
            conversation_id = %conversation_id,
            plan_id = %plan.plan_id,
            success = result.is_completed(),
            "workflow finished"
        );

        Ok(WorkflowRun {
            conversation_id,
            plan,
            result,
            blackboard,
        })
    }

    fn record(&self, entries: &[ScratchpadEntry]) {
        let Some(scratchpad) = &self.scratchpad else {
            return;
        };
        if let Err(err) = scratchpad.append_batch(entries) {
            tracing::warn!(
                path = %scratchpad.path().display(),
                error = %err,
                "failed to write scratchpad entries"
            );
        }
    }
}

fn compose_message(
    plan: &ExecutionPlan,
    result: &ExecutionResult,
    blackboard: &Blackboard,
) -> String {
    if result.is_completed() {
        success_message(plan, blackboard)
    } else {
        failure_message(plan)
    }
}

fn success_message(plan: &ExecutionPlan, blackboard: &Blackboard) -> String {
    let mut lines = vec![format!("Completed: {}", plan.goal)];
    let highlights = [
        ("sheet_url", "Sheet"),
        ("share_link", "Share link"),
        ("email_message_id", "Email sent, message id"),
    ];
    for (key, label) in highlights {
        if let Some(value) = blackboard.get(key) {
            let text = value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string());
            lines.push(format!("{}: {}", label, text));
        }
    }
    let completed = plan.steps_with_status(Status::Completed).count();
    lines.push(format!(
        "Completed {}/{} steps.",
        completed,
        plan.steps.len()
    ));
    lines.join("\n")
}

fn failure_message(plan: &ExecutionPlan) -> String {
    match plan.first_failed_step() {
        Some(step) => format!(
            "Failed at step '{}': {}",
            step.description,
            step.error().unwrap_or("Unknown error")
        ),
        None => format!("Failed to complete: {}", plan.goal),
    }
}
