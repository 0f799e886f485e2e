//! Executor module
//!
//! The Executor drives one plan to a terminal state:
//! - ready-set computation over `depends_on`
//! - per-wave request preparation and validation
//! - concurrent dispatch of every wave member, joined before the next wave
//! - status updates and blackboard projection, folded in plan order

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::{join_all, FutureExt};
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;

use crate::env::EnvLookup;
use crate::placeholder::StepResults;
use crate::request::{validate_tool_request, RequestPreparer};
use crate::store::{project_step_output, Blackboard};
use crate::tool::{Tool, ToolRegistry};
use crate::types::{ExecutionPlan, PlanId, Status, StepId, ToolRequest, ToolResult};

const MAX_LOG_TEXT_CHARS: usize = 2_000;
const MAX_LOG_JSON_CHARS: usize = 8_000;

/// Cut `input` to `max_chars` characters, noting the original length.
pub fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={}]", char_count));
    preview
}

fn truncate_json_map_for_log(map: &Map<String, Value>, max_chars: usize) -> String {
    truncate_for_log(&Value::Object(map.clone()).to_string(), max_chars)
}

/// Terminal outcome of one `execute_plan` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Every step completed
    Completed,
    /// Ready set became empty with these steps still unsettled
    /// (dependency cycle or reference to an undefined step)
    Unsatisfiable { pending: Vec<StepId> },
    /// A step failed validation or dispatch
    Failed { step_id: StepId, error: String },
}

impl ExecutionResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, ExecutionResult::Completed)
    }

    /// Error text for reporting, if the run did not complete
    pub fn error(&self) -> Option<String> {
        match self {
            ExecutionResult::Completed => None,
            ExecutionResult::Unsatisfiable { pending } => Some(format!(
                "Unsatisfiable dependencies for steps: {}",
                pending
                    .iter()
                    .map(StepId::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            ExecutionResult::Failed { error, .. } => Some(error.clone()),
        }
    }
}

/// Realtime execution progress event.
#[derive(Debug, Clone)]
pub struct ExecutionProgressEvent {
    pub plan_id: PlanId,
    pub step_id: Option<StepId>,
    pub tool: Option<String>,
    /// Phase label, e.g. step_started/step_completed/plan_completed.
    pub phase: String,
    pub message: Option<String>,
    pub metadata: Value,
}

impl ExecutionProgressEvent {
    pub fn new(
        plan_id: impl Into<PlanId>,
        step_id: Option<StepId>,
        tool: Option<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            plan_id: plan_id.into(),
            step_id,
            tool,
            phase: phase.into(),
            message: None,
            metadata: Value::Null,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Sink interface for execution progress reporting.
#[async_trait]
pub trait ExecutionProgressReporter: Send + Sync {
    async fn report(&self, event: ExecutionProgressEvent) -> Result<(), String>;
}

/// One validated wave member waiting for dispatch
struct Dispatch {
    index: usize,
    request: ToolRequest,
    tool: Option<Arc<dyn Tool>>,
}

/// The executor - runs plans wave by wave
pub struct Executor {
    /// Tool registry
    pub tool_registry: Arc<RwLock<ToolRegistry>>,
    preparer: RequestPreparer,
    progress_reporter: Option<Arc<dyn ExecutionProgressReporter>>,
}

impl Executor {
    /// Create a new executor reading `env.*` from the process environment
    pub fn new(tool_registry: ToolRegistry) -> Self {
        Self::with_registry(Arc::new(RwLock::new(tool_registry)))
    }

    /// Create a new executor with a shared registry
    pub fn with_registry(tool_registry: Arc<RwLock<ToolRegistry>>) -> Self {
        Self {
            tool_registry,
            preparer: RequestPreparer::default(),
            progress_reporter: None,
        }
    }

    /// Resolve `env.*` placeholders through `env`
    pub fn with_env(mut self, env: Arc<dyn EnvLookup>) -> Self {
        self.preparer = RequestPreparer::new(env);
        self
    }

    /// Attach a realtime execution progress reporter.
    pub fn with_progress_reporter(mut self, reporter: Arc<dyn ExecutionProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    pub fn preparer(&self) -> &RequestPreparer {
        &self.preparer
    }

    /// Execute `plan` against `blackboard`.
    ///
    /// Completed steps are projected onto the blackboard as they settle, so
    /// on failure the blackboard holds everything produced so far. Steps of
    /// waves that never started stay pending.
    pub async fn execute_plan(
        &self,
        plan: &mut ExecutionPlan,
        blackboard: &mut Blackboard,
    ) -> ExecutionResult {
        if plan.status.is_settled() {
            tracing::warn!(plan_id = %plan.plan_id, status = %plan.status, "plan already settled");
            return settled_outcome(plan);
        }

        plan.start();
        tracing::info!(
            plan_id = %plan.plan_id,
            steps = plan.steps.len(),
            goal = %truncate_for_log(&plan.goal, MAX_LOG_TEXT_CHARS),
            "plan execution started"
        );
        self.report(
            ExecutionProgressEvent::new(plan.plan_id.clone(), None, None, "plan_started")
                .with_metadata(json!({ "step_count": plan.steps.len() })),
        )
        .await;

        let mut results = completed_results(plan);
        let mut completed: Vec<StepId> = Vec::new();
        let mut wave: usize = 0;

        while plan.steps.iter().any(|step| !step.status.is_settled()) {
            let ready = ready_steps(plan, &results);
            if ready.is_empty() {
                let pending: Vec<StepId> = plan
                    .steps
                    .iter()
                    .filter(|step| !step.status.is_settled())
                    .map(|step| step.step_id.clone())
                    .collect();
                return self.fail_unsatisfiable(plan, pending).await;
            }

            wave += 1;
            tracing::debug!(plan_id = %plan.plan_id, wave, size = ready.len(), "wave ready");

            let dispatches = match self.prepare_wave(plan, blackboard, &results, &ready).await {
                Ok(dispatches) => dispatches,
                Err(outcome) => return outcome,
            };

            for dispatch in &dispatches {
                let step = &mut plan.steps[dispatch.index];
                step.mark_in_progress();
                tracing::info!(
                    plan_id = %plan.plan_id,
                    step_id = %step.step_id,
                    tool = %step.tool,
                    wave,
                    "step execution started"
                );
                if tracing::enabled!(tracing::Level::DEBUG) {
                    tracing::debug!(
                        step_id = %step.step_id,
                        args = %truncate_json_map_for_log(
                            &dispatch.request.args,
                            MAX_LOG_JSON_CHARS
                        ),
                        "step resolved args"
                    );
                }
                let event = ExecutionProgressEvent::new(
                    plan.plan_id.clone(),
                    Some(step.step_id.clone()),
                    Some(step.tool.clone()),
                    "step_started",
                )
                .with_metadata(json!({ "wave": wave }));
                self.report(event).await;
            }

            let settled = join_all(dispatches.into_iter().map(|dispatch| async move {
                (dispatch.index, invoke_tool(dispatch.tool, dispatch.request).await)
            }))
            .await;

            let mut first_failure: Option<(StepId, String)> = None;
            for (index, result) in settled {
                let step = &mut plan.steps[index];
                let step_id = step.step_id.clone();
                let tool = step.tool.clone();
                match result.output.clone().filter(|_| result.success) {
                    Some(output) => {
                        let keys = project_step_output(blackboard, &step_id, &tool, &output);
                        tracing::info!(
                            plan_id = %plan.plan_id,
                            step_id = %step_id,
                            tool = %tool,
                            "step execution completed"
                        );
                        if tracing::enabled!(tracing::Level::DEBUG) {
                            tracing::debug!(
                                step_id = %step_id,
                                output = %truncate_json_map_for_log(&output, MAX_LOG_JSON_CHARS),
                                "step output"
                            );
                        }
                        results.insert(step_id.clone(), output);
                        completed.push(step_id.clone());
                        step.settle(result);
                        let event = ExecutionProgressEvent::new(
                            plan.plan_id.clone(),
                            Some(step_id),
                            Some(tool),
                            "step_completed",
                        )
                        .with_metadata(json!({ "blackboard_keys": keys }));
                        self.report(event).await;
                    }
                    None => {
                        let error = result
                            .error
                            .clone()
                            .unwrap_or_else(|| "Tool returned no output".to_string());
                        tracing::error!(
                            plan_id = %plan.plan_id,
                            step_id = %step_id,
                            tool = %tool,
                            error = %truncate_for_log(&error, MAX_LOG_TEXT_CHARS),
                            "step execution failed"
                        );
                        if result.success {
                            step.settle(ToolResult::failure(
                                step_id.clone(),
                                tool.clone(),
                                error.clone(),
                            ));
                        } else {
                            step.settle(result);
                        }
                        let event = ExecutionProgressEvent::new(
                            plan.plan_id.clone(),
                            Some(step_id.clone()),
                            Some(tool),
                            "step_failed",
                        )
                        .with_message(error.clone());
                        self.report(event).await;
                        first_failure.get_or_insert((step_id, error));
                    }
                }
            }

            if let Some((step_id, error)) = first_failure {
                return self.fail_plan(plan, step_id, error).await;
            }
        }

        plan.complete();
        tracing::info!(
            plan_id = %plan.plan_id,
            completed = completed.len(),
            waves = wave,
            "plan execution completed"
        );
        self.report(
            ExecutionProgressEvent::new(plan.plan_id.clone(), None, None, "plan_completed")
                .with_metadata(json!({ "completed_steps": completed, "waves": wave })),
        )
        .await;
        ExecutionResult::Completed
    }

    /// Prepare and validate every ready step before any of them is dispatched.
    /// The first invalid step (plan order) is failed and ends the run.
    async fn prepare_wave(
        &self,
        plan: &mut ExecutionPlan,
        blackboard: &Blackboard,
        results: &StepResults,
        ready: &[usize],
    ) -> Result<Vec<Dispatch>, ExecutionResult> {
        let mut dispatches = Vec::with_capacity(ready.len());
        for &index in ready {
            let request = self
                .preparer
                .prepare_tool_request(&plan.steps[index], blackboard, results);
            if let Err(err) = validate_tool_request(&request) {
                let error = err.to_string();
                let step = &mut plan.steps[index];
                tracing::warn!(
                    plan_id = %plan.plan_id,
                    step_id = %step.step_id,
                    tool = %step.tool,
                    error = %error,
                    "step request rejected"
                );
                let step_id = step.step_id.clone();
                let tool = step.tool.clone();
                step.settle(ToolResult::failure(step_id.clone(), tool.clone(), error.clone()));
                self.report(
                    ExecutionProgressEvent::new(
                        plan.plan_id.clone(),
                        Some(step_id.clone()),
                        Some(tool),
                        "step_failed",
                    )
                    .with_message(error.clone())
                    .with_metadata(json!({ "stage": "validation" })),
                )
                .await;
                return Err(self.fail_plan(plan, step_id, error).await);
            }
            dispatches.push(Dispatch {
                index,
                request,
                tool: None,
            });
        }

        let registry = self.tool_registry.read().await;
        for dispatch in &mut dispatches {
            dispatch.tool = registry.get(&dispatch.request.name);
        }
        Ok(dispatches)
    }

    /// Marks only the plan failed. Steps in waves that never started stay pending.
    async fn fail_plan(
        &self,
        plan: &mut ExecutionPlan,
        step_id: StepId,
        error: String,
    ) -> ExecutionResult {
        plan.fail();
        tracing::warn!(
            plan_id = %plan.plan_id,
            step_id = %step_id,
            error = %truncate_for_log(&error, MAX_LOG_TEXT_CHARS),
            "plan execution failed"
        );
        self.report(
            ExecutionProgressEvent::new(
                plan.plan_id.clone(),
                Some(step_id.clone()),
                None,
                "plan_failed",
            )
            .with_message(error.clone()),
        )
        .await;
        ExecutionResult::Failed { step_id, error }
    }

    async fn fail_unsatisfiable(
        &self,
        plan: &mut ExecutionPlan,
        pending: Vec<StepId>,
    ) -> ExecutionResult {
        plan.fail();
        let outcome = ExecutionResult::Unsatisfiable { pending };
        let message = outcome.error().unwrap_or_default();
        tracing::warn!(plan_id = %plan.plan_id, error = %message, "plan execution failed");
        self.report(
            ExecutionProgressEvent::new(plan.plan_id.clone(), None, None, "plan_failed")
                .with_message(message),
        )
        .await;
        outcome
    }

    async fn report(&self, event: ExecutionProgressEvent) {
        if let Some(reporter) = &self.progress_reporter {
            if let Err(err) = reporter.report(event).await {
                tracing::warn!("failed to report execution progress: {}", err);
            }
        }
    }
}

/// Indices (plan order) of pending steps whose dependencies all completed
fn ready_steps(plan: &ExecutionPlan, results: &StepResults) -> Vec<usize> {
    plan.steps
        .iter()
        .enumerate()
        .filter(|(_, step)| step.status == Status::Pending)
        .filter(|(_, step)| step.depends_on.iter().all(|dep| results.contains_key(dep)))
        .map(|(index, _)| index)
        .collect()
}

fn settled_outcome(plan: &ExecutionPlan) -> ExecutionResult {
    if plan.status == Status::Completed {
        return ExecutionResult::Completed;
    }
    match plan.first_failed_step() {
        Some(step) => ExecutionResult::Failed {
            step_id: step.step_id.clone(),
            error: step.error().unwrap_or_default().to_string(),
        },
        None => ExecutionResult::Unsatisfiable {
            pending: plan
                .steps
                .iter()
                .filter(|step| !step.status.is_settled())
                .map(|step| step.step_id.clone())
                .collect(),
        },
    }
}

async fn invoke_tool(tool: Option<Arc<dyn Tool>>, request: ToolRequest) -> ToolResult {
    let ToolRequest {
        name,
        args,
        request_id,
        ..
    } = request;
    let Some(tool) = tool else {
        let error = format!("Unknown tool: {}", name);
        return ToolResult::failure(request_id, name, error);
    };

    match AssertUnwindSafe(tool.call(args)).catch_unwind().await {
        Ok(Ok(output)) => ToolResult::success(request_id, name, output),
        Ok(Err(err)) => ToolResult::failure(request_id, name, err.to_string()),
        Err(panic) => {
            let error = format!("Tool panicked: {}", panic_message(panic.as_ref()));
            ToolResult::failure(request_id, name, error)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Step results keyed by id, rebuilt from a plan's completed steps
pub fn completed_results(plan: &ExecutionPlan) -> StepResults {
    plan.steps
        .iter()
        .filter(|step| step.status == Status::Completed)
        .filter_map(|step| {
            let output = step.result.as_ref()?.output.clone()?;
            Some((step.step_id.clone(), output))
        })
        .collect::<HashMap<_, _>>()
}
