//! `Planner` backed by any `LlmClient`.

use async_trait::async_trait;

use taskweave_core::executor::truncate_for_log;
use taskweave_core::planner::{PlanError, Planner, PlannerContext};
use taskweave_core::types::ExecutionPlan;

use crate::client::{LlmClient, LlmRequest, ResponseFormat};
use crate::plan_json::parse_plan_steps;
use crate::prompt::{system_prompt, user_prompt, DEFAULT_PERSONA};

const MAX_PROMPT_LOG_CHARS: usize = 4_000;
const MAX_REPLY_LOG_CHARS: usize = 8_000;

#[derive(Debug, Clone)]
pub struct LlmPlannerConfig {
    /// Empty defers to the client's own default model.
    pub model: String,
    pub temperature: f32,
    /// History entries included in the prompt
    pub max_history: usize,
    pub persona: String,
    /// Ask the backend for JSON mode. Turn off for servers that reject
    /// `response_format`.
    pub json_mode: bool,
}

impl Default for LlmPlannerConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.2,
            max_history: 3,
            persona: DEFAULT_PERSONA.to_string(),
            json_mode: true,
        }
    }
}

pub struct LlmPlanner<C: LlmClient> {
    pub client: C,
    pub config: LlmPlannerConfig,
}

impl<C: LlmClient> LlmPlanner<C> {
    pub fn new(client: C, config: LlmPlannerConfig) -> Self {
        Self { client, config }
    }

    fn request(&self, goal: &str, context: &PlannerContext) -> LlmRequest {
        LlmRequest {
            system: system_prompt(&self.config.persona, context),
            user: user_prompt(goal, context, self.config.max_history),
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            format: if self.config.json_mode {
                ResponseFormat::JsonObject
            } else {
                ResponseFormat::Text
            },
        }
    }
}

#[async_trait]
impl<C: LlmClient> Planner for LlmPlanner<C> {
    async fn create_plan(
        &self,
        goal: &str,
        context: &PlannerContext,
    ) -> Result<ExecutionPlan, PlanError> {
        let request = self.request(goal, context);
        tracing::info!(
            model = %self.config.model,
            tools = context.available_tools.len(),
            history = context.history.len(),
            json_mode = self.config.json_mode,
            "requesting plan"
        );
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                system_prompt = %truncate_for_log(&request.system, MAX_PROMPT_LOG_CHARS),
                user_prompt = %truncate_for_log(&request.user, MAX_PROMPT_LOG_CHARS),
                "planner prompts"
            );
        }

        let reply = self
            .client
            .complete(request)
            .await
            .map_err(|e| PlanError::Oracle(e.to_string()))?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            tracing::debug!(
                reply = %truncate_for_log(&reply, MAX_REPLY_LOG_CHARS),
                "planner reply"
            );
        }

        let steps = parse_plan_steps(&reply)?;
        if steps.is_empty() {
            return Err(PlanError::NoSuitableTools);
        }
        let plan = ExecutionPlan::new(goal, steps);
        tracing::info!(plan_id = %plan.plan_id, steps = plan.steps.len(), "plan parsed");
        Ok(plan)
    }
}
