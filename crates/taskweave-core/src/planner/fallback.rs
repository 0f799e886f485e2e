//! Deterministic planning used when no planning oracle is available

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use super::{PlanError, Planner, PlannerContext};
use crate::catalog;
use crate::env::EnvLookup;
use crate::types::{ExecutionPlan, PlanStep};

const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}";
const DEFAULT_GOAL_URL: &str = "https://example.com";

fn email_regex() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

fn first_email(text: &str) -> Option<&str> {
    email_regex()?.find(text).map(|m| m.as_str())
}

/// Knobs for the rule-based planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleBasedSettings {
    pub standings_url: String,
    /// Env name overriding `standings_url`
    pub standings_url_env: String,
    /// Env name holding the user's own address
    pub recipient_env: String,
    pub default_recipient: String,
}

impl Default for RuleBasedSettings {
    fn default() -> Self {
        Self {
            standings_url: "https://www.formula1.com/en/results/2025/drivers".to_string(),
            standings_url_env: "F1_STANDINGS_URL".to_string(),
            recipient_env: "SELF_EMAIL".to_string(),
            default_recipient: "your_email@example.com".to_string(),
        }
    }
}

/// Keyword-driven planner. Always produces a plan.
pub struct RuleBasedPlanner {
    settings: RuleBasedSettings,
    env: Arc<dyn EnvLookup>,
}

impl RuleBasedPlanner {
    pub fn new(settings: RuleBasedSettings, env: Arc<dyn EnvLookup>) -> Self {
        Self { settings, env }
    }

    pub fn settings(&self) -> &RuleBasedSettings {
        &self.settings
    }

    /// Steps for `goal`
    pub fn plan_steps(&self, goal: &str) -> Vec<PlanStep> {
        let lowered = goal.to_lowercase();
        if lowered.contains("f1") && (lowered.contains("standings") || lowered.contains("driver")) {
            return self.standings_steps(goal);
        }

        vec![PlanStep::new("step1", catalog::EXTRACT_WEBPAGE)
            .with_args(json!({ "url": DEFAULT_GOAL_URL }))
            .with_description(format!("Execute goal: {}", goal))]
    }

    fn standings_steps(&self, goal: &str) -> Vec<PlanStep> {
        let recipient = first_email(goal)
            .map(str::to_string)
            .or_else(|| self.env.lookup(&self.settings.recipient_env))
            .unwrap_or_else(|| self.settings.default_recipient.clone());
        let url = self
            .env
            .lookup(&self.settings.standings_url_env)
            .unwrap_or_else(|| self.settings.standings_url.clone());

        vec![
            PlanStep::new("step1", catalog::EXTRACT_WEBPAGE)
                .with_args(json!({ "url": url }))
                .with_description("Extract F1 driver standings from the web"),
            PlanStep::new("step2", catalog::SHEETS_UPSERT)
                .with_args(json!({
                    "spreadsheet_title": "F1_2025_Driver_Standings",
                    "sheet_name": "Drivers_2025",
                    "rows": "{step1.rows}"
                }))
                .with_depends_on(["step1"])
                .with_description("Create/update Google Sheet with F1 driver standings data"),
            PlanStep::new("step3", catalog::DRIVE_SHARE)
                .with_args(json!({
                    "file_id": "{step2.spreadsheet_id}",
                    "role": "reader",
                    "type": "anyone"
                }))
                .with_depends_on(["step2"])
                .with_description("Create shareable link for the spreadsheet"),
            PlanStep::new("step4", catalog::GMAIL_SEND)
                .with_args(json!({
                    "to": recipient,
                    "subject": "F1 Standings Sheet",
                    "html": "F1 standings sheet: {step3.link}"
                }))
                .with_depends_on(["step3"])
                .with_description("Email sheet link"),
        ]
    }
}

#[async_trait]
impl Planner for RuleBasedPlanner {
    async fn create_plan(
        &self,
        goal: &str,
        _context: &PlannerContext,
    ) -> Result<ExecutionPlan, PlanError> {
        Ok(ExecutionPlan::new(goal, self.plan_steps(goal)))
    }
}

/// Oracle first, rule-based planner when the oracle is absent, errors, or
/// proposes nothing from the catalog.
pub struct FallbackPlanner {
    oracle: Option<Arc<dyn Planner>>,
    fallback: RuleBasedPlanner,
}

impl FallbackPlanner {
    pub fn new(oracle: Option<Arc<dyn Planner>>, fallback: RuleBasedPlanner) -> Self {
        Self { oracle, fallback }
    }

    pub fn has_oracle(&self) -> bool {
        self.oracle.is_some()
    }
}

#[async_trait]
impl Planner for FallbackPlanner {
    async fn create_plan(
        &self,
        goal: &str,
        context: &PlannerContext,
    ) -> Result<ExecutionPlan, PlanError> {
        if let Some(oracle) = &self.oracle {
            match oracle.create_plan(goal, context).await {
                Ok(plan) if plan.steps.iter().any(|s| catalog::is_known_tool(&s.tool)) => {
                    return Ok(plan);
                }
                Ok(plan) => {
                    tracing::warn!(
                        plan_id = %plan.plan_id,
                        steps = plan.steps.len(),
                        "planner returned no catalog tools, using rule-based plan"
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "planner failed, using rule-based plan");
                }
            }
        } else {
            tracing::debug!("no planner configured, using rule-based plan");
        }
        self.fallback.create_plan(goal, context).await
    }
}
