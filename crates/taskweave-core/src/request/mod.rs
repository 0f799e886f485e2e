//! Tool request preparation
//!
//! Turns a plan step's raw arguments into a concrete [`ToolRequest`]:
//! generic output tokens are rewritten first, then every placeholder is
//! resolved against the blackboard, completed step results and env.

mod validator;

pub use validator::{validate_tool_request, ValidationError};

use std::sync::Arc;

use crate::env::{EnvLookup, ProcessEnv};
use crate::placeholder::{preprocess_args, resolve_args, ResolveScope, StepResults};
use crate::store::Blackboard;
use crate::types::{PlanStep, ToolRequest};

/// Build the request for `step`. Never fails: anything unresolved is left as
/// literal placeholder text for [`validate_tool_request`] to reject.
pub fn prepare_tool_request(
    step: &PlanStep,
    blackboard: &Blackboard,
    results: &StepResults,
    env: &dyn EnvLookup,
) -> ToolRequest {
    let preprocessed = preprocess_args(&step.args, &step.depends_on, results);
    let scope = ResolveScope::new(blackboard, results, env);
    ToolRequest {
        name: step.tool.clone(),
        args: resolve_args(&preprocessed, &scope),
        depends_on: step.depends_on.clone(),
        request_id: step.step_id.clone(),
    }
}

/// Request preparation bound to one environment lookup.
#[derive(Clone)]
pub struct RequestPreparer {
    env: Arc<dyn EnvLookup>,
}

impl RequestPreparer {
    pub fn new(env: Arc<dyn EnvLookup>) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Arc<dyn EnvLookup> {
        &self.env
    }

    pub fn prepare_tool_request(
        &self,
        step: &PlanStep,
        blackboard: &Blackboard,
        results: &StepResults,
    ) -> ToolRequest {
        prepare_tool_request(step, blackboard, results, self.env.as_ref())
    }
}

impl Default for RequestPreparer {
    fn default() -> Self {
        Self::new(Arc::new(ProcessEnv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnv;
    use crate::types::StepId;
    use serde_json::json;

    #[test]
    fn test_prepare_resolves_rows_with_native_type() {
        let step = PlanStep::new("step2", "google_sheets_upsert")
            .with_depends_on(["step1"])
            .with_args(json!({
                "spreadsheet_title": "F1",
                "sheet_name": "Drivers",
                "rows": "{step1.rows}"
            }));
        let mut results = StepResults::new();
        results.insert(
            StepId::from("step1"),
            json!({"rows": [["a", "1"]]}).as_object().cloned().expect("output"),
        );

        let preparer = RequestPreparer::new(Arc::new(StaticEnv::new()));
        let request = preparer.prepare_tool_request(&step, &Blackboard::new(), &results);

        assert_eq!(request.name, "google_sheets_upsert");
        assert_eq!(request.request_id, StepId::from("step2"));
        assert_eq!(request.depends_on, vec![StepId::from("step1")]);
        assert_eq!(request.args.get("rows"), Some(&json!([["a", "1"]])));
        assert!(validate_tool_request(&request).is_ok());
    }

    #[test]
    fn test_prepare_rewrites_generic_token_before_resolving() {
        let step = PlanStep::new("step3", "google_drive_share")
            .with_depends_on(["step2"])
            .with_args(json!({"file_id": "{prev_step_output}"}));
        let mut results = StepResults::new();
        results.insert(
            StepId::from("step2"),
            json!({"spreadsheet_id": "S1"}).as_object().cloned().expect("output"),
        );

        let request = prepare_tool_request(&step, &Blackboard::new(), &results, &StaticEnv::new());
        assert_eq!(request.args.get("file_id"), Some(&json!("S1")));
    }

    #[test]
    fn test_unset_env_recipient_is_rejected() {
        let step = PlanStep::new("step4", "gmail_send")
            .with_args(json!({"to": "{env.SELF_EMAIL}", "subject": "F1 Standings Sheet"}));

        let request = prepare_tool_request(
            &step,
            &Blackboard::new(),
            &StepResults::new(),
            &StaticEnv::new(),
        );
        let err = validate_tool_request(&request).expect_err("unresolved recipient");
        assert_eq!(err.argument(), "to");
    }
}
