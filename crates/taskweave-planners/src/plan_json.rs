//! Turning a model reply into plan steps.
//!
//! Accepted shapes, fenced or not: `{"steps": [...]}` (what JSON mode
//! produces) or a bare `[...]` array.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use taskweave_core::catalog;
use taskweave_core::planner::PlanError;
use taskweave_core::types::PlanStep;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanDocument {
    Wrapped { steps: Vec<ProposedStep> },
    Bare(Vec<ProposedStep>),
}

#[derive(Debug, Deserialize)]
struct ProposedStep {
    #[serde(default, alias = "id")]
    step_id: Option<String>,
    #[serde(default)]
    tool: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    depends_on: Vec<String>,
    #[serde(default)]
    description: String,
}

/// Strip Markdown fences and surrounding prose down to the JSON payload.
pub(crate) fn json_payload(text: &str) -> Option<&str> {
    let body = match text.split_once("```") {
        Some((_, rest)) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.split("```").next().unwrap_or(rest)
        }
        None => text,
    };
    let start = body.find(['{', '['])?;
    let close = if body[start..].starts_with('{') { '}' } else { ']' };
    let end = body.rfind(close)?;
    (end > start).then(|| &body[start..=end])
}

/// Parse and clean the proposed steps.
///
/// Steps naming tools outside the catalog are dropped. Explicit ids must be
/// unique; steps without one get `step<N>` from their position, moved past
/// any id already taken.
pub(crate) fn parse_plan_steps(reply: &str) -> Result<Vec<PlanStep>, PlanError> {
    let payload = json_payload(reply).ok_or_else(|| {
        PlanError::Generation("model reply does not contain a JSON plan".to_string())
    })?;
    let proposed = match serde_json::from_str::<PlanDocument>(payload) {
        Ok(PlanDocument::Wrapped { steps }) | Ok(PlanDocument::Bare(steps)) => steps,
        Err(err) => return Err(PlanError::Generation(format!("Invalid plan JSON: {}", err))),
    };

    let kept: Vec<ProposedStep> = proposed
        .into_iter()
        .filter(|step| {
            let known = catalog::is_known_tool(&step.tool);
            if !known {
                tracing::warn!(
                    tool = %step.tool,
                    step_id = step.step_id.as_deref().unwrap_or("-"),
                    "dropping step with tool outside the catalog"
                );
            }
            known
        })
        .collect();

    let mut taken = HashSet::new();
    for id in kept.iter().filter_map(explicit_id) {
        if !taken.insert(id.to_string()) {
            return Err(PlanError::Generation(format!("duplicate step_id '{}'", id)));
        }
    }

    let mut steps = Vec::with_capacity(kept.len());
    for (index, step) in kept.into_iter().enumerate() {
        let step_id = match explicit_id(&step) {
            Some(id) => id.to_string(),
            None => {
                let id = free_step_id(index + 1, &taken);
                taken.insert(id.clone());
                id
            }
        };
        let mut plan_step = PlanStep::new(step_id, step.tool)
            .with_depends_on(step.depends_on)
            .with_description(step.description);
        if let Value::Object(args) = step.args {
            plan_step.args = args;
        }
        steps.push(plan_step);
    }
    Ok(steps)
}

fn explicit_id(step: &ProposedStep) -> Option<&str> {
    step.step_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
}

fn free_step_id(mut n: usize, taken: &HashSet<String>) -> String {
    loop {
        let candidate = format!("step{}", n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskweave_core::types::StepId;

    fn ids(steps: &[PlanStep]) -> Vec<&str> {
        steps.iter().map(|s| s.step_id.as_str()).collect()
    }

    #[test]
    fn test_json_payload_handles_fences_objects_and_prose() {
        assert_eq!(
            json_payload("```json\n{\"steps\": []}\n```"),
            Some("{\"steps\": []}")
        );
        assert_eq!(json_payload("```\n[1]\n```"), Some("[1]"));
        assert_eq!(json_payload("Here you go: [1, 2] done"), Some("[1, 2]"));
        assert_eq!(json_payload("no plan here"), None);
    }

    #[test]
    fn test_wrapped_and_bare_documents_parse_the_same() {
        let wrapped = r#"{"steps":[{"step_id":"a","tool":"extract_webpage","args":{"url":"u"}}]}"#;
        let bare = r#"[{"id":"a","tool":"extract_webpage","args":{"url":"u"}}]"#;
        for reply in [wrapped, bare] {
            let steps = parse_plan_steps(reply).expect("steps");
            assert_eq!(ids(&steps), vec!["a"]);
            assert_eq!(steps[0].args.get("url"), Some(&json!("u")));
        }
    }

    #[test]
    fn test_missing_ids_never_collide_with_explicit_ones() {
        let reply = r#"{"steps":[
            {"tool":"extract_webpage","args":{"url":"u"}},
            {"step_id":"step1","tool":"google_sheets_upsert","depends_on":["step2"]},
            {"tool":"google_drive_share"},
            {"step_id":"step3","tool":"gmail_send"}
        ]}"#;
        let steps = parse_plan_steps(reply).expect("steps");
        assert_eq!(ids(&steps), vec!["step2", "step1", "step4", "step3"]);
        assert_eq!(steps[1].depends_on, vec![StepId::from("step2")]);
    }

    #[test]
    fn test_duplicate_explicit_ids_are_rejected() {
        let reply = r#"[
            {"step_id":"step1","tool":"extract_webpage"},
            {"step_id":"step1","tool":"gmail_send"}
        ]"#;
        let err = parse_plan_steps(reply).expect_err("duplicate");
        assert!(matches!(
            err,
            PlanError::Generation(msg) if msg.contains("duplicate step_id 'step1'")
        ));
    }

    #[test]
    fn test_unknown_tools_are_dropped_before_numbering() {
        let reply = r#"[
            {"step_id":"step1","tool":"extract_webpage"},
            {"step_id":"step1","tool":"python"},
            {"tool":"gmail_send","args":"not an object"}
        ]"#;
        let steps = parse_plan_steps(reply).expect("steps");
        assert_eq!(ids(&steps), vec!["step1", "step2"]);
        assert!(steps[1].args.is_empty());
    }
}
