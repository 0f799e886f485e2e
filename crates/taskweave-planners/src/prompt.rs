use std::fmt::Write;

use taskweave_core::catalog;
use taskweave_core::executor::truncate_for_log;
use taskweave_core::planner::PlannerContext;

const MAX_CONTEXT_VALUE_CHARS: usize = 500;

pub(crate) const DEFAULT_PERSONA: &str = "You plan tool calls for an automation agent. \
Break the user's goal into the smallest chain of catalog tool calls that achieves it.";

const RULES: &[&str] = &[
    "Give every step a unique step_id: step1, step2, ...",
    "Use exactly one tool per step, and only tools from the catalog below.",
    "Pass earlier results with placeholders such as {step1.rows} and list that step in depends_on.",
    "Read configuration with {env.NAME}, for example {env.SELF_EMAIL} for the user's own address.",
    "Read remembered values from earlier goals with {blackboard.KEY}.",
    "Share links with type \"anyone\" and role \"reader\" unless the goal names a person.",
    "Never invent tools such as python, execute or run.",
];

const RESPONSE_SHAPE: &str = concat!(
    r#"{"steps":[{"step_id":"step1","tool":"extract_webpage","#,
    r#""args":{"url":"https://..."},"depends_on":[],"description":"..."}]}"#,
);

/// Persona, numbered rules, then the tool catalog.
pub(crate) fn system_prompt(persona: &str, context: &PlannerContext) -> String {
    let mut out = String::from(persona.trim());
    out.push_str("\n\nRules:\n");
    for (i, rule) in RULES.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, rule);
    }

    out.push_str("\nTools:\n");
    for tool in &context.available_tools {
        let _ = write!(out, "* {}({})", tool.name, tool.required_args.join(", "));
        let _ = writeln!(out, " - {}", tool.description);
        if let Some(spec) = catalog::lookup(&tool.name) {
            for (field, key) in spec.projections {
                let _ = writeln!(out, "    output `{}` is remembered as blackboard.{}", field, key);
            }
        }
    }
    out
}

/// Goal, recent turns, remembered values, then the expected JSON shape.
pub(crate) fn user_prompt(goal: &str, context: &PlannerContext, max_history: usize) -> String {
    let mut out = format!("Goal: {}\n", goal.trim());

    let recent = context.recent_history(max_history);
    if !recent.is_empty() {
        out.push_str("\nEarlier in this conversation:\n");
        for item in recent {
            let _ = writeln!(out, "[{}] {}", item.role, item.content);
        }
    }

    if !context.blackboard.is_empty() {
        out.push_str("\nBlackboard:\n");
        for (key, value) in context.blackboard.as_map() {
            let value = truncate_for_log(&value.to_string(), MAX_CONTEXT_VALUE_CHARS);
            let _ = writeln!(out, "{} = {}", key, value);
        }
    }

    out.push_str("\nAnswer with one JSON object and nothing else, shaped like:\n");
    out.push_str(RESPONSE_SHAPE);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskweave_core::planner::HistoryItem;
    use taskweave_core::store::Blackboard;
    use taskweave_core::tool::catalog_metadata;

    #[test]
    fn test_system_prompt_lists_tools_and_projections() {
        let system = system_prompt(DEFAULT_PERSONA, &PlannerContext::new(catalog_metadata()));
        assert!(system.contains("* google_sheets_upsert(spreadsheet_title, sheet_name, rows)"));
        assert!(system.contains("output `link` is remembered as blackboard.share_link"));
        assert!(system.contains("7. Never invent tools"));
    }

    #[test]
    fn test_user_prompt_windows_history_and_shows_blackboard() {
        let mut blackboard = Blackboard::new();
        blackboard.set("sheet_url", json!("https://sheets/S1"));
        let context = PlannerContext::new(catalog_metadata())
            .with_history(vec![
                HistoryItem::user("first"),
                HistoryItem::assistant("second"),
                HistoryItem::user("third"),
            ])
            .with_blackboard(blackboard);

        let user = user_prompt("share the sheet", &context, 2);
        assert!(user.starts_with("Goal: share the sheet\n"));
        assert!(!user.contains("first"));
        assert!(user.contains("[assistant] second"));
        assert!(user.contains("[user] third"));
        assert!(user.contains("sheet_url = \"https://sheets/S1\""));
        assert!(user.contains("{\"steps\":["));

        let bare = user_prompt("g", &PlannerContext::default(), 3);
        assert!(!bare.contains("Earlier in this conversation"));
        assert!(!bare.contains("Blackboard:"));
    }
}
