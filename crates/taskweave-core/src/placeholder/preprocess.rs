//! Argument preprocessing
//!
//! Planners frequently emit generic tokens such as `{prev_step_output}` or
//! `{step2_output}` instead of a concrete `{step_id.field}` path. Before
//! resolution these are rewritten against the outputs already available.

use serde_json::{Map, Value};

use super::{parse_template, Segment, StepResults};
use crate::types::{StepId, ToolOutput};

/// Tokens meaning "the output of my most recent dependency"
pub const GENERIC_OUTPUT_TOKENS: &[&str] = &["prev_step_output", "step_output", "previous_output"];

/// Output fields preferred when a generic token is rewritten, in order.
const PREFERRED_FIELDS: &[&str] = &["rows", "data_rows", "output"];

/// Rewrite generic output tokens in every string of `args`.
///
/// Tokens whose target step has no recorded output (or an empty one) are
/// left untouched so resolution and validation can deal with them.
pub fn preprocess_args(
    args: &Map<String, Value>,
    depends_on: &[StepId],
    results: &StepResults,
) -> Map<String, Value> {
    args.iter()
        .map(|(key, value)| (key.clone(), preprocess_value(value, depends_on, results)))
        .collect()
}

fn preprocess_value(value: &Value, depends_on: &[StepId], results: &StepResults) -> Value {
    match value {
        Value::String(text) => Value::String(preprocess_string(text, depends_on, results)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| preprocess_value(item, depends_on, results))
                .collect(),
        ),
        Value::Object(map) => Value::Object(preprocess_args(map, depends_on, results)),
        other => other.clone(),
    }
}

fn preprocess_string(text: &str, depends_on: &[StepId], results: &StepResults) -> String {
    let segments = parse_template(text);
    if !segments
        .iter()
        .any(|segment| matches!(segment, Segment::Placeholder(_)))
    {
        return text.to_string();
    }

    let mut rewritten = String::with_capacity(text.len());
    for segment in &segments {
        match segment {
            Segment::Text(chunk) => rewritten.push_str(chunk),
            Segment::Placeholder(placeholder) => {
                match rewrite_token(placeholder.expr(), depends_on, results) {
                    Some(replacement) => rewritten.push_str(&replacement),
                    None => rewritten.push_str(&placeholder.literal()),
                }
            }
        }
    }
    rewritten
}

fn rewrite_token(expr: &str, depends_on: &[StepId], results: &StepResults) -> Option<String> {
    let target = if GENERIC_OUTPUT_TOKENS.contains(&expr) {
        depends_on.iter().rev().find(|dep| results.contains_key(*dep))?.clone()
    } else {
        numbered_output_step(expr)?
    };
    let field = preferred_field(results.get(&target)?)?;
    Some(format!("{{{}.{}}}", target, field))
}

/// `stepN_output` -> `stepN`
fn numbered_output_step(expr: &str) -> Option<StepId> {
    let digits = expr.strip_prefix("step")?.strip_suffix("_output")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(StepId::from(format!("step{}", digits)))
}

fn preferred_field(output: &ToolOutput) -> Option<&str> {
    PREFERRED_FIELDS
        .iter()
        .copied()
        .find(|field| output.contains_key(*field))
        .or_else(|| output.keys().next().map(String::as_str))
}
