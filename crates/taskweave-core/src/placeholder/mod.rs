//! Placeholder grammar and resolution
//!
//! Step arguments may embed textual references of the form `{source.path}`:
//!
//! - `{blackboard.K1.K2}` walks the session blackboard
//! - `{<step_id>.K1.K2}` walks the output of a completed dependency
//! - `{env.NAME}` reads environment configuration
//! - `{key}` (no dot) reads a top-level blackboard key
//!
//! Each string is parsed once into text and placeholder segments. Resolution
//! is a pure function of (segments, blackboard, step results, env) and never
//! fails: an unresolvable placeholder is left as its literal text so the
//! request validator can reject it explicitly.

mod preprocess;

pub use preprocess::{preprocess_args, GENERIC_OUTPUT_TOKENS};

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::env::EnvLookup;
use crate::store::Blackboard;
use crate::types::{StepId, ToolOutput};

/// Outputs of completed steps, keyed by step id.
pub type StepResults = HashMap<StepId, ToolOutput>;

const BLACKBOARD_SOURCE: &str = "blackboard";
const ENV_SOURCE: &str = "env";

/// Root a placeholder path is traversed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Blackboard,
    Env,
    Step(StepId),
    /// Bare `{key}`: top-level blackboard lookup
    Key(String),
}

/// One parsed `{...}` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    expr: String,
    source: Source,
    path: Vec<String>,
}

impl Placeholder {
    /// Parse the text between the braces. Returns None for an empty expression.
    pub fn parse(expr: &str) -> Option<Self> {
        if expr.is_empty() {
            return None;
        }
        let mut parts = expr.split('.');
        let head = parts.next()?;
        let path: Vec<String> = parts.map(str::to_string).collect();
        let source = if path.is_empty() {
            Source::Key(head.to_string())
        } else {
            match head {
                BLACKBOARD_SOURCE => Source::Blackboard,
                ENV_SOURCE => Source::Env,
                step => Source::Step(StepId::from(step)),
            }
        };
        Some(Self {
            expr: expr.to_string(),
            source,
            path,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Literal text of this placeholder, braces included
    pub fn literal(&self) -> String {
        format!("{{{}}}", self.expr)
    }

    /// Resolve against the scope. None means the soft-fail path.
    pub fn resolve(&self, scope: &ResolveScope<'_>) -> Option<Value> {
        match &self.source {
            Source::Key(key) => scope.blackboard.get(key).cloned(),
            Source::Blackboard => traverse(scope.blackboard.as_map(), &self.path),
            Source::Step(step_id) => {
                let output = scope.results.get(step_id)?;
                traverse(output, &self.path)
            }
            Source::Env => match self.path.as_slice() {
                [name] => scope.env.lookup(name).map(Value::String),
                _ => None,
            },
        }
    }
}

fn traverse(root: &Map<String, Value>, path: &[String]) -> Option<Value> {
    let (first, rest) = path.split_first()?;
    let mut current = root.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    Some(current.clone())
}

/// A string split into literal text and placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Placeholder(Placeholder),
}

/// Split `input` into segments. A placeholder is `{` followed by one or more
/// characters other than `}` and a closing `}`.
pub fn parse_template(input: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut cursor = 0;

    while let Some(offset) = input[cursor..].find('{') {
        let open = cursor + offset;
        let Some(close_offset) = input[open + 1..].find('}') else {
            break;
        };
        let close = open + 1 + close_offset;
        match Placeholder::parse(&input[open + 1..close]) {
            Some(placeholder) => {
                if open > text_start {
                    segments.push(Segment::Text(&input[text_start..open]));
                }
                segments.push(Segment::Placeholder(placeholder));
                text_start = close + 1;
                cursor = close + 1;
            }
            None => cursor = open + 1,
        }
    }

    if text_start < input.len() {
        segments.push(Segment::Text(&input[text_start..]));
    }
    segments
}

/// Whether a string still carries placeholder syntax
pub fn contains_placeholder(input: &str) -> bool {
    parse_template(input)
        .iter()
        .any(|segment| matches!(segment, Segment::Placeholder(_)))
}

/// Read-only snapshot a resolution runs against.
#[derive(Clone, Copy)]
pub struct ResolveScope<'a> {
    pub blackboard: &'a Blackboard,
    pub results: &'a StepResults,
    pub env: &'a dyn EnvLookup,
}

impl<'a> ResolveScope<'a> {
    pub fn new(
        blackboard: &'a Blackboard,
        results: &'a StepResults,
        env: &'a dyn EnvLookup,
    ) -> Self {
        Self {
            blackboard,
            results,
            env,
        }
    }
}

/// Resolve every placeholder in an argument mapping.
pub fn resolve_args(args: &Map<String, Value>, scope: &ResolveScope<'_>) -> Map<String, Value> {
    args.iter()
        .map(|(key, value)| (key.clone(), resolve_value(value, scope)))
        .collect()
}

/// Resolve a value tree. Non-string leaves pass through unchanged.
pub fn resolve_value(value: &Value, scope: &ResolveScope<'_>) -> Value {
    match value {
        Value::String(text) => resolve_string(text, scope),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_value(v, scope)).collect())
        }
        Value::Object(map) => Value::Object(resolve_args(map, scope)),
        other => other.clone(),
    }
}

/// A string that is exactly one placeholder resolves to the referenced value
/// with its native type; anything else is interpolated as text.
pub fn resolve_string(text: &str, scope: &ResolveScope<'_>) -> Value {
    let mut segments = parse_template(text);
    if !segments
        .iter()
        .any(|segment| matches!(segment, Segment::Placeholder(_)))
    {
        return Value::String(text.to_string());
    }

    if segments.len() == 1 {
        if let Some(Segment::Placeholder(placeholder)) = segments.pop() {
            return placeholder
                .resolve(scope)
                .unwrap_or_else(|| Value::String(placeholder.literal()));
        }
    }

    let mut rendered = String::with_capacity(text.len());
    for segment in &segments {
        match segment {
            Segment::Text(chunk) => rendered.push_str(chunk),
            Segment::Placeholder(placeholder) => match placeholder.resolve(scope) {
                Some(value) => rendered.push_str(&render_inline(&value)),
                None => rendered.push_str(&placeholder.literal()),
            },
        }
    }
    Value::String(rendered)
}

fn render_inline(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::StaticEnv;
    use serde_json::json;

    fn output(value: Value) -> ToolOutput {
        value.as_object().cloned().expect("object output")
    }

    fn results_with(step: &str, value: Value) -> StepResults {
        let mut results = StepResults::new();
        results.insert(StepId::from(step), output(value));
        results
    }

    #[test]
    fn test_parse_classifies_sources() {
        let p = Placeholder::parse("blackboard.user.name").expect("placeholder");
        assert_eq!(p.source(), &Source::Blackboard);
        assert_eq!(p.path(), ["user".to_string(), "name".to_string()]);

        let p = Placeholder::parse("env.SELF_EMAIL").expect("placeholder");
        assert_eq!(p.source(), &Source::Env);

        let p = Placeholder::parse("step1.rows").expect("placeholder");
        assert_eq!(p.source(), &Source::Step(StepId::from("step1")));

        let p = Placeholder::parse("share_link").expect("placeholder");
        assert_eq!(p.source(), &Source::Key("share_link".to_string()));

        assert!(Placeholder::parse("").is_none());
    }

    #[test]
    fn test_parse_template_splits_text_and_placeholders() {
        let segments = parse_template("Sheet: {step2.sheet_url} ({blackboard.owner})");
        assert_eq!(segments.len(), 5);
        assert_eq!(segments[0], Segment::Text("Sheet: "));
        assert!(matches!(&segments[1], Segment::Placeholder(p) if p.expr() == "step2.sheet_url"));
        assert_eq!(segments[2], Segment::Text(" ("));
        assert!(matches!(
            &segments[3],
            Segment::Placeholder(p) if p.source() == &Source::Blackboard
        ));
        assert_eq!(segments[4], Segment::Text(")"));
    }

    #[test]
    fn test_parse_template_ignores_empty_and_unclosed_braces() {
        assert!(!contains_placeholder("{} and {unclosed"));
        assert!(contains_placeholder("x {a.b} y"));
    }

    #[test]
    fn test_whole_value_placeholder_keeps_native_type() {
        let bb = Blackboard::new();
        let results = results_with("step1", json!({"rows": [["a", "1"]]}));
        let env = StaticEnv::new();
        let scope = ResolveScope::new(&bb, &results, &env);

        assert_eq!(resolve_string("{step1.rows}", &scope), json!([["a", "1"]]));
    }

    #[test]
    fn test_mixed_text_interpolates_string_representation() {
        let mut bb = Blackboard::new();
        bb.set("count", json!(3));
        let results = results_with("step3", json!({"link": "https://share/x"}));
        let env = StaticEnv::new();
        let scope = ResolveScope::new(&bb, &results, &env);

        assert_eq!(
            resolve_string("Link: {step3.link}, rows={blackboard.count}", &scope),
            json!("Link: https://share/x, rows=3")
        );
    }

    #[test]
    fn test_unresolved_placeholder_soft_fails_to_literal() {
        let bb = Blackboard::new();
        let results = StepResults::new();
        let env = StaticEnv::new();
        let scope = ResolveScope::new(&bb, &results, &env);

        assert_eq!(resolve_string("{step1.rows}", &scope), json!("{step1.rows}"));
        assert_eq!(resolve_string("{env.SELF_EMAIL}", &scope), json!("{env.SELF_EMAIL}"));
        assert_eq!(
            resolve_string("to {blackboard.missing} now", &scope),
            json!("to {blackboard.missing} now")
        );
    }

    #[test]
    fn test_traversal_through_non_mapping_soft_fails() {
        let mut bb = Blackboard::new();
        bb.set("sheet", json!({"meta": "flat"}));
        let results = StepResults::new();
        let env = StaticEnv::new();
        let scope = ResolveScope::new(&bb, &results, &env);

        assert_eq!(
            resolve_string("{blackboard.sheet.meta.owner}", &scope),
            json!("{blackboard.sheet.meta.owner}")
        );
        assert_eq!(
            resolve_string("{blackboard.sheet.meta}", &scope),
            json!("flat")
        );
    }

    #[test]
    fn test_env_and_bare_key_resolution() {
        let mut bb = Blackboard::new();
        bb.set("share_link", json!("https://share/y"));
        let results = StepResults::new();
        let env = StaticEnv::new().with("SELF_EMAIL", "me@example.com");
        let scope = ResolveScope::new(&bb, &results, &env);

        assert_eq!(resolve_string("{env.SELF_EMAIL}", &scope), json!("me@example.com"));
        assert_eq!(resolve_string("{share_link}", &scope), json!("https://share/y"));
        assert_eq!(resolve_string("{env.A.B}", &scope), json!("{env.A.B}"));
    }

    #[test]
    fn test_resolution_recurses_and_is_idempotent_without_placeholders() {
        let bb = Blackboard::new();
        let results = results_with("step1", json!({"id": "abc"}));
        let env = StaticEnv::new();
        let scope = ResolveScope::new(&bb, &results, &env);

        let args = output(json!({
            "file_id": "{step1.id}",
            "nested": {"items": ["{step1.id}", 7, null]},
            "flag": true
        }));
        let resolved = resolve_args(&args, &scope);
        assert_eq!(
            Value::Object(resolved.clone()),
            json!({"file_id": "abc", "nested": {"items": ["abc", 7, null]}, "flag": true})
        );
        assert_eq!(resolve_args(&resolved, &scope), resolved);
    }
}
