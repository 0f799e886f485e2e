//! Blackboard projection of completed step outputs

use serde_json::Value;

use super::Blackboard;
use crate::catalog;
use crate::types::{StepId, ToolOutput};

/// Key always holding the full output of `step_id`
pub fn raw_output_key(step_id: &StepId) -> String {
    format!("step_{}", step_id)
}

/// Copy the catalog's well-known output fields of a completed step onto the
/// blackboard, then store the full output under `step_<id>`.
///
/// Returns the blackboard keys written, in write order.
pub fn project_step_output(
    blackboard: &mut Blackboard,
    step_id: &StepId,
    tool: &str,
    output: &ToolOutput,
) -> Vec<String> {
    let mut written = Vec::new();
    if let Some(spec) = catalog::lookup(tool) {
        for (field, key) in spec.projections {
            if let Some(value) = output.get(*field) {
                blackboard.set(*key, value.clone());
                written.push((*key).to_string());
            }
        }
    }

    let raw_key = raw_output_key(step_id);
    blackboard.set(raw_key.clone(), Value::Object(output.clone()));
    written.push(raw_key);
    written
}
