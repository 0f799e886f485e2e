//! Required-argument validation for resolved tool requests

use serde_json::Value;
use thiserror::Error;

use crate::catalog;
use crate::types::ToolRequest;

/// Why a resolved request was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Missing required argument: {0}")]
    MissingArgument(String),

    #[error("Unresolved placeholder in argument: {argument} = {value}")]
    UnresolvedPlaceholder { argument: String, value: String },
}

impl ValidationError {
    /// Name of the offending argument
    pub fn argument(&self) -> &str {
        match self {
            ValidationError::MissingArgument(argument) => argument,
            ValidationError::UnresolvedPlaceholder { argument, .. } => argument,
        }
    }
}

/// Check a resolved request against the catalog's required arguments.
///
/// Tools outside the catalog have no schema and always pass.
pub fn validate_tool_request(request: &ToolRequest) -> Result<(), ValidationError> {
    let Some(spec) = catalog::lookup(&request.name) else {
        return Ok(());
    };

    for argument in spec.required_args {
        match request.args.get(*argument) {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingArgument(argument.to_string()));
            }
            Some(Value::String(text)) if text.contains('{') && text.contains('}') => {
                return Err(ValidationError::UnresolvedPlaceholder {
                    argument: argument.to_string(),
                    value: text.clone(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}
