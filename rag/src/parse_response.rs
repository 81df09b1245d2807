use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::ActionKind;
use crate::error::ParseError;

/// What one chat turn hands back to the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub answer: String,
    pub action: Option<ActionKind>,
    pub action_payload: Option<Value>,
}

impl ModelResponse {
    pub fn answer_only(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            action: None,
            action_payload: None,
        }
    }
}

/// Parses the model's raw text as strict JSON.
///
/// An `action` outside `known_actions` is dropped together with its payload
/// and never fails an otherwise usable answer. Any other payload is passed
/// through untouched, even without an action.
pub fn parse_response(
    raw: &str,
    known_actions: &HashSet<ActionKind>,
) -> Result<ModelResponse, ParseError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let answer = value
        .get("answer")
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingAnswer)?
        .to_string();

    let (action, stripped) = match value.get("action") {
        None | Some(Value::Null) => (None, false),
        Some(Value::String(name)) if name.trim().is_empty() || name.trim() == "null" => (None, false),
        Some(Value::String(name)) => match name.parse::<ActionKind>() {
            Ok(kind) if known_actions.contains(&kind) => (Some(kind), false),
            _ => {
                tracing::warn!(action = %name, "model requested an unknown action, dropping it");
                (None, true)
            }
        },
        Some(other) => {
            tracing::warn!(action = %other, "model action is not a string, dropping it");
            (None, true)
        }
    };

    let action_payload = match value.get("action_payload") {
        Some(payload) if !stripped && !payload.is_null() => Some(payload.clone()),
        _ => None,
    };

    Ok(ModelResponse {
        answer,
        action,
        action_payload,
    })
}
