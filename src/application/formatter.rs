//! # Response Formatter
//!
//! Renders the accumulated results when the planner did not write a final answer.

use serde_json::Value;

use crate::domain::types::{ExecutionResult, OperationKind, SearchHit};
use crate::strings::messages;

pub fn format(results: &[ExecutionResult]) -> String {
    let Some(last) = results.last() else {
        return messages::NO_RESULT.to_string();
    };
    if !last.success {
        return messages::NO_RESULT.to_string();
    }
    let Some(value) = last.result.as_ref() else {
        return messages::NO_RESULT.to_string();
    };

    if last.operation_type == OperationKind::GoogleSearch.as_str() {
        return search_digest(value).unwrap_or_else(|| messages::NO_RESULT.to_string());
    }
    render_value(value)
}

/// `- **title**` followed by the indented snippet, one entry per hit.
fn search_digest(value: &Value) -> Option<String> {
    let hits: Vec<SearchHit> = serde_json::from_value(value.clone()).ok()?;
    if hits.is_empty() {
        return None;
    }
    let lines: Vec<String> = hits
        .iter()
        .map(|hit| {
            if hit.snippet.is_empty() {
                format!("- **{}**", hit.title)
            } else {
                format!("- **{}**\n  {}", hit.title, hit.snippet)
            }
        })
        .collect();
    Some(lines.join("\n"))
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => messages::NO_RESULT.to_string(),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner @ (Value::Object(_) | Value::Array(_))) => pretty(&inner),
            _ => text.clone(),
        },
        other => pretty(other),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
