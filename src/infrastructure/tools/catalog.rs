//! Tool definitions advertised to the execution model.

use serde_json::json;

use crate::domain::types::{DEFAULT_NUM_RESULTS, MAX_NUM_RESULTS, OperationKind, ToolSpec};

/// Returns the JSON-schema description of one tool family.
pub fn spec_for(kind: OperationKind) -> ToolSpec {
    let (description, parameters) = match kind {
        OperationKind::DatabaseQuery => (
            "Execute a SQL query against the SQLite database",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL statement to execute" }
                },
                "required": ["query"]
            }),
        ),
        OperationKind::GoogleSearch => (
            "Perform a Google search and get relevant results",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Search query string" },
                    "num_results": {
                        "type": "integer",
                        "description": "Number of results to return (max 10)",
                        "default": DEFAULT_NUM_RESULTS,
                        "minimum": 1,
                        "maximum": MAX_NUM_RESULTS
                    }
                },
                "required": ["query"]
            }),
        ),
        OperationKind::HumanInteraction => (
            "Ask the user a follow-up question and wait for the answer",
            json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "description": "Question for the user" }
                },
                "required": ["question"]
            }),
        ),
        OperationKind::Spotify => (
            "Control Spotify playback",
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["search", "play", "pause", "current_track", "add_to_queue"],
                        "description": "Action to perform"
                    },
                    "query": { "type": "string", "description": "Search query (search)" },
                    "track_id": { "type": "string", "description": "Track id (play, add_to_queue)" }
                },
                "required": ["action"]
            }),
        ),
    };

    ToolSpec {
        name: kind.as_str().to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// All four tools, in a stable order.
pub fn catalog() -> Vec<ToolSpec> {
    OperationKind::ALL.into_iter().map(spec_for).collect()
}
