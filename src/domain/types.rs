//! # Domain Types
//!
//! Data structures shared by the planner, the executor loop and the tool layer:
//! operations, phases, plans, planner decisions, execution results and the
//! conversation log.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

/// Default number of search results when the planner does not ask for a count.
pub const DEFAULT_NUM_RESULTS: u8 = 5;
/// Upper bound accepted by the search collaborator.
pub const MAX_NUM_RESULTS: u8 = 10;

/// The four tool families the bridge can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    DatabaseQuery,
    GoogleSearch,
    HumanInteraction,
    Spotify,
}

impl OperationKind {
    pub const ALL: [OperationKind; 4] = [
        OperationKind::DatabaseQuery,
        OperationKind::GoogleSearch,
        OperationKind::HumanInteraction,
        OperationKind::Spotify,
    ];

    /// Canonical tag, also the tool name advertised to the execution model.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::DatabaseQuery => "database_query",
            OperationKind::GoogleSearch => "google_search",
            OperationKind::HumanInteraction => "human_interaction",
            OperationKind::Spotify => "spotify",
        }
    }

    /// Accepts the canonical tags plus the short aliases models tend to use.
    pub fn parse(tag: &str) -> Option<Self> {
        match sanitize_tool_name(tag).as_str() {
            "database_query" | "query" | "sql" => Some(OperationKind::DatabaseQuery),
            "google_search" | "search" | "web_search" => Some(OperationKind::GoogleSearch),
            "human_interaction" | "human_question" | "human" => {
                Some(OperationKind::HumanInteraction)
            }
            "spotify" | "media_action" | "media" => Some(OperationKind::Spotify),
            _ => None,
        }
    }
}

/// Normalizes a tool name for lookup (`Google-Search` -> `google_search`).
pub fn sanitize_tool_name(name: &str) -> String {
    name.trim().replace(['-', ' '], "_").to_lowercase()
}

/// A single playback-service action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotifyAction {
    Search { query: String },
    Play { track_id: String },
    Pause,
    CurrentTrack,
    AddToQueue { track_id: String },
}

impl SpotifyAction {
    pub fn name(&self) -> &'static str {
        match self {
            SpotifyAction::Search { .. } => "search",
            SpotifyAction::Play { .. } => "play",
            SpotifyAction::Pause => "pause",
            SpotifyAction::CurrentTrack => "current_track",
            SpotifyAction::AddToQueue { .. } => "add_to_queue",
        }
    }

    fn from_params(params: &Value) -> Result<Self, String> {
        let action = text_param(params, "action");
        let track_id = text_param(params, "track_id");
        match action.as_str() {
            "search" => Ok(SpotifyAction::Search {
                query: text_param(params, "query"),
            }),
            "play" => Ok(SpotifyAction::Play { track_id }),
            "pause" => Ok(SpotifyAction::Pause),
            "current_track" => Ok(SpotifyAction::CurrentTrack),
            "add_to_queue" => Ok(SpotifyAction::AddToQueue { track_id }),
            "" => Err("missing action".to_string()),
            other => Err(format!("unknown action `{other}`")),
        }
    }
}

/// One operation the planner wants executed.
///
/// Serialized as `{"type": "...", "parameters": {...}}`, the shape the reasoning
/// model is asked to produce. Unknown tags become [`Operation::Unsupported`] so
/// that a single bad entry fails on its own instead of failing the whole decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawOperation", into = "RawOperation")]
pub enum Operation {
    DatabaseQuery { query: String },
    GoogleSearch { query: String, num_results: u8 },
    HumanInteraction { question: String },
    Spotify(SpotifyAction),
    Unsupported { kind: String, reason: String },
}

impl Operation {
    pub fn kind(&self) -> Option<OperationKind> {
        match self {
            Operation::DatabaseQuery { .. } => Some(OperationKind::DatabaseQuery),
            Operation::GoogleSearch { .. } => Some(OperationKind::GoogleSearch),
            Operation::HumanInteraction { .. } => Some(OperationKind::HumanInteraction),
            Operation::Spotify(_) => Some(OperationKind::Spotify),
            Operation::Unsupported { .. } => None,
        }
    }

    /// Tag recorded in [`ExecutionResult::operation_type`].
    pub fn type_name(&self) -> String {
        match self {
            Operation::Unsupported { kind, .. } => kind.clone(),
            other => other
                .kind()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn is_human_interaction(&self) -> bool {
        matches!(self, Operation::HumanInteraction { .. })
    }

    /// Builds a typed operation from a tag and a parameter object.
    pub fn from_parts(tag: &str, params: &Value) -> Self {
        let Some(kind) = OperationKind::parse(tag) else {
            return Operation::Unsupported {
                kind: tag.to_string(),
                reason: "unknown operation type".to_string(),
            };
        };
        match kind {
            OperationKind::DatabaseQuery => Operation::DatabaseQuery {
                query: text_param(params, "query"),
            },
            OperationKind::GoogleSearch => Operation::GoogleSearch {
                query: text_param(params, "query"),
                num_results: num_results_param(params),
            },
            OperationKind::HumanInteraction => Operation::HumanInteraction {
                question: text_param(params, "question"),
            },
            OperationKind::Spotify => match SpotifyAction::from_params(params) {
                Ok(action) => Operation::Spotify(action),
                Err(reason) => Operation::Unsupported {
                    kind: kind.as_str().to_string(),
                    reason,
                },
            },
        }
    }

    /// Maps a function call from the execution model back to an operation.
    pub fn from_tool_call(call: &ToolCall) -> Self {
        let params = if call.arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            match serde_json::from_str::<Value>(&call.arguments) {
                Ok(value) => value,
                Err(e) => {
                    return Operation::Unsupported {
                        kind: call.name.clone(),
                        reason: format!("invalid arguments: {e}"),
                    };
                }
            }
        };
        Operation::from_parts(&call.name, &params)
    }

    /// Parameters in the wire shape.
    pub fn parameters(&self) -> Value {
        match self {
            Operation::DatabaseQuery { query } => json!({ "query": query }),
            Operation::GoogleSearch { query, num_results } => {
                json!({ "query": query, "num_results": num_results })
            }
            Operation::HumanInteraction { question } => json!({ "question": question }),
            Operation::Spotify(action) => {
                let mut params = json!({ "action": action.name() });
                match action {
                    SpotifyAction::Search { query } => params["query"] = json!(query),
                    SpotifyAction::Play { track_id } | SpotifyAction::AddToQueue { track_id } => {
                        params["track_id"] = json!(track_id)
                    }
                    SpotifyAction::Pause | SpotifyAction::CurrentTrack => {}
                }
                params
            }
            Operation::Unsupported { reason, .. } => json!({ "reason": reason }),
        }
    }

    /// Checks that the parameters satisfy the shape required by the variant.
    pub fn validate(&self) -> Result<(), String> {
        fn required(value: &str, what: &str) -> Result<(), String> {
            if value.trim().is_empty() {
                Err(format!("{what} must not be empty"))
            } else {
                Ok(())
            }
        }
        match self {
            Operation::DatabaseQuery { query } => required(query, "query"),
            Operation::GoogleSearch { query, .. } => required(query, "query"),
            Operation::HumanInteraction { question } => required(question, "question"),
            Operation::Spotify(SpotifyAction::Search { query }) => required(query, "query"),
            Operation::Spotify(SpotifyAction::Play { track_id })
            | Operation::Spotify(SpotifyAction::AddToQueue { track_id }) => {
                required(track_id, "track_id")
            }
            Operation::Spotify(_) => Ok(()),
            Operation::Unsupported { kind, reason } => {
                Err(format!("Unsupported operation type `{kind}`: {reason}"))
            }
        }
    }
}

fn text_param(params: &Value, key: &str) -> String {
    match params.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn num_results_param(params: &Value) -> u8 {
    let requested = match params.get("num_results") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    requested
        .map(|n| n.clamp(1, MAX_NUM_RESULTS as i64) as u8)
        .unwrap_or(DEFAULT_NUM_RESULTS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawOperation {
    #[serde(rename = "type", alias = "operation", default)]
    kind: String,
    #[serde(default)]
    parameters: Value,
}

impl From<RawOperation> for Operation {
    fn from(raw: RawOperation) -> Self {
        Operation::from_parts(&raw.kind, &raw.parameters)
    }
}

impl From<Operation> for RawOperation {
    fn from(op: Operation) -> Self {
        RawOperation {
            kind: op.type_name(),
            parameters: op.parameters(),
        }
    }
}

/// A bounded batch of operations executed before the planner is consulted again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    #[serde(
        rename = "phase_number",
        alias = "index",
        default = "first_phase",
        deserialize_with = "lenient_phase_index"
    )]
    pub index: u32,
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
}

fn first_phase() -> u32 {
    1
}

impl Phase {
    pub fn single(index: u32, operation: Operation, description: impl Into<String>) -> Self {
        Self {
            index: index.max(1),
            operations: vec![operation],
            description: description.into(),
        }
    }

    pub fn has_human_interaction(&self) -> bool {
        self.operations.iter().any(Operation::is_human_interaction)
    }

    /// True when the phase respects the operation cap and the
    /// "a human question stands alone" rule.
    pub fn is_well_formed(&self, max_operations: usize) -> bool {
        !self.operations.is_empty()
            && self.operations.len() <= max_operations
            && (!self.has_human_interaction() || self.operations.len() == 1)
    }

    /// Returns a phase that satisfies [`Phase::is_well_formed`] (unless empty)
    /// together with the operations that had to be dropped.
    ///
    /// A phase mixing a human question with other work keeps only the first
    /// human question; anything else is truncated to `max_operations`.
    pub fn bounded(mut self, max_operations: usize) -> (Phase, Vec<Operation>) {
        let cap = max_operations.max(1);
        if let Some(pos) = self.operations.iter().position(Operation::is_human_interaction) {
            if self.operations.len() > 1 {
                let question = self.operations.remove(pos);
                let dropped = std::mem::replace(&mut self.operations, vec![question]);
                return (self, dropped);
            }
            return (self, Vec::new());
        }
        let dropped = if self.operations.len() > cap {
            self.operations.split_off(cap)
        } else {
            Vec::new()
        };
        (self, dropped)
    }
}

/// The overall plan produced on the first planning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Plan {
    #[serde(rename = "overall_tasks", alias = "subtasks", default)]
    pub subtasks: Vec<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub total_phases: u32,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

/// Structured next step returned by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PlannerDecision {
    #[serde(rename = "task_plan", alias = "plan", default, deserialize_with = "best_effort_plan")]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub current_phase: Option<Phase>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub needs_tool: bool,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub task_completed: bool,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub final_response: Option<String>,
}

impl PlannerDecision {
    /// Restores the decision invariants after lenient parsing:
    /// a completed task never needs a tool, and a tool is only needed when
    /// there is a non-empty phase to run.
    pub fn normalized(mut self) -> Self {
        if self.task_completed {
            self.needs_tool = false;
        }
        let has_work = self
            .current_phase
            .as_ref()
            .is_some_and(|p| !p.operations.is_empty());
        if self.needs_tool && !has_work {
            self.needs_tool = false;
        }
        if self
            .final_response
            .as_deref()
            .is_some_and(|r| r.trim().is_empty())
        {
            self.final_response = None;
        }
        self
    }

    /// Phase to execute, only when the decision asks for tools.
    pub fn phase_to_run(&self) -> Option<&Phase> {
        if self.needs_tool {
            self.current_phase.as_ref()
        } else {
            None
        }
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => b,
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    })
}

fn lenient_optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_optional_string(deserializer)?.unwrap_or_default())
}

/// A number or a numeric string; anything else reads as 0.
fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let parsed = match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    Ok(parsed.map_or(0, |n| n.min(u32::MAX as u64) as u32))
}

fn lenient_phase_index<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(lenient_u32(deserializer)?.max(1))
}

/// The plan is informational; a malformed one is dropped instead of failing
/// the whole decision.
fn best_effort_plan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Plan>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(raw) => match serde_json::from_value::<Plan>(raw) {
            Ok(plan) => Some(plan),
            Err(e) => {
                tracing::warn!("Ignoring malformed task_plan: {e}");
                None
            }
        },
    })
}

/// Outcome of one executed operation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub operation_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(operation_type: impl Into<String>, result: Value) -> Self {
        Self {
            operation_type: operation_type.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(operation_type: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            operation_type: operation_type.into(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

/// One organic search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub position: Option<u32>,
}

/// A tool advertised to the execution model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// A function call requested by the execution model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument string as returned by the API.
    pub arguments: String,
}

/// Reply of the execution model: optional text plus requested calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Local>,
}

/// Append-only conversation log for one session.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(Turn {
            role,
            content: content.into(),
            at: Local::now(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Renders the last `limit` turns as `role: content`, each capped at
    /// `max_chars` characters.
    pub fn render_recent(&self, limit: usize, max_chars: usize) -> String {
        let start = self.turns.len().saturating_sub(limit);
        self.turns[start..]
            .iter()
            .map(|turn| {
                let content = truncate_chars(&turn.content, max_chars);
                format!("{}: {}", turn.role.as_str(), content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}
