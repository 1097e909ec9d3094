//! OpenAI-compatible API provider
//!
//! Supports OpenAI, Groq, XAI, DeepAI and other OpenAI-compatible APIs,
//! with optional function calling.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ProviderConfig;
use crate::domain::types::{ToolCall, ToolSpec};
use crate::infrastructure::llm::{Context, Error, Response, TokenUsage};

/// HTTP client reused across requests
fn http_client() -> &'static Client {
    use std::sync::OnceLock;
    static CLIENT: OnceLock<Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}

/// OpenAI API request format
#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAIFunction,
}

#[derive(Debug, Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: Value,
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    model: String,
    choices: Vec<OpenAIChoice>,
    #[serde(default)]
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAIToolCall>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    #[serde(default)]
    id: String,
    function: OpenAIToolCallFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCallFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// Reasoning models (`o1`, `o3`, ...) reject `temperature`, system messages and
/// `max_tokens`.
fn is_reasoning_model(model: &str) -> bool {
    let model = model.rsplit('/').next().unwrap_or(model);
    model.starts_with("o1") || model.starts_with("o3") || model.starts_with("o4")
}

fn build_request(model: String, context: Context) -> OpenAIRequest {
    let reasoning = is_reasoning_model(&model);
    let messages = context
        .messages
        .into_iter()
        .map(|msg| OpenAIMessage {
            role: if reasoning && msg.role.as_str() == "system" {
                "user".to_string()
            } else {
                msg.role.as_str().to_string()
            },
            content: msg.content,
        })
        .collect();
    let tools = context
        .tools
        .into_iter()
        .map(|ToolSpec { name, description, parameters }| OpenAITool {
            kind: "function",
            function: OpenAIFunction {
                name,
                description,
                parameters,
            },
        })
        .collect();

    OpenAIRequest {
        model,
        messages,
        temperature: if reasoning { None } else { context.temperature },
        max_tokens: if reasoning { None } else { context.max_tokens },
        max_completion_tokens: if reasoning { context.max_tokens } else { None },
        tools,
    }
}

fn into_response(openai_response: OpenAIResponse, requested_model: String) -> Result<Response, Error> {
    let Some(choice) = openai_response.choices.into_iter().next() else {
        return Err(Error::new("openai", "No choices in response"));
    };

    let usage = openai_response
        .usage
        .map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        })
        .unwrap_or_default();

    let tool_calls = choice
        .message
        .tool_calls
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();

    Ok(Response {
        content: choice.message.content.unwrap_or_default(),
        model: if openai_response.model.is_empty() {
            requested_model
        } else {
            openai_response.model
        },
        usage,
        tool_calls,
    })
}

/// Execute a chat request using OpenAI-compatible API
pub async fn chat(config: ProviderConfig, context: Context) -> Result<Response, Error> {
    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
    let model = context.model.clone().unwrap_or_else(|| {
        if config.default_model.is_empty() {
            "gpt-4o".to_string()
        } else {
            config.default_model.clone()
        }
    });

    let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
    let request = build_request(model.clone(), context);

    let mut request_builder = http_client()
        .post(&url)
        .header("Authorization", format!("Bearer {}", config.api_key))
        .header("Content-Type", "application/json")
        .json(&request);

    if let Some(timeout_secs) = config.timeout {
        request_builder = request_builder.timeout(std::time::Duration::from_secs(timeout_secs));
    }

    let response = request_builder
        .send()
        .await
        .map_err(|e| Error::new("openai", format!("HTTP request failed: {}", e)))?;

    let status = response.status();

    if !status.is_success() {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        // Try to parse error message from response
        if let Ok(error_json) = serde_json::from_str::<Value>(&error_text)
            && let Some(error_msg) = error_json
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
        {
            return Err(Error::new("openai", error_msg));
        }

        return Err(Error::new(
            "openai",
            format!("HTTP {}: {}", status, error_text),
        ));
    }

    let openai_response: OpenAIResponse = response
        .json()
        .await
        .map_err(|e| Error::new("openai", format!("Failed to parse response: {}", e)))?;

    into_response(openai_response, model)
}
