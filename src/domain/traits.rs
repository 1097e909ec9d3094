//! # Domain Traits
//!
//! Abstract interfaces for the model endpoints and the tool collaborators.
//! Allows for pluggable implementations in the Infrastructure layer and mocks in tests.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::types::{SearchHit, SpotifyAction, ToolCallResponse, ToolSpec};

/// Abstract interface for an LLM Provider
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for a single user prompt using the named agent
    async fn completion(&self, prompt: &str, agent: &str) -> Result<String, String>;
}

/// An LLM endpoint that supports function calling
#[async_trait]
pub trait ToolCallingProvider: Send + Sync {
    async fn chat_with_tools(
        &self,
        agent: &str,
        system: &str,
        user: &str,
        tools: &[ToolSpec],
    ) -> Result<ToolCallResponse, String>;
}

/// SQL database reachable through the MCP server
#[async_trait]
pub trait Database: Send + Sync {
    /// Run one statement and return the server's answer as JSON
    async fn query(&self, sql: &str) -> Result<Value>;

    /// Human-readable description of the tables and their columns
    async fn describe_schema(&self) -> Result<String>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, num_results: u8) -> Result<Vec<SearchHit>>;
}

/// Channel used to ask the user a question mid-task
#[async_trait]
pub trait HumanChannel: Send + Sync {
    /// Blocks until the user answers. There is no timeout.
    async fn ask(&self, question: &str) -> Result<String>;
}

#[async_trait]
pub trait MediaPlayer: Send + Sync {
    async fn perform(&self, action: &SpotifyAction) -> Result<Value>;
}

/// Speaks the final reply
#[async_trait]
pub trait VoiceOutput: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}
