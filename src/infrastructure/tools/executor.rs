//! # Tool Invoker
//!
//! Executes one typed operation against its collaborator and turns the outcome,
//! whatever it is, into an `ExecutionResult`. Errors never leave this module.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::domain::traits::{Database, HumanChannel, MediaPlayer, SearchProvider};
use crate::domain::types::{ExecutionResult, Operation};

/// Collaborators used by the invoker.
#[derive(Clone)]
pub struct ToolSet {
    pub database: Arc<dyn Database>,
    pub search: Arc<dyn SearchProvider>,
    pub human: Arc<dyn HumanChannel>,
    pub media: Arc<dyn MediaPlayer>,
}

pub struct ToolInvoker {
    tools: ToolSet,
}

impl ToolInvoker {
    pub fn new(tools: ToolSet) -> Self {
        Self { tools }
    }

    /// Runs `operation`. Never fails: errors become `success = false`.
    pub async fn invoke(&self, operation: &Operation) -> ExecutionResult {
        let operation_type = operation.type_name();
        let started = Instant::now();

        let result = match operation.validate() {
            Ok(()) => match self.dispatch(operation).await {
                Ok(value) => ExecutionResult::success(&operation_type, value),
                Err(e) => ExecutionResult::failure(&operation_type, format!("{e:#}")),
            },
            Err(reason) => ExecutionResult::failure(&operation_type, reason),
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if result.success {
            tracing::info!(operation = %operation_type, success = true, elapsed_ms, "Tool invoked");
        } else {
            tracing::warn!(
                operation = %operation_type,
                success = false,
                elapsed_ms,
                error = result.error.as_deref().unwrap_or(""),
                "Tool invoked"
            );
        }
        result
    }

    async fn dispatch(&self, operation: &Operation) -> Result<Value> {
        match operation {
            Operation::DatabaseQuery { query } => self.tools.database.query(query).await,
            Operation::GoogleSearch { query, num_results } => {
                let hits = self.tools.search.search(query, *num_results).await?;
                Ok(serde_json::to_value(hits)?)
            }
            Operation::HumanInteraction { question } => {
                let answer = self.tools.human.ask(question).await?;
                Ok(Value::String(answer))
            }
            Operation::Spotify(action) => self.tools.media.perform(action).await,
            Operation::Unsupported { kind, reason } => {
                anyhow::bail!("Unsupported operation type `{kind}`: {reason}")
            }
        }
    }

    /// Schema text for the execution prompt, or a placeholder when the server
    /// cannot describe itself.
    pub async fn database_schema(&self) -> String {
        match self.tools.database.describe_schema().await {
            Ok(schema) if !schema.trim().is_empty() => schema,
            Ok(_) => "(no tables)".to_string(),
            Err(e) => {
                tracing::warn!("Schema lookup failed: {e:#}");
                "(schema unavailable)".to_string()
            }
        }
    }
}
