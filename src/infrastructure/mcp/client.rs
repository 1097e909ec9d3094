//! SQLite MCP client
//!
//! Spawns `mcp-server-sqlite` (or whatever command is configured) as a child
//! process and talks to it over stdio with `rmcp`.

use anyhow::{Context as AnyhowContext, Result, anyhow, bail};
use async_trait::async_trait;
use regex::Regex;
use rmcp::{
    RoleClient, ServiceExt,
    model::CallToolRequestParam,
    service::RunningService,
    transport::{ConfigureCommandExt, TokioChildProcess},
};
use serde_json::{Map, Value, json};
use std::sync::OnceLock;
use tokio::process::Command;

use crate::domain::config::DatabaseConfig;
use crate::domain::traits::Database;

const READ_QUERY: &str = "read_query";
const WRITE_QUERY: &str = "write_query";
const LIST_TABLES: &str = "list_tables";
const DESCRIBE_TABLE: &str = "describe_table";

/// Connection to the SQLite MCP server.
pub struct SqliteMcp {
    service: RunningService<RoleClient, ()>,
}

impl SqliteMcp {
    /// Spawns the server process and performs the MCP handshake.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let args = config.args.clone();
        let command = Command::new(&config.command).configure(|cmd| {
            cmd.args(&args);
        });
        let transport = TokioChildProcess::new(command)
            .with_context(|| format!("Failed to spawn MCP server `{}`", config.command))?;
        let service = ()
            .serve(transport)
            .await
            .context("MCP handshake failed")?;

        let tools = service
            .list_all_tools()
            .await
            .context("Failed to list MCP tools")?;
        let names: Vec<String> = tools.iter().map(|t| t.name.to_string()).collect();
        tracing::info!(tools = ?names, "Connected to MCP server `{}`", config.command);
        for required in [READ_QUERY, WRITE_QUERY] {
            if !names.iter().any(|n| n == required) {
                tracing::warn!("MCP server does not advertise `{required}`");
            }
        }

        Ok(Self { service })
    }

    async fn call(&self, tool: &'static str, arguments: Value) -> Result<String> {
        let arguments = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: tool.into(),
                arguments: Some(arguments),
            })
            .await
            .with_context(|| format!("MCP call `{tool}` failed"))?;

        let text = result
            .content
            .iter()
            .filter_map(|c| c.raw.as_text().map(|t| t.text.clone()))
            .collect::<Vec<_>>()
            .join(" ");

        if result.is_error.unwrap_or(false) {
            bail!("{tool}: {text}");
        }
        Ok(text)
    }

    /// Shuts the server process down.
    pub async fn close(self) {
        if let Err(e) = self.service.cancel().await {
            tracing::warn!("MCP shutdown failed: {e}");
        }
    }
}

/// Statements routed to `read_query`; everything else goes to `write_query`.
pub fn is_read_statement(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_uppercase();
    matches!(first.as_str(), "SELECT" | "WITH" | "PRAGMA" | "EXPLAIN")
}

fn python_literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(None|True|False)\b").expect("static regex"))
}

/// The SQLite server answers with Python reprs (`[{'id': 1}]`). Decode them
/// into JSON when possible and keep the raw text otherwise.
pub fn decode_tool_text(text: &str) -> Value {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }
    if trimmed.starts_with('[') || trimmed.starts_with('{') {
        let swapped = trimmed.replace('\'', "\"");
        let swapped = python_literal_regex().replace_all(&swapped, |caps: &regex::Captures| {
            match &caps[1] {
                "None" => "null",
                "True" => "true",
                _ => "false",
            }
            .to_string()
        });
        if let Ok(value) = serde_json::from_str::<Value>(&swapped) {
            return value;
        }
    }
    Value::String(trimmed.to_string())
}

#[async_trait]
impl Database for SqliteMcp {
    async fn query(&self, sql: &str) -> Result<Value> {
        let tool = if is_read_statement(sql) {
            READ_QUERY
        } else {
            WRITE_QUERY
        };
        tracing::debug!(tool, sql, "MCP query");
        let text = self.call(tool, json!({ "query": sql })).await?;
        Ok(decode_tool_text(&text))
    }

    async fn describe_schema(&self) -> Result<String> {
        let tables = decode_tool_text(&self.call(LIST_TABLES, json!({})).await?);
        let names: Vec<String> = match &tables {
            Value::Array(rows) => rows
                .iter()
                .filter_map(|row| match row {
                    Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(String::from),
                    Value::String(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => return Err(anyhow!("Unexpected list_tables answer: {tables}")),
        };

        let mut out = Vec::new();
        for name in names {
            let columns = decode_tool_text(
                &self
                    .call(DESCRIBE_TABLE, json!({ "table_name": name }))
                    .await?,
            );
            out.push(format!("{name}: {}", render_columns(&columns)));
        }
        Ok(out.join("\n"))
    }
}

fn render_columns(columns: &Value) -> String {
    match columns {
        Value::Array(rows) => rows
            .iter()
            .filter_map(|row| {
                let name = row.get("name")?.as_str()?;
                let kind = row.get("type").and_then(Value::as_str).unwrap_or("");
                Some(format!("{name} {kind}").trim().to_string())
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_statement_routing() {
        assert!(is_read_statement("SELECT * FROM products;"));
        assert!(is_read_statement("  with t as (select 1) select * from t"));
        assert!(is_read_statement("PRAGMA table_info(users)"));
        assert!(!is_read_statement("INSERT INTO users VALUES (1)"));
        assert!(!is_read_statement("update users set name = 'x'"));
        assert!(!is_read_statement(""));
    }

    #[test]
    fn test_decode_python_repr() {
        let value = decode_tool_text("[{'id': 1, 'name': 'Widget', 'discontinued': False, 'note': None}]");
        assert_eq!(
            value,
            json!([{"id": 1, "name": "Widget", "discontinued": false, "note": null}])
        );
    }

    #[test]
    fn test_decode_plain_text_kept() {
        assert_eq!(
            decode_tool_text("Error: no such table: foo"),
            Value::String("Error: no such table: foo".into())
        );
        assert_eq!(decode_tool_text("[1, 2]"), json!([1, 2]));
    }

    #[test]
    fn test_render_columns() {
        let cols = json!([{"name": "id", "type": "INTEGER"}, {"name": "price", "type": "REAL"}]);
        assert_eq!(render_columns(&cols), "id INTEGER, price REAL");
    }
}
