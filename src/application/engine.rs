//! # Execution Engine
//!
//! The plan / execute / replan loop. Each user request starts in `Planning`,
//! alternates with `Executing` rounds until the planner answers or the iteration
//! budget runs out, and always ends with a user-visible string.

use anyhow::{Result, anyhow};
use std::sync::Arc;

use crate::application::formatter;
use crate::application::planner::Planner;
use crate::domain::config::BridgeSettings;
use crate::domain::traits::ToolCallingProvider;
use crate::domain::types::{ExecutionResult, Operation, Phase, PlannerDecision};
use crate::infrastructure::tools::ToolInvoker;
use crate::infrastructure::tools::catalog;
use crate::strings::{messages, prompts};

enum State {
    Planning,
    Executing(Phase),
    Summarizing,
    Done(String),
}

/// How phase operations reach the invoker.
enum Dispatcher {
    Direct,
    FunctionCalling {
        llm: Arc<dyn ToolCallingProvider>,
        agent: String,
    },
}

pub struct ExecutionEngine {
    planner: Planner,
    invoker: ToolInvoker,
    dispatcher: Dispatcher,
    max_iterations: usize,
    max_operations: usize,
}

impl ExecutionEngine {
    pub fn new(planner: Planner, invoker: ToolInvoker, settings: &BridgeSettings) -> Self {
        Self {
            planner,
            invoker,
            dispatcher: Dispatcher::Direct,
            max_iterations: settings.max_iterations.max(1),
            max_operations: settings.max_operations_per_phase.max(1),
        }
    }

    /// Routes phases through the execution model's function calling.
    pub fn with_function_calling(mut self, llm: Arc<dyn ToolCallingProvider>, agent: impl Into<String>) -> Self {
        self.dispatcher = Dispatcher::FunctionCalling {
            llm,
            agent: agent.into(),
        };
        self
    }

    pub fn planner(&self) -> &Planner {
        &self.planner
    }

    /// Handles one user request. Never fails.
    pub async fn run(&mut self, user_message: &str) -> String {
        match self.drive(user_message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error processing message: {e:#}");
                messages::processing_error(&format!("{e:#}"))
            }
        }
    }

    async fn drive(&mut self, user_message: &str) -> Result<String> {
        let mut results: Vec<ExecutionResult> = Vec::new();
        let mut iteration = 0;
        let mut state = State::Planning;

        loop {
            state = match state {
                State::Planning => {
                    let decision = self.planner.plan(user_message, &results, iteration).await;
                    next_after_planning(decision, &results)
                }
                State::Executing(phase) => {
                    self.execute_phase(phase, &mut results).await?;
                    iteration += 1;
                    if iteration >= self.max_iterations {
                        State::Summarizing
                    } else {
                        State::Planning
                    }
                }
                State::Summarizing => {
                    let summary = self
                        .planner
                        .summarize(user_message, &results, self.max_iterations)
                        .await;
                    State::Done(match summary {
                        Some(answer) => answer,
                        None if results.is_empty() => messages::GENERIC_APOLOGY.to_string(),
                        None => formatter::format(&results),
                    })
                }
                State::Done(reply) => {
                    tracing::info!(rounds = iteration, results = results.len(), "Request finished");
                    return Ok(reply);
                }
            };
        }
    }

    async fn execute_phase(&self, phase: Phase, results: &mut Vec<ExecutionResult>) -> Result<()> {
        let (phase, dropped) = phase.bounded(self.max_operations);
        if !dropped.is_empty() {
            tracing::warn!(
                phase = phase.index,
                dropped = dropped.len(),
                "Phase over the operation limit, extra operations dropped"
            );
        }
        tracing::info!(phase = phase.index, operations = phase.operations.len(), "Executing phase: {}", phase.description);

        let operations = self.operations_for(&phase).await?;
        for operation in operations {
            let result = self.invoker.invoke(&operation).await;
            results.push(result);
            if operation.is_human_interaction() {
                // the answer must be seen by the planner before anything else runs
                break;
            }
        }
        Ok(())
    }

    async fn operations_for(&self, phase: &Phase) -> Result<Vec<Operation>> {
        let Dispatcher::FunctionCalling { llm, agent } = &self.dispatcher else {
            return Ok(phase.operations.clone());
        };

        let schema = self.invoker.database_schema().await;
        let system = prompts::executor_system_prompt(&schema, self.max_operations);
        let operations = serde_json::to_string_pretty(&phase.operations)?;
        let user = prompts::executor_user_prompt(&phase.description, &operations);

        let response = llm
            .chat_with_tools(agent, &system, &user, &catalog::catalog())
            .await
            .map_err(|e| anyhow!("Execution model failed: {e}"))?;

        if response.tool_calls.is_empty() {
            tracing::warn!("Execution model returned no tool calls, running the planned operations");
            return Ok(phase.operations.clone());
        }
        let mapped = Phase {
            index: phase.index,
            operations: response.tool_calls.iter().map(Operation::from_tool_call).collect(),
            description: phase.description.clone(),
        };
        let (bounded, dropped) = mapped.bounded(self.max_operations);
        if !dropped.is_empty() {
            tracing::warn!(dropped = dropped.len(), "Execution model exceeded the operation limit");
        }
        Ok(bounded.operations)
    }
}

fn next_after_planning(decision: PlannerDecision, results: &[ExecutionResult]) -> State {
    if decision.task_completed {
        return State::Done(
            decision
                .final_response
                .unwrap_or_else(|| formatter::format(results)),
        );
    }
    if decision.needs_tool
        && let Some(phase) = decision.current_phase
    {
        return State::Executing(phase);
    }
    State::Done(
        decision
            .final_response
            .unwrap_or_else(|| messages::GENERIC_APOLOGY.to_string()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{ToolCall, ToolCallResponse};
    use crate::testing::{MockDatabase, MockHuman, MockLlm, MockToolCaller, tool_set};
    use serde_json::json;

    fn settings(max_iterations: usize) -> BridgeSettings {
        BridgeSettings {
            max_iterations,
            ..Default::default()
        }
    }

    fn db_phase(queries: &[&str]) -> String {
        let ops: Vec<_> = queries
            .iter()
            .map(|q| json!({"type": "database_query", "parameters": {"query": q}}))
            .collect();
        json!({
            "current_phase": {"phase_number": 1, "operations": ops, "description": "query"},
            "needs_tool": true,
            "task_completed": false
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_products_request_one_round() {
        let llm = Arc::new(MockLlm::new([
            db_phase(&["SELECT * FROM products;"]),
            json!({"task_completed": true, "final_response": "3 products found: A, B, C"}).to_string(),
        ]));
        let db = Arc::new(MockDatabase::with_rows(json!([{"id": 1}, {"id": 2}, {"id": 3}])));
        let mut engine = ExecutionEngine::new(
            Planner::new(llm.clone(), "reasoning", 3),
            ToolInvoker::new(tool_set().database(db.clone()).build()),
            &settings(3),
        );

        let reply = engine.run("全商品の一覧").await;
        assert_eq!(reply, "3 products found: A, B, C");
        assert_eq!(db.queries(), vec!["SELECT * FROM products;".to_string()]);
        assert_eq!(llm.calls(), 2);
        assert!(llm.prompts()[1].contains("\"success\": true"));
    }

    #[tokio::test]
    async fn test_greeting_skips_tools() {
        let llm = Arc::new(MockLlm::new([json!({
            "needs_tool": false,
            "task_completed": false,
            "final_response": "こんにちは！"
        })
        .to_string()]));
        let db = Arc::new(MockDatabase::with_rows(json!([])));
        let mut engine = ExecutionEngine::new(
            Planner::new(llm.clone(), "reasoning", 3),
            ToolInvoker::new(tool_set().database(db.clone()).build()),
            &settings(3),
        );

        assert_eq!(engine.run("こんにちは").await, "こんにちは！");
        assert!(db.queries().is_empty());
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_plan_asks_human_first() {
        let llm = Arc::new(MockLlm::new([
            "Sorry, I am not sure what you mean.".to_string(),
            json!({"task_completed": true, "final_response": "Here are the red items"}).to_string(),
        ]));
        let human = Arc::new(MockHuman::new(["the red ones"]));
        let mut engine = ExecutionEngine::new(
            Planner::new(llm.clone(), "reasoning", 3),
            ToolInvoker::new(tool_set().human(human.clone()).build()),
            &settings(3),
        );

        assert_eq!(engine.run("show me stuff").await, "Here are the red items");
        assert_eq!(human.questions(), vec![messages::CLARIFY_QUESTION.to_string()]);
        assert!(llm.prompts()[1].contains("the red ones"));
    }

    #[tokio::test]
    async fn test_planner_calls_bounded_by_iterations() {
        let always_more = db_phase(&["SELECT 1"]);
        let llm = Arc::new(MockLlm::new(vec![always_more; 10]));
        let db = Arc::new(MockDatabase::with_rows(json!([{"one": 1}])));
        let mut engine = ExecutionEngine::new(
            Planner::new(llm.clone(), "reasoning", 3),
            ToolInvoker::new(tool_set().database(db.clone()).build()),
            &settings(2),
        );

        let reply = engine.run("loop forever").await;
        // two execute rounds, then the summary call
        assert_eq!(db.queries().len(), 2);
        assert_eq!(llm.calls(), 3);
        // summary reply has no final_response, so the results are dumped
        assert_eq!(reply, "[\n  {\n    \"one\": 1\n  }\n]");
    }

    #[tokio::test]
    async fn test_oversized_phase_truncated() {
        let llm = Arc::new(MockLlm::new([
            db_phase(&["q1", "q2", "q3", "q4", "q5"]),
            json!({"task_completed": true, "final_response": "ok"}).to_string(),
        ]));
        let db = Arc::new(MockDatabase::with_rows(json!([])));
        let mut engine = ExecutionEngine::new(
            Planner::new(llm, "reasoning", 3),
            ToolInvoker::new(tool_set().database(db.clone()).build()),
            &settings(3),
        );
        assert_eq!(engine.run("many").await, "ok");
        assert_eq!(db.queries(), vec!["q1", "q2", "q3"]);
    }

    #[tokio::test]
    async fn test_completed_without_answer_uses_formatter() {
        let llm = Arc::new(MockLlm::new([
            db_phase(&["SELECT name FROM products"]),
            json!({"task_completed": true}).to_string(),
        ]));
        let mut engine = ExecutionEngine::new(
            Planner::new(llm, "reasoning", 3),
            ToolInvoker::new(
                tool_set()
                    .database(Arc::new(MockDatabase::failing("no such table")))
                    .build(),
            ),
            &settings(3),
        );
        assert_eq!(engine.run("names").await, messages::NO_RESULT);
    }

    #[tokio::test]
    async fn test_function_calling_dispatch() {
        let llm = Arc::new(MockLlm::new([
            db_phase(&["SELECT * FROM products"]),
            json!({"task_completed": true, "final_response": "done"}).to_string(),
        ]));
        let caller = Arc::new(MockToolCaller::new(vec![ToolCallResponse {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "database_query".into(),
                arguments: r#"{"query": "SELECT id, name FROM products"}"#.into(),
            }],
        }]));
        let db = Arc::new(MockDatabase::with_rows(json!([])));
        let mut engine = ExecutionEngine::new(
            Planner::new(llm, "reasoning", 3),
            ToolInvoker::new(tool_set().database(db.clone()).build()),
            &settings(3),
        )
        .with_function_calling(caller.clone(), "execution");

        assert_eq!(engine.run("products").await, "done");
        assert_eq!(db.queries(), vec!["SELECT id, name FROM products"]);
        let requests = caller.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, 4);
        assert!(requests[0].0.contains("SELECT * FROM products"));
    }

    #[tokio::test]
    async fn test_execution_model_error_becomes_apology() {
        let llm = Arc::new(MockLlm::new([db_phase(&["SELECT 1"])]));
        let caller = Arc::new(MockToolCaller::default());
        let mut engine = ExecutionEngine::new(
            Planner::new(llm, "reasoning", 3),
            ToolInvoker::new(tool_set().build()),
            &settings(3),
        )
        .with_function_calling(caller, "execution");

        let reply = engine.run("anything").await;
        assert!(reply.starts_with("Sorry, an error occurred"));
        assert!(reply.contains("Execution model failed"));
    }
}
