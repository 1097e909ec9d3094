//! # Planner
//!
//! Turns the user message and the results gathered so far into a structured
//! `PlannerDecision` via the reasoning model. Never fails: anything it cannot
//! understand degrades to a clarification question for the user.

use std::sync::Arc;

use crate::application::parsing::extract_json;
use crate::domain::traits::LlmProvider;
use crate::domain::types::{ExecutionResult, Operation, Phase, Plan, PlannerDecision};
use crate::strings::{messages, prompts};

pub struct Planner {
    llm: Arc<dyn LlmProvider>,
    agent: String,
    max_operations: usize,
    current_plan: Option<Plan>,
}

impl Planner {
    pub fn new(llm: Arc<dyn LlmProvider>, agent: impl Into<String>, max_operations: usize) -> Self {
        Self {
            llm,
            agent: agent.into(),
            max_operations,
            current_plan: None,
        }
    }

    /// Plan of the current request, from its first planning call.
    pub fn current_plan(&self) -> Option<&Plan> {
        self.current_plan.as_ref()
    }

    /// Decides the next step for `user_message`.
    pub async fn plan(
        &mut self,
        user_message: &str,
        prior_results: &[ExecutionResult],
        iteration: usize,
    ) -> PlannerDecision {
        tracing::info!(iteration, prior = prior_results.len(), "Planning");
        if iteration == 0 {
            self.current_plan = None;
        }
        let prompt = if prior_results.is_empty() {
            prompts::planner_prompt(user_message, self.max_operations, None)
        } else {
            let serialized = serialize_results(prior_results);
            prompts::planner_prompt(
                user_message,
                self.max_operations,
                Some((&serialized, iteration)),
            )
        };

        let reply = match self.llm.completion(&prompt, &self.agent).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Reasoning model call failed: {e}");
                return fallback_decision(iteration);
            }
        };

        match parse_decision(&reply) {
            Ok(decision) => {
                if iteration == 0
                    && let Some(plan) = &decision.plan
                {
                    tracing::debug!(subtasks = plan.subtasks.len(), phases = plan.total_phases, "Plan stored");
                    self.current_plan = Some(plan.clone());
                }
                tracing::info!(
                    needs_tool = decision.needs_tool,
                    task_completed = decision.task_completed,
                    "Planner decision"
                );
                decision
            }
            Err(e) => {
                tracing::warn!("Unparsable planner reply ({e}): {}", reply);
                fallback_decision(iteration)
            }
        }
    }

    /// Final call once the iteration budget is spent. Returns the model's
    /// `final_response`, if it produced one.
    pub async fn summarize(
        &self,
        user_message: &str,
        results: &[ExecutionResult],
        max_iterations: usize,
    ) -> Option<String> {
        tracing::info!(results = results.len(), "Iteration budget reached, summarizing");
        let prompt = prompts::summary_prompt(
            user_message,
            self.max_operations,
            &serialize_results(results),
            max_iterations,
        );
        let reply = match self.llm.completion(&prompt, &self.agent).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Summary call failed: {e}");
                return None;
            }
        };
        match parse_decision(&reply) {
            Ok(decision) => decision.final_response,
            Err(e) => {
                tracing::warn!("Unparsable summary reply: {e}");
                None
            }
        }
    }
}

fn serialize_results(results: &[ExecutionResult]) -> String {
    serde_json::to_string_pretty(results).unwrap_or_else(|_| format!("{results:?}"))
}

/// Parses a raw model reply into a decision with its invariants restored.
pub fn parse_decision(reply: &str) -> Result<PlannerDecision, String> {
    let value = extract_json(reply)?;
    if !value.is_object() {
        return Err("decision is not a JSON object".to_string());
    }
    let decision: PlannerDecision = serde_json::from_value(value).map_err(|e| e.to_string())?;
    Ok(decision.normalized())
}

/// Canned decision asking the user to restate the request.
pub fn fallback_decision(iteration: usize) -> PlannerDecision {
    let phase = Phase::single(
        1,
        Operation::HumanInteraction {
            question: messages::CLARIFY_QUESTION.to_string(),
        },
        messages::CLARIFY_DESCRIPTION,
    );
    let plan = (iteration == 0).then(|| Plan {
        subtasks: messages::FALLBACK_SUBTASKS.iter().map(|s| s.to_string()).collect(),
        total_phases: messages::FALLBACK_SUBTASKS.len() as u32,
        phases: vec![phase.clone()],
    });
    PlannerDecision {
        plan,
        current_phase: Some(phase),
        needs_tool: true,
        task_completed: false,
        final_response: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLlm;

    const PRODUCTS_PLAN: &str = r#"{
        "task_plan": {
            "overall_tasks": ["Load products", "Answer"],
            "total_phases": 2,
            "phases": []
        },
        "current_phase": {
            "phase_number": 1,
            "operations": [{"type": "database_query", "parameters": {"query": "SELECT * FROM products;"}}],
            "description": "Load products"
        },
        "needs_tool": true,
        "task_completed": false,
        "final_response": null
    }"#;

    #[tokio::test]
    async fn test_first_call_persists_plan() {
        let llm = Arc::new(MockLlm::new([PRODUCTS_PLAN]));
        let mut planner = Planner::new(llm.clone(), "reasoning", 3);
        let decision = planner.plan("list all products", &[], 0).await;

        assert!(decision.needs_tool);
        let phase = decision.phase_to_run().unwrap();
        assert_eq!(
            phase.operations,
            vec![Operation::DatabaseQuery {
                query: "SELECT * FROM products;".into()
            }]
        );
        assert_eq!(planner.current_plan().unwrap().subtasks.len(), 2);
        assert!(llm.prompts()[0].contains("This is the first analysis."));
    }

    #[tokio::test]
    async fn test_later_plan_not_persisted() {
        let llm = Arc::new(MockLlm::new([PRODUCTS_PLAN]));
        let mut planner = Planner::new(llm.clone(), "reasoning", 3);
        let results = vec![ExecutionResult::success("database_query", serde_json::json!([]))];
        planner.plan("list all products", &results, 1).await;
        assert!(planner.current_plan().is_none());
        assert!(llm.prompts()[0].contains("iteration 1"));
        assert!(!llm.prompts()[0].contains("This is the first analysis."));
    }

    #[tokio::test]
    async fn test_new_request_clears_previous_plan() {
        let llm = Arc::new(MockLlm::new([
            PRODUCTS_PLAN,
            r#"{"needs_tool": false, "final_response": "Hello!"}"#,
        ]));
        let mut planner = Planner::new(llm, "reasoning", 3);
        planner.plan("list all products", &[], 0).await;
        assert!(planner.current_plan().is_some());

        planner.plan("hello", &[], 0).await;
        assert!(planner.current_plan().is_none());
    }

    #[test]
    fn test_parse_decision_accepts_numeric_strings() {
        let reply = r#"{
            "task_plan": {"overall_tasks": ["Load"], "total_phases": "2"},
            "current_phase": {
                "phase_number": "1",
                "operations": [{"type": "database_query", "parameters": {"query": "SELECT 1"}}],
                "description": "Load"
            },
            "needs_tool": true
        }"#;
        let decision = parse_decision(reply).unwrap();
        assert_eq!(decision.plan.as_ref().unwrap().total_phases, 2);
        assert_eq!(decision.phase_to_run().unwrap().index, 1);
    }

    #[tokio::test]
    async fn test_unparsable_reply_falls_back() {
        let llm = Arc::new(MockLlm::new(["I think you want products, right?"]));
        let mut planner = Planner::new(llm, "reasoning", 3);
        let decision = planner.plan("???", &[], 0).await;

        assert!(decision.needs_tool);
        assert!(!decision.task_completed);
        let phase = decision.current_phase.as_ref().unwrap();
        assert_eq!(phase.operations.len(), 1);
        assert!(phase.operations[0].is_human_interaction());
        assert_eq!(decision.plan.unwrap().subtasks.len(), 3);
        assert!(planner.current_plan().is_none());
    }

    #[tokio::test]
    async fn test_model_error_falls_back_without_plan_after_first() {
        let llm = Arc::new(MockLlm::default().push_error("HTTP 500"));
        let mut planner = Planner::new(llm, "reasoning", 3);
        let decision = planner.plan("hello", &[], 2).await;
        assert!(decision.needs_tool);
        assert!(decision.plan.is_none());
    }

    #[test]
    fn test_parse_decision_defaults_and_invariants() {
        let decision = parse_decision(r#"{"final_response": "こんにちは！"}"#).unwrap();
        assert!(!decision.needs_tool);
        assert!(!decision.task_completed);
        assert!(decision.current_phase.is_none());

        let decision =
            parse_decision(r#"{"needs_tool": true, "task_completed": true, "final_response": "done"}"#)
                .unwrap();
        assert!(!decision.needs_tool);

        assert!(parse_decision("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_summarize() {
        let llm = Arc::new(MockLlm::new([
            r#"{"task_completed": true, "final_response": "3 products"}"#,
            "no json here",
        ]));
        let planner = Planner::new(llm, "reasoning", 3);
        assert_eq!(planner.summarize("q", &[], 3).await.as_deref(), Some("3 products"));
        assert_eq!(planner.summarize("q", &[], 3).await, None);
    }
}
