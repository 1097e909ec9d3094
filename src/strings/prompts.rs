//! # Prompts
//!
//! Templates for the reasoning and execution models, rendered with `PromptRenderer`.

/// A builder for rendering prompts with context.
pub struct PromptRenderer<'a> {
    template: &'a str,
    replacements: Vec<(&'a str, String)>,
}

impl<'a> PromptRenderer<'a> {
    pub fn new(template: &'a str) -> Self {
        Self {
            template,
            replacements: Vec::new(),
        }
    }

    pub fn set(mut self, key: &'a str, value: impl Into<String>) -> Self {
        self.replacements.push((key, value.into()));
        self
    }

    /// Substitutes every `{{KEY}}` of the template in one pass. Inserted values
    /// are never scanned again.
    pub fn render(self) -> String {
        let mut result = String::with_capacity(self.template.len());
        let mut rest = self.template;

        while let Some(start) = rest.find("{{") {
            result.push_str(&rest[..start]);
            let tail = &rest[start..];
            let Some(end) = tail.find("}}") else {
                rest = tail;
                break;
            };
            let placeholder = &tail[..end + 2];
            match self.replacements.iter().find(|(key, _)| *key == placeholder) {
                Some((_, value)) => result.push_str(value),
                None => {
                    tracing::error!("[PROMPT RENDER ERROR] Unreplaced placeholder found in template: {}", placeholder);
                    result.push_str(placeholder);
                }
            }
            rest = &tail[end + 2..];
        }
        result.push_str(rest);
        result
    }
}

pub const PLANNER_TEMPLATE: &str = include_str!("../../prompts/planner.md");
pub const EXECUTOR_TEMPLATE: &str = include_str!("../../prompts/executor.md");

const FIRST_ANALYSIS: &str = "\
This is the first analysis.
1. Break the task down into subtasks
2. Plan the operations of each phase
3. Decide the operations of the first phase

Reply with JSON containing both task_plan and current_phase.";

/// Prompt for one planning step. `prior` carries the serialized results and the
/// iteration number once something has been executed.
pub fn planner_prompt(user_message: &str, max_operations: usize, prior: Option<(&str, usize)>) -> String {
    let task_section = match prior {
        None => FIRST_ANALYSIS.to_string(),
        Some((results, iteration)) => format!(
            "Results of the previous phases:\n{results}\n\n\
             This is iteration {iteration}.\n\
             Analyse the results and decide the next phase or the final answer.\n\
             If the task is complete, put the answer in final_response."
        ),
    };
    PromptRenderer::new(PLANNER_TEMPLATE)
        .set("{{MAX_OPERATIONS}}", max_operations.to_string())
        .set("{{USER_MESSAGE}}", user_message)
        .set("{{TASK_SECTION}}", task_section)
        .render()
}

/// Terminal prompt once the iteration budget is spent.
pub fn summary_prompt(user_message: &str, max_operations: usize, results: &str, max_iterations: usize) -> String {
    let task_section = format!(
        "All information collected so far:\n{results}\n\n\
         The maximum number of execution rounds ({max_iterations}) has been reached.\n\
         Do not plan further operations. Set task_completed to true and write the best\n\
         possible answer from the information above into final_response."
    );
    PromptRenderer::new(PLANNER_TEMPLATE)
        .set("{{MAX_OPERATIONS}}", max_operations.to_string())
        .set("{{USER_MESSAGE}}", user_message)
        .set("{{TASK_SECTION}}", task_section)
        .render()
}

pub fn executor_system_prompt(schema: &str, max_operations: usize) -> String {
    PromptRenderer::new(EXECUTOR_TEMPLATE)
        .set("{{SCHEMA}}", schema)
        .set("{{MAX_OPERATIONS}}", max_operations.to_string())
        .render()
}

pub fn executor_user_prompt(description: &str, operations: &str) -> String {
    format!("Phase: {description}\n\nOperations to perform:\n{operations}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_replaces_all() {
        let out = PromptRenderer::new("a {{X}} b {{Y}}")
            .set("{{X}}", "1")
            .set("{{Y}}", "2")
            .render();
        assert_eq!(out, "a 1 b 2");
    }

    #[test]
    fn test_inserted_values_are_not_rescanned() {
        let out = PromptRenderer::new("{{USER}} / {{TASK}}")
            .set("{{USER}}", "say {{TASK}} and {{nothing}}")
            .set("{{TASK}}", "plan")
            .render();
        assert_eq!(out, "say {{TASK}} and {{nothing}} / plan");

        let prompt = planner_prompt("what is {{TASK_SECTION}}?", 3, None);
        assert!(prompt.contains("what is {{TASK_SECTION}}?"));
        assert!(prompt.contains("This is the first analysis."));
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let out = PromptRenderer::new("a {{MISSING}} b {{ unterminated").render();
        assert_eq!(out, "a {{MISSING}} b {{ unterminated");
    }

    #[test]
    fn test_first_planner_prompt() {
        let prompt = planner_prompt("list all products", 3, None);
        assert!(prompt.contains("list all products"));
        assert!(prompt.contains("At most 3 operations per phase"));
        assert!(prompt.contains("This is the first analysis."));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn test_followup_planner_prompt() {
        let prompt = planner_prompt("list all products", 2, Some(("[{\"success\": true}]", 1)));
        assert!(prompt.contains("iteration 1"));
        assert!(prompt.contains("[{\"success\": true}]"));
        assert!(!prompt.contains("This is the first analysis."));
    }

    #[test]
    fn test_summary_and_executor_prompts() {
        let prompt = summary_prompt("q", 3, "[]", 3);
        assert!(prompt.contains("(3)"));
        let system = executor_system_prompt("products: id INTEGER", 3);
        assert!(system.contains("products: id INTEGER"));
        assert!(!system.contains("{{"));
        assert!(executor_user_prompt("load", "[]").starts_with("Phase: load"));
    }
}
