//! # Session
//!
//! Conversation state for one REPL run. Every request is sent to the engine
//! together with a short summary of the recent turns.

use std::sync::Arc;

use crate::application::engine::ExecutionEngine;
use crate::domain::traits::VoiceOutput;
use crate::domain::types::{Conversation, Plan, Role};

/// Characters kept per turn in the rolling summary.
const SUMMARY_TURN_CHARS: usize = 200;

pub struct Session {
    engine: ExecutionEngine,
    conversation: Conversation,
    summary: String,
    summary_turns: usize,
    voice: Option<Arc<dyn VoiceOutput>>,
}

impl Session {
    pub fn new(engine: ExecutionEngine, summary_turns: usize) -> Self {
        Self {
            engine,
            conversation: Conversation::new(),
            summary: String::new(),
            summary_turns,
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: Arc<dyn VoiceOutput>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Plan made for the most recent request, if any.
    pub fn plan(&self) -> Option<&Plan> {
        self.engine.planner().current_plan()
    }

    /// Runs one user request and returns the reply to show.
    pub async fn handle(&mut self, input: &str) -> String {
        let request = compose_request(&self.summary, input);
        self.conversation.push(Role::User, input);

        let reply = self.engine.run(&request).await;

        self.conversation.push(Role::Assistant, reply.clone());
        self.summary = self
            .conversation
            .render_recent(self.summary_turns, SUMMARY_TURN_CHARS);

        if let Some(voice) = &self.voice
            && let Err(e) = voice.speak(&reply).await
        {
            tracing::warn!("Voice output failed: {e:#}");
        }
        reply
    }
}

fn compose_request(summary: &str, input: &str) -> String {
    if summary.is_empty() {
        input.to_string()
    } else {
        format!("{summary}\n\nUser input: {input}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::planner::Planner;
    use crate::domain::config::BridgeSettings;
    use crate::infrastructure::tools::ToolInvoker;
    use crate::testing::{MockLlm, MockVoice, tool_set};

    fn session(llm: Arc<MockLlm>) -> Session {
        let planner = Planner::new(llm, "reasoning", 3);
        let engine = ExecutionEngine::new(
            planner,
            ToolInvoker::new(tool_set().build()),
            &BridgeSettings::default(),
        );
        Session::new(engine, 6)
    }

    #[tokio::test]
    async fn test_summary_carries_previous_turns() {
        let llm = Arc::new(MockLlm::new([
            r#"{"needs_tool": false, "final_response": "Hello! How can I help?"}"#,
            r#"{"needs_tool": false, "final_response": "You said hello."}"#,
        ]));
        let mut session = session(llm.clone());

        assert_eq!(session.handle("hello").await, "Hello! How can I help?");
        assert_eq!(session.handle("what did I say?").await, "You said hello.");

        let prompts = llm.prompts();
        assert!(!prompts[0].contains("User input:"));
        assert!(prompts[1].contains("user: hello"));
        assert!(prompts[1].contains("assistant: Hello! How can I help?"));
        assert!(prompts[1].contains("User input: what did I say?"));
        assert_eq!(session.conversation().len(), 4);
    }

    #[tokio::test]
    async fn test_summary_keeps_recent_turns_only() {
        let replies: Vec<String> = (0..4)
            .map(|i| format!(r#"{{"needs_tool": false, "final_response": "reply {i}"}}"#))
            .collect();
        let mut session = session(Arc::new(MockLlm::new(replies)));
        for i in 0..4 {
            session.handle(&format!("message {i}")).await;
        }
        let summary = &session.summary;
        assert!(!summary.contains("message 0"));
        assert!(summary.contains("message 1"));
        assert_eq!(summary.lines().count(), 6);
    }

    #[tokio::test]
    async fn test_reply_is_spoken() {
        let llm = Arc::new(MockLlm::new([r#"{"final_response": "Done."}"#]));
        let voice = Arc::new(MockVoice::default());
        let mut session = session(llm).with_voice(voice.clone());
        session.handle("hi").await;
        assert_eq!(voice.spoken(), vec!["Done.".to_string()]);
    }

    #[test]
    fn test_compose_request() {
        assert_eq!(compose_request("", "hi"), "hi");
        assert_eq!(compose_request("user: a", "b"), "user: a\n\nUser input: b");
    }
}
