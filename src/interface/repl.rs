//! # REPL
//!
//! Line-oriented console front end. Dot-commands control the session, anything
//! else is a request for the bridge.

use anyhow::Result;
use std::sync::Arc;

use crate::application::session::Session;
use crate::domain::types::{Conversation, Operation, Plan};
use crate::infrastructure::tools::human::ConsoleInput;
use crate::infrastructure::voice::NijiVoice;
use crate::strings::messages;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Voice(Option<bool>),
    Plan,
    History,
    Help,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Empty,
    Quit,
    Command(Command),
    Message(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if matches!(line.to_lowercase().as_str(), "quit" | "exit" | "q") {
        return Input::Quit;
    }
    if !line.starts_with('.') {
        return Input::Message(line.to_string());
    }

    let (cmd, args) = line.split_once(' ').unwrap_or((line, ""));
    let command = match cmd {
        ".voice" => Command::Voice(match args.trim() {
            "on" => Some(true),
            "off" => Some(false),
            _ => None,
        }),
        ".plan" => Command::Plan,
        ".history" => Command::History,
        ".help" => Command::Help,
        other => Command::Unknown(other.to_string()),
    };
    Input::Command(command)
}

pub struct Repl {
    session: Session,
    input: ConsoleInput,
    voice: Option<Arc<NijiVoice>>,
}

impl Repl {
    pub fn new(session: Session, input: ConsoleInput) -> Self {
        Self {
            session,
            input,
            voice: None,
        }
    }

    pub fn with_voice(mut self, voice: Arc<NijiVoice>) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Reads and answers lines until `quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        println!("{}", messages::WELCOME);
        loop {
            let Some(line) = self.input.read_line(messages::USER_PROMPT).await? else {
                break;
            };
            match parse_input(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Command(command) => println!("{}", self.command(command)),
                Input::Message(message) => {
                    tracing::info!("User: {}", message);
                    let reply = self.session.handle(&message).await;
                    tracing::info!("Reply: {}", reply);
                    println!("\n{reply}");
                }
            }
        }
        println!("{}", messages::GOODBYE);
        Ok(())
    }

    fn command(&self, command: Command) -> String {
        match command {
            Command::Voice(Some(enabled)) => self.toggle_voice(enabled),
            Command::Voice(None) => messages::VOICE_USAGE.to_string(),
            Command::Plan => self
                .session
                .plan()
                .map(render_plan)
                .unwrap_or_else(|| messages::NO_PLAN.to_string()),
            Command::History => render_history(self.session.conversation()),
            Command::Help => messages::HELP.to_string(),
            Command::Unknown(cmd) => messages::unknown_command(&cmd),
        }
    }

    fn toggle_voice(&self, enabled: bool) -> String {
        let Some(voice) = &self.voice else {
            return messages::VOICE_UNAVAILABLE.to_string();
        };
        if enabled && !voice.has_api_key() {
            return messages::VOICE_UNAVAILABLE.to_string();
        }
        voice.set_enabled(enabled);
        if enabled {
            messages::VOICE_ON.to_string()
        } else {
            messages::VOICE_OFF.to_string()
        }
    }
}

fn render_plan(plan: &Plan) -> String {
    let mut out = format!("Plan ({} phases):", plan.total_phases);
    for (i, task) in plan.subtasks.iter().enumerate() {
        out.push_str(&format!("\n  {}. {}", i + 1, task));
    }
    for phase in &plan.phases {
        let kinds: Vec<String> = phase.operations.iter().map(Operation::type_name).collect();
        out.push_str(&format!(
            "\n  phase {}: {} [{}]",
            phase.index,
            phase.description,
            kinds.join(", ")
        ));
    }
    out
}

fn render_history(conversation: &Conversation) -> String {
    if conversation.is_empty() {
        return messages::EMPTY_HISTORY.to_string();
    }
    conversation
        .turns()
        .iter()
        .map(|turn| {
            format!(
                "[{}] {}: {}",
                turn.at.format("%H:%M:%S"),
                turn.role.as_str(),
                turn.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Phase, Role};

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input("quit"), Input::Quit);
        assert_eq!(parse_input(" EXIT "), Input::Quit);
        assert_eq!(parse_input("q"), Input::Quit);
        assert_eq!(
            parse_input("list all products"),
            Input::Message("list all products".into())
        );
        assert_eq!(parse_input(".voice on"), Input::Command(Command::Voice(Some(true))));
        assert_eq!(parse_input(".voice  off"), Input::Command(Command::Voice(Some(false))));
        assert_eq!(parse_input(".voice"), Input::Command(Command::Voice(None)));
        assert_eq!(parse_input(".plan"), Input::Command(Command::Plan));
        assert_eq!(parse_input(".history"), Input::Command(Command::History));
        assert_eq!(
            parse_input(".nope x"),
            Input::Command(Command::Unknown(".nope".into()))
        );
    }

    #[test]
    fn test_render_plan() {
        let plan = Plan {
            subtasks: vec!["Load products".into(), "Answer".into()],
            total_phases: 1,
            phases: vec![Phase::single(
                1,
                Operation::DatabaseQuery {
                    query: "SELECT 1".into(),
                },
                "load",
            )],
        };
        let text = render_plan(&plan);
        assert!(text.starts_with("Plan (1 phases):"));
        assert!(text.contains("1. Load products"));
        assert!(text.contains("phase 1: load [database_query]"));
    }

    #[test]
    fn test_render_history() {
        let mut conversation = Conversation::new();
        assert_eq!(render_history(&conversation), messages::EMPTY_HISTORY);
        conversation.push(Role::User, "hi");
        conversation.push(Role::Assistant, "hello");
        let text = render_history(&conversation);
        assert!(text.lines().next().unwrap().ends_with("user: hi"));
        assert!(text.ends_with("assistant: hello"));
    }
}
