//! # Messages
//!
//! Constant strings and format functions for user-facing messages.

pub const NO_RESULT: &str = "No results were found for this request.";
pub const GENERIC_APOLOGY: &str = "Sorry, I could not produce an answer for this request.";

/// Question asked when the planner's reply could not be understood.
pub const CLARIFY_QUESTION: &str = "Sorry, could you describe what you need more specifically?";
pub const CLARIFY_DESCRIPTION: &str = "Clarify the user's intent";
pub const FALLBACK_SUBTASKS: [&str; 3] = [
    "Clarify the user's intent",
    "Collect the required information",
    "Organize and present the result",
];

pub fn processing_error(err: &str) -> String {
    format!("Sorry, an error occurred while processing your request: {err}")
}

// REPL
pub const WELCOME: &str = "toolbridge ready. Type `.help` for commands, `quit` to exit.";
pub const GOODBYE: &str = "Bye.";
pub const USER_PROMPT: &str = "\n> ";
pub const NO_PLAN: &str = "No plan has been made yet.";
pub const EMPTY_HISTORY: &str = "No conversation yet.";
pub const VOICE_ON: &str = "Voice output enabled.";
pub const VOICE_OFF: &str = "Voice output disabled.";
pub const VOICE_UNAVAILABLE: &str = "Voice output needs an API key (see services.voice.api_key_env).";
pub const VOICE_USAGE: &str = "Usage: `.voice on|off`";

pub fn unknown_command(cmd: &str) -> String {
    format!("Unknown command `{cmd}`. Type `.help` for the list.")
}

pub const HELP: &str = "\
Commands:
  .voice on|off   toggle spoken replies
  .plan           show the plan of the last request
  .history        show the conversation so far
  .help           show this help
  quit | exit | q leave";
