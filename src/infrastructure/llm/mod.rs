//! Simple LLM API wrapper for OpenAI-compatible providers
//!
//! Provides a unified interface for the reasoning and execution agents
//! (OpenAI, Groq, xAI, DeepAI), including function calling for the execution agent.

mod client;
pub mod providers;
mod types;

pub use client::Client;

pub use types::{Context, Error, Provider, Response, TokenUsage};
