//! # Infrastructure Layer
//!
//! Handles interactions with external systems and services.
//! Implements the traits defined in the Domain layer (LlmProvider, Database, SearchProvider, ...).

pub mod llm;
pub mod mcp;
pub mod tools;
pub mod voice;
