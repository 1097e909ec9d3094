//! # Strings Module
//!
//! Centralizes user-facing strings and model prompts.

pub mod messages;
pub mod prompts;
