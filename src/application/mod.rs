//! # Application Layer
//!
//! Orchestration of a request: planning, the execution loop, result formatting
//! and the per-process session.

pub mod engine;
pub mod formatter;
pub mod logging;
pub mod parsing;
pub mod planner;
pub mod session;
