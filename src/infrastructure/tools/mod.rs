//! # Tools Module
//!
//! The tool collaborators (search, Spotify, console) and the invoker that
//! dispatches typed operations to them.

pub mod catalog;
pub mod executor;
pub mod human;
pub mod search;
pub mod spotify;

pub use executor::{ToolInvoker, ToolSet};
