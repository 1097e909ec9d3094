//! # Interface Layer
//!
//! The console front end.

pub mod repl;
