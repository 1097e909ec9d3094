//! # MCP Module
//!
//! Model Context Protocol client for the SQLite server that owns the database.

pub mod client;

pub use client::SqliteMcp;
