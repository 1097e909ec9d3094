//! # Domain Layer
//!
//! Core definitions, types, and traits of the bridge.
//! Independent of the concrete model APIs and tool services, serving as the contract for other layers.

pub mod config;
pub mod traits;
pub mod types;
