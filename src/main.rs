//! # toolbridge
//!
//! Console bridge between a reasoning model and a set of tools:
//! - Domain: configuration, operations and collaborator traits
//! - Infrastructure: LLM providers, the SQLite MCP server, search, Spotify, voice
//! - Application: planner, execution engine, formatter, session, logging
//! - Interface: the REPL

mod application;
mod domain;
mod infrastructure;
mod interface;
mod strings;
#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use crate::application::engine::ExecutionEngine;
use crate::application::planner::Planner;
use crate::application::session::Session;
use crate::domain::config::{AppConfig, DispatchMode, EXECUTION_AGENT, REASONING_AGENT};
use crate::infrastructure::llm::Client as LlmClient;
use crate::infrastructure::mcp::SqliteMcp;
use crate::infrastructure::tools::human::{ConsoleHuman, ConsoleInput};
use crate::infrastructure::tools::search::SerpApiSearch;
use crate::infrastructure::tools::spotify::SpotifyClient;
use crate::infrastructure::tools::{ToolInvoker, ToolSet};
use crate::infrastructure::voice::NijiVoice;
use crate::interface::repl::Repl;

#[derive(Parser, Debug)]
#[command(version, about = "Plan-and-execute bridge between an LLM and its tools")]
struct Args {
    /// Path to config.yaml (defaults to data/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start with spoken replies enabled
    #[arg(long)]
    voice: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Configuration
    let config_path = AppConfig::locate(args.config.as_deref());
    let mut config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    if args.voice {
        config.services.voice.enabled = true;
    }
    config.validate().context("Invalid configuration")?;

    // 2. Logging
    let _guard = application::logging::init(&config)?;
    tracing::info!("Starting toolbridge with {}", config_path.display());

    // 3. Infrastructure
    let llm = Arc::new(LlmClient::new(config.agents.clone()));
    let database = Arc::new(SqliteMcp::connect(&config.services.database).await?);
    let input = ConsoleInput::stdin();
    let voice = Arc::new(NijiVoice::new(&config.services.voice, config.data_dir()));

    let tools = ToolSet {
        database: database.clone(),
        search: Arc::new(SerpApiSearch::new(&config.services.search)),
        human: Arc::new(ConsoleHuman::new(input.clone())),
        media: Arc::new(SpotifyClient::new(&config.services.spotify)),
    };

    // 4. Application
    let settings = &config.bridge;
    let planner = Planner::new(llm.clone(), REASONING_AGENT, settings.max_operations_per_phase);
    let mut engine = ExecutionEngine::new(planner, ToolInvoker::new(tools), settings);
    if settings.dispatch == DispatchMode::FunctionCalling {
        engine = engine.with_function_calling(llm.clone(), EXECUTION_AGENT);
    }
    tracing::info!(
        dispatch = ?settings.dispatch,
        max_iterations = settings.max_iterations,
        max_operations = settings.max_operations_per_phase,
        "Engine ready"
    );

    let session = Session::new(engine, settings.summary_turns).with_voice(voice.clone());

    // 5. REPL
    let mut repl = Repl::new(session, input).with_voice(voice);
    let outcome = repl.run().await;
    drop(repl);

    match Arc::try_unwrap(database) {
        Ok(database) => database.close().await,
        Err(_) => tracing::warn!("MCP connection still shared at shutdown"),
    }
    tracing::info!("Shutting down");
    outcome
}
