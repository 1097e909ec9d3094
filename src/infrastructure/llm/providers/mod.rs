//! # LLM Providers
//!
//! Every supported provider speaks the OpenAI chat-completions dialect; they only
//! differ in their base URL.

mod openai;

use crate::domain::config::AgentConfig;
use crate::infrastructure::llm::{Context, Error, Provider, Response};

/// Configuration for a provider
#[derive(Clone)]
pub struct ProviderConfig {
    /// API key
    pub api_key: String,
    /// Base URL (for non-default endpoints)
    pub base_url: Option<String>,
    /// Default model
    pub default_model: String,
    /// Timeout in seconds
    pub timeout: Option<u64>,
}

impl ProviderConfig {
    pub fn from_agent_config(config: &AgentConfig) -> Result<Self, Error> {
        let api_key = config
            .resolve_api_key()
            .map_err(|e| Error::new(&config.provider, e.to_string()))?;

        Ok(Self {
            api_key,
            base_url: config.endpoint.clone(),
            default_model: config.model.clone(),
            timeout: config.timeout,
        })
    }
}

/// Execute a chat request with the specified provider
pub async fn chat(
    provider: Provider,
    config: ProviderConfig,
    context: Context,
) -> Result<Response, Error> {
    let config = ProviderConfig {
        base_url: config
            .base_url
            .or_else(|| Some(provider.default_base_url().to_string())),
        ..config
    };
    openai::chat(config, context).await
}
