//! # LLM Client
//!
//! Provides the `Client` struct, the entry point for model interactions.
//! It routes requests to the appropriate provider based on the agent configuration.

use async_trait::async_trait;

use crate::domain::config::{AgentConfig, AgentsConfig};
use crate::domain::traits::{LlmProvider, ToolCallingProvider};
use crate::domain::types::{ToolCallResponse, ToolSpec};
use crate::infrastructure::llm::providers;
use crate::infrastructure::llm::{Context, Error, Provider, Response};

/// Simple LLM client
pub struct Client {
    agents: AgentsConfig,
}

impl Client {
    /// Create a new client from the configured agents
    pub fn new(agents: AgentsConfig) -> Self {
        Self { agents }
    }

    fn agent(&self, agent_name: &str) -> Result<(&AgentConfig, Provider), Error> {
        let agent_config = self
            .agents
            .get(agent_name)
            .ok_or_else(|| Error::new(agent_name, "Agent not found"))?;

        let provider_type = Provider::from_str(&agent_config.provider)
            .ok_or_else(|| Error::new(&agent_config.provider, "Unknown provider"))?;

        Ok((agent_config, provider_type))
    }

    /// Send a single prompt to an agent
    ///
    /// # Arguments
    /// * `agent_name` - The agent name (e.g., "reasoning", "execution")
    /// * `prompt` - The prompt text
    pub async fn prompt(&self, agent_name: &str, prompt: &str) -> Result<Response, Error> {
        let (agent_config, provider_type) = self.agent(agent_name)?;
        let provider_config = providers::ProviderConfig::from_agent_config(agent_config)?;

        let context = Context::prompt(prompt)
            .with_model(agent_config.model.clone())
            .with_temperature(agent_config.temperature)
            .with_max_tokens(agent_config.max_tokens);

        tracing::debug!(agent = agent_name, model = %agent_config.model, "LLM prompt");
        let response = providers::chat(provider_type, provider_config, context).await?;
        log_response(agent_name, provider_type, &response);
        Ok(response)
    }

    /// Send a system + user exchange and offer `tools` to the model.
    pub async fn chat_with_tools(
        &self,
        agent_name: &str,
        system: &str,
        user: &str,
        tools: &[ToolSpec],
    ) -> Result<Response, Error> {
        let (agent_config, provider_type) = self.agent(agent_name)?;
        let provider_config = providers::ProviderConfig::from_agent_config(agent_config)?;

        let context = Context::new()
            .add_system_message(system)
            .add_user_message(user)
            .with_model(agent_config.model.clone())
            .with_temperature(agent_config.temperature)
            .with_max_tokens(agent_config.max_tokens)
            .with_tools(tools.to_vec());

        tracing::debug!(
            agent = agent_name,
            model = %agent_config.model,
            tools = tools.len(),
            "LLM function-calling request"
        );
        let response = providers::chat(provider_type, provider_config, context).await?;
        log_response(agent_name, provider_type, &response);
        Ok(response)
    }
}

fn log_response(agent: &str, provider: Provider, response: &Response) {
    tracing::debug!(
        agent,
        provider = provider.as_str(),
        model = %response.model,
        prompt_tokens = response.usage.prompt_tokens,
        completion_tokens = response.usage.completion_tokens,
        total_tokens = response.usage.total_tokens,
        tool_calls = response.tool_calls.len(),
        "LLM response"
    );
}

#[async_trait]
impl LlmProvider for Client {
    async fn completion(&self, prompt: &str, agent_name: &str) -> Result<String, String> {
        self.prompt(agent_name, prompt)
            .await
            .map(|r| r.content)
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl ToolCallingProvider for Client {
    async fn chat_with_tools(
        &self,
        agent: &str,
        system: &str,
        user: &str,
        tools: &[ToolSpec],
    ) -> Result<ToolCallResponse, String> {
        Client::chat_with_tools(self, agent, system, user, tools)
            .await
            .map(|r| ToolCallResponse {
                content: r.content,
                tool_calls: r.tool_calls,
            })
            .map_err(|e| e.to_string())
    }
}
