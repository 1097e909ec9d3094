//! # Configuration
//!
//! Manages the loading and parsing of the bridge's configuration file (`config.yaml`).
//! Defines the structs for the model agents, the external services and the loop limits.
//! Secrets are never stored in the file directly; they are resolved from environment
//! variables named by the `*_env` fields.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Agent name used for planning calls.
pub const REASONING_AGENT: &str = "reasoning";
/// Agent name used for function-calling.
pub const EXECUTION_AGENT: &str = "execution";

/// Main application configuration structure.
/// Matches the layout of `data/config.yaml`.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_agents")]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub bridge: BridgeSettings,
    #[serde(default)]
    pub system: SystemConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agents: default_agents(),
            services: ServicesConfig::default(),
            bridge: BridgeSettings::default(),
            system: SystemConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads the configuration from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Resolves the config path: explicit flag, then `data/config.yaml`,
    /// then the user config directory.
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        let local = PathBuf::from("data/config.yaml");
        if local.exists() {
            return local;
        }
        dirs::config_dir()
            .map(|dir| dir.join("toolbridge").join("config.yaml"))
            .filter(|p| p.exists())
            .unwrap_or(local)
    }

    /// Checks everything that must be present before the bridge can start.
    /// Configuration errors are fatal, so this is called once from `main`.
    pub fn validate(&self) -> Result<()> {
        for name in [REASONING_AGENT, EXECUTION_AGENT] {
            let agent = self
                .agents
                .get(name)
                .with_context(|| format!("Agent `{name}` is not configured"))?;
            agent
                .resolve_api_key()
                .with_context(|| format!("Agent `{name}` has no usable API key"))?;
        }
        if self.bridge.max_iterations == 0 {
            bail!("bridge.max_iterations must be at least 1");
        }
        if self.bridge.max_operations_per_phase == 0 {
            bail!("bridge.max_operations_per_phase must be at least 1");
        }
        Ok(())
    }

    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.system.data_dir)
    }
}

pub type AgentsConfig = HashMap<String, AgentConfig>;

fn default_agents() -> AgentsConfig {
    let mut agents = HashMap::new();
    agents.insert(
        REASONING_AGENT.to_string(),
        AgentConfig {
            provider: "openai".into(),
            model: "o1-mini".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            max_tokens: Some(32768),
            ..Default::default()
        },
    );
    agents.insert(
        EXECUTION_AGENT.to_string(),
        AgentConfig {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            api_key_env: Some("OPENAI_API_KEY".into()),
            temperature: Some(0.7),
            max_tokens: Some(2000),
            ..Default::default()
        },
    );
    agents
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>, // e.g. "OPENAI_API_KEY"
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl AgentConfig {
    pub fn resolve_api_key(&self) -> Result<String> {
        resolve_secret(self.api_key.as_deref(), self.api_key_env.as_deref())
    }
}

/// Returns the inline value if set, otherwise the named environment variable.
pub fn resolve_secret(inline: Option<&str>, env_var: Option<&str>) -> Result<String> {
    if let Some(value) = inline.filter(|v| !v.trim().is_empty()) {
        return Ok(value.to_string());
    }
    let Some(var) = env_var else {
        bail!("No secret provided - set the value or its *_env variable");
    };
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        Ok(_) => bail!("Environment variable {var} is empty"),
        Err(e) => bail!("Environment variable {var} not set: {e}"),
    }
}

/// Configuration for the external tool services.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServicesConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
}

/// How to spawn the SQLite MCP server.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_mcp_command")]
    pub command: String,
    #[serde(default = "default_mcp_args")]
    pub args: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            command: default_mcp_command(),
            args: default_mcp_args(),
        }
    }
}

fn default_mcp_command() -> String {
    "uvx".to_string()
}

fn default_mcp_args() -> Vec<String> {
    vec![
        "mcp-server-sqlite".to_string(),
        "--db-path".to_string(),
        "test.db".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key: None,
            api_key_env: default_search_key_env(),
        }
    }
}

fn default_search_endpoint() -> String {
    "https://serpapi.com/search".to_string()
}

fn default_search_key_env() -> Option<String> {
    Some("SERPAPI_KEY".to_string())
}

#[derive(Debug, Deserialize, Clone)]
pub struct SpotifyConfig {
    #[serde(default = "default_spotify_api")]
    pub api_base: String,
    #[serde(default = "default_spotify_accounts")]
    pub accounts_url: String,
    #[serde(default = "default_spotify_client_id_env")]
    pub client_id_env: String,
    #[serde(default = "default_spotify_client_secret_env")]
    pub client_secret_env: String,
    #[serde(default = "default_spotify_refresh_env")]
    pub refresh_token_env: String,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            api_base: default_spotify_api(),
            accounts_url: default_spotify_accounts(),
            client_id_env: default_spotify_client_id_env(),
            client_secret_env: default_spotify_client_secret_env(),
            refresh_token_env: default_spotify_refresh_env(),
        }
    }
}

fn default_spotify_api() -> String {
    "https://api.spotify.com/v1".to_string()
}
fn default_spotify_accounts() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}
fn default_spotify_client_id_env() -> String {
    "SPOTIFY_CLIENT_ID".to_string()
}
fn default_spotify_client_secret_env() -> String {
    "SPOTIFY_CLIENT_SECRET".to_string()
}
fn default_spotify_refresh_env() -> String {
    "SPOTIFY_REFRESH_TOKEN".to_string()
}

/// Text-to-speech output settings.
#[derive(Debug, Deserialize, Clone)]
pub struct VoiceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_voice_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_voice_actor")]
    pub actor_id: String,
    #[serde(default = "default_voice_base_url")]
    pub base_url: String,
    /// Player command, the audio file path is appended as last argument.
    #[serde(default = "default_player")]
    pub player: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key_env: default_voice_key_env(),
            actor_id: default_voice_actor(),
            base_url: default_voice_base_url(),
            player: default_player(),
        }
    }
}

fn default_voice_key_env() -> String {
    "NIJIVOICE_API_KEY".to_string()
}
fn default_voice_actor() -> String {
    "1fc717fe-ebf9-402b-9d8c-c59cda93d5dc".to_string()
}
fn default_voice_base_url() -> String {
    "https://api.nijivoice.com/api/platform/v1".to_string()
}
fn default_player() -> Vec<String> {
    vec!["mpv".to_string(), "--no-video".to_string(), "--really-quiet".to_string()]
}

/// How phase operations reach the tool invoker.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Operations from the planner are invoked as given.
    #[default]
    Direct,
    /// The phase is handed to the execution model, its tool calls are invoked.
    FunctionCalling,
}

/// Limits of the plan/execute loop.
#[derive(Debug, Deserialize, Clone)]
pub struct BridgeSettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_max_operations")]
    pub max_operations_per_phase: usize,
    #[serde(default)]
    pub dispatch: DispatchMode,
    /// Turns included in the rolling conversation summary.
    #[serde(default = "default_summary_turns")]
    pub summary_turns: usize,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_operations_per_phase: default_max_operations(),
            dispatch: DispatchMode::default(),
            summary_turns: default_summary_turns(),
        }
    }
}

fn default_max_iterations() -> usize {
    3
}
fn default_max_operations() -> usize {
    3
}
fn default_summary_turns() -> usize {
    6
}

/// System-level settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SystemConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Mirror log lines to stderr in addition to `session.log`.
    #[serde(default)]
    pub console: bool,
    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console: false,
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info,rmcp=warn,reqwest=warn,hyper=warn".to_string()
}
