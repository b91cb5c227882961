//! Struct definitions and serde defaults for tether configuration.

use serde::{Deserialize, Serialize};

use crate::permissions::PolicyConfig;

/// Root configuration for tether, deserialized from `config.toml`.
///
/// Fields use serde defaults so tether can run with sensible defaults
/// when no config file exists.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Default provider name (e.g., "ollama", "lmstudio").
    #[serde(default)]
    pub default_provider: Option<String>,
    /// Default chat model identifier.
    #[serde(default)]
    pub model: Option<String>,
    /// Model used for embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Model used for background indexing work; falls back to `model`.
    #[serde(default)]
    pub indexing_model: Option<String>,
    /// Optional system prompt prepended to all conversations.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,
    /// Per-provider connection settings.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Numeric limits for context and tool handling.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Feature flags.
    #[serde(default)]
    pub features: FeatureFlags,
    /// Permission policies for tool execution.
    #[serde(default)]
    pub permissions: PolicyConfig,
    /// Terminal presentation preferences (consumed by the UI layer).
    #[serde(default)]
    pub display: DisplayConfig,
}

pub(super) fn default_embedding_model() -> String {
    crate::constants::DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_system_prompt() -> Option<String> {
    Some(crate::constants::DEFAULT_SYSTEM_PROMPT.to_string())
}

/// Provider-specific configuration map.
///
/// Each field corresponds to a supported provider. Only providers the user
/// has configured will be `Some`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderConfig {
    /// Configuration for the local Ollama provider.
    pub ollama: Option<ProviderEntry>,
    /// Configuration for the local LM Studio provider.
    pub lmstudio: Option<ProviderEntry>,
}

/// Connection details for a single provider.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ProviderEntry {
    /// Host base URL (e.g. `http://localhost:11434`).
    pub host: Option<String>,
    /// Endpoint path override for the chat API.
    pub endpoint: Option<String>,
    /// Model identifier to use with this provider, overriding the default.
    pub model: Option<String>,
    /// Keep-alive hint passed to providers that support it (e.g. `"15m"`).
    pub keep_alive: Option<String>,
    /// GPU offload hint (layer count) for providers that expose one.
    pub gpu_layers: Option<u32>,
    /// Whether tether should try to start the server when unreachable.
    pub auto_start: Option<bool>,
}

/// Numeric limits for context and tool handling.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct LimitsConfig {
    /// Context window size in tokens.
    pub context_size: Option<usize>,
    /// Maximum completion tokens per request.
    pub max_tokens: Option<u64>,
    /// Streaming rounds allowed after tool batches within one turn.
    pub max_iterations: Option<usize>,
    /// Tool batches allowed within one turn.
    pub max_tool_depth: Option<usize>,
    /// Iteration cap for indexing agents.
    pub indexing_max_iterations: Option<usize>,
    /// Largest file (bytes) the file tools will read.
    pub max_file_size: Option<u64>,
    /// Maximum tool-result chunks kept verbatim in history.
    pub max_chunks_in_history: Option<usize>,
}

/// Feature flags.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FeatureFlags {
    /// Request model reasoning where the provider supports it.
    pub thinking: Option<bool>,
    /// Show raw tool-call JSON in the transcript.
    pub show_tool_json: Option<bool>,
    /// Enable the similarity store for compressed-context recall.
    pub graph_rag_enabled: Option<bool>,
    /// Request reasoning during indexing runs.
    pub indexing_enable_thinking: Option<bool>,
}

/// Terminal presentation preferences. The core never reads these; they are
/// passed through to the UI layer.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DisplayConfig {
    /// Accent color name.
    pub accent: Option<String>,
    /// Preferred editor command for review workflows.
    pub editor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: None,
            model: None,
            embedding_model: default_embedding_model(),
            indexing_model: None,
            system_prompt: default_system_prompt(),
            provider: ProviderConfig::default(),
            limits: LimitsConfig::default(),
            features: FeatureFlags::default(),
            permissions: PolicyConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}
