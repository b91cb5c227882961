//! Agent definitions and execution.
//!
//! An agent is a named sub-conversation recipe: a system prompt plus
//! capabilities (tool filter, iteration cap, optional model/temperature
//! overrides). Built-ins are always present; additional definitions are
//! loaded from the config directory at startup.

mod executor;
mod registry;

pub use executor::{run_agent, AgentDeps, AgentProgress, AgentResult, AgentStats};
pub use registry::AgentRegistry;

use serde::Deserialize;

/// Capabilities granted to one agent.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentCapabilities {
    /// Tool names the agent may call; everything else is filtered out.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// Streaming rounds the agent may use.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Model override; the session model is used when absent.
    #[serde(default)]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Context-size override for providers that accept one.
    #[serde(default)]
    pub context_size: Option<usize>,
    /// Request model reasoning where supported.
    #[serde(default)]
    pub thinking: bool,
    /// How many recent outer messages to inject into the private history.
    /// Zero keeps the outer conversation invisible.
    #[serde(default)]
    pub inject_recent_messages: usize,
}

fn default_max_iterations() -> usize {
    10
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            allowed_tools: Vec::new(),
            max_iterations: default_max_iterations(),
            model: None,
            temperature: None,
            context_size: None,
            thinking: false,
            inject_recent_messages: 0,
        }
    }
}

/// One agent definition, built-in or loaded from disk.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}
