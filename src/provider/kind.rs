//! Provider kind enumeration and default model mapping.
//!
//! Defines [`ProviderKind`] which identifies which local LLM backend to use,
//! and [`default_model_for`] which returns the default model for each.

use anyhow::{anyhow, Result};

/// Identifies which local LLM provider to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Ollama (native chat API, NDJSON streaming).
    Ollama,
    /// LM Studio (OpenAI-compatible API, SSE streaming).
    LmStudio,
}

/// Every supported provider, in registry order.
pub const ALL_PROVIDERS: [ProviderKind; 2] = [ProviderKind::Ollama, ProviderKind::LmStudio];

impl ProviderKind {
    /// Parses a provider name string into a [`ProviderKind`].
    ///
    /// Matching is case-insensitive. Returns an error for unknown providers.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "lmstudio" | "lm-studio" | "lm_studio" => Ok(Self::LmStudio),
            other => Err(anyhow!(
                "Unknown provider: {other}. Supported: ollama, lmstudio"
            )),
        }
    }

    /// The identifier used in config files and CLI flags.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Returns the default model identifier for a given provider.
pub fn default_model_for(provider: &ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Ollama => crate::constants::OLLAMA_DEFAULT_MODEL,
        ProviderKind::LmStudio => crate::constants::LMSTUDIO_DEFAULT_MODEL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_aliases() {
        assert_eq!(ProviderKind::parse("Ollama").unwrap(), ProviderKind::Ollama);
        assert_eq!(
            ProviderKind::parse("lm-studio").unwrap(),
            ProviderKind::LmStudio
        );
        assert!(ProviderKind::parse("openai").is_err());
    }
}
