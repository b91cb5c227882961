//! Environment variable substitution and accessor helpers.

use super::types::{Config, ProviderEntry};

impl Config {
    /// Resolve {env:VAR_NAME} patterns in string fields.
    pub(super) fn resolve_substitutions(&mut self) {
        if let Some(ref mut m) = self.model {
            *m = Self::resolve_str(m);
        }
        if let Some(ref mut sp) = self.system_prompt {
            *sp = Self::resolve_str(sp);
        }
        if let Some(ref mut dp) = self.default_provider {
            *dp = Self::resolve_str(dp);
        }
        Self::resolve_provider_entry(&mut self.provider.ollama);
        Self::resolve_provider_entry(&mut self.provider.lmstudio);
    }

    /// Resolves `{env:VAR}` patterns in a provider entry's `host` and `endpoint`.
    fn resolve_provider_entry(entry: &mut Option<ProviderEntry>) {
        if let Some(ref mut e) = entry {
            if let Some(ref mut host) = e.host {
                *host = Self::resolve_str(host);
            }
            if let Some(ref mut endpoint) = e.endpoint {
                *endpoint = Self::resolve_str(endpoint);
            }
        }
    }

    /// Replace {env:VAR} with the environment variable value.
    fn resolve_str(s: &str) -> String {
        let mut result = s.to_string();
        while let Some(start) = result.find("{env:") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 5..start + end];
                let value = std::env::var(var_name).unwrap_or_default();
                result = format!(
                    "{}{}{}",
                    &result[..start],
                    value,
                    &result[start + end + 1..]
                );
            } else {
                break;
            }
        }
        result
    }

    /// Get the configured default provider name, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Get the model name from config, stripping provider prefix if present.
    pub fn model_name(&self) -> Option<String> {
        let m = self.model.as_deref()?;
        // If model contains slash, extract just the model part
        if let Some((_prov, model)) = m.split_once('/') {
            Some(model.to_string())
        } else {
            Some(m.to_string())
        }
    }

    /// Connection entry for the named provider, if configured.
    pub fn provider_entry(&self, provider: &str) -> Option<&ProviderEntry> {
        match provider {
            "ollama" => self.provider.ollama.as_ref(),
            "lmstudio" => self.provider.lmstudio.as_ref(),
            _ => None,
        }
    }

    /// Context window size in tokens.
    pub fn context_size(&self) -> usize {
        self.limits
            .context_size
            .unwrap_or(crate::constants::DEFAULT_CONTEXT_SIZE)
    }

    /// Maximum completion tokens per request.
    pub fn max_tokens(&self) -> u64 {
        self.limits.max_tokens.unwrap_or(crate::constants::MAX_TOKENS)
    }

    /// Streaming rounds allowed after tool batches within one turn.
    pub fn max_iterations(&self) -> usize {
        self.limits
            .max_iterations
            .unwrap_or(crate::constants::MAX_ITERATIONS)
    }

    /// Tool batches allowed within one turn.
    pub fn max_tool_depth(&self) -> usize {
        self.limits
            .max_tool_depth
            .unwrap_or(crate::constants::MAX_TOOL_DEPTH)
    }

    /// Whether model reasoning is requested where supported.
    pub fn thinking_enabled(&self) -> bool {
        self.features.thinking.unwrap_or(false)
    }

    /// Whether the similarity store records compressed context.
    pub fn graph_rag_enabled(&self) -> bool {
        self.features.graph_rag_enabled.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::types::Config;

    #[test]
    fn env_substitution_replaces_placeholder() {
        std::env::set_var("TETHER_TEST_HOST", "http://box:9999");
        let mut config: Config = toml::from_str(
            r#"
[provider.ollama]
host = "{env:TETHER_TEST_HOST}"
"#,
        )
        .unwrap();
        config.resolve_substitutions();
        assert_eq!(
            config.provider.ollama.unwrap().host.as_deref(),
            Some("http://box:9999")
        );
    }

    #[test]
    fn limits_fall_back_to_defaults() {
        let config = Config::default();
        assert_eq!(config.context_size(), crate::constants::DEFAULT_CONTEXT_SIZE);
        assert_eq!(config.max_tool_depth(), crate::constants::MAX_TOOL_DEPTH);
    }
}
