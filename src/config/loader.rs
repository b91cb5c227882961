//! File loading and merging for tether configuration.

use anyhow::{Context, Result};
use std::fs;

use super::types::Config;

impl Config {
    /// Loads the global config from `~/.config/tether/config.toml`.
    ///
    /// If no config file exists, creates one with sensible defaults and
    /// returns it.
    pub(super) fn load_global() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            let default_toml = format!(
                r#"default_provider = "{}"

[provider.ollama]
host = "{}"

[provider.lmstudio]
host = "{}"
"#,
                crate::constants::DEFAULT_PROVIDER,
                crate::constants::OLLAMA_DEFAULT_BASE_URL,
                crate::constants::LMSTUDIO_DEFAULT_BASE_URL,
            );
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, &default_toml)
                .with_context(|| format!("Failed to write default config to {:?}", path))?;
            let config: Config = toml::from_str(&default_toml)
                .with_context(|| "Failed to parse default config".to_string())?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {:?}", path))?;
        Ok(config)
    }

    /// Look for tether.toml in current dir, then walk up to git root.
    pub(super) fn load_project() -> Result<Option<Config>> {
        let mut dir = std::env::current_dir()?;
        loop {
            let candidate = dir.join(crate::constants::PROJECT_CONFIG_FILENAME);
            if candidate.exists() {
                let contents = fs::read_to_string(&candidate)?;
                let config: Config = toml::from_str(&contents)?;
                return Ok(Some(config));
            }
            // Stop at git root or filesystem root
            if dir.join(".git").exists() || !dir.pop() {
                break;
            }
        }
        Ok(None)
    }

    /// Merge project config over global config.
    /// Project values win when present.
    pub(super) fn merge(global: Config, project: Config) -> Config {
        Config {
            default_provider: project.default_provider.or(global.default_provider),
            model: project.model.or(global.model),
            embedding_model: if project.embedding_model != super::types::default_embedding_model() {
                project.embedding_model
            } else {
                global.embedding_model
            },
            indexing_model: project.indexing_model.or(global.indexing_model),
            system_prompt: project.system_prompt.or(global.system_prompt),
            provider: super::types::ProviderConfig {
                ollama: project.provider.ollama.or(global.provider.ollama),
                lmstudio: project.provider.lmstudio.or(global.provider.lmstudio),
            },
            limits: super::types::LimitsConfig {
                context_size: project.limits.context_size.or(global.limits.context_size),
                max_tokens: project.limits.max_tokens.or(global.limits.max_tokens),
                max_iterations: project
                    .limits
                    .max_iterations
                    .or(global.limits.max_iterations),
                max_tool_depth: project
                    .limits
                    .max_tool_depth
                    .or(global.limits.max_tool_depth),
                indexing_max_iterations: project
                    .limits
                    .indexing_max_iterations
                    .or(global.limits.indexing_max_iterations),
                max_file_size: project.limits.max_file_size.or(global.limits.max_file_size),
                max_chunks_in_history: project
                    .limits
                    .max_chunks_in_history
                    .or(global.limits.max_chunks_in_history),
            },
            features: super::types::FeatureFlags {
                thinking: project.features.thinking.or(global.features.thinking),
                show_tool_json: project
                    .features
                    .show_tool_json
                    .or(global.features.show_tool_json),
                graph_rag_enabled: project
                    .features
                    .graph_rag_enabled
                    .or(global.features.graph_rag_enabled),
                indexing_enable_thinking: project
                    .features
                    .indexing_enable_thinking
                    .or(global.features.indexing_enable_thinking),
            },
            permissions: if project.permissions.is_empty() {
                global.permissions
            } else {
                project.permissions
            },
            display: super::types::DisplayConfig {
                accent: project.display.accent.or(global.display.accent),
                editor: project.display.editor.or(global.display.editor),
            },
        }
    }
}
