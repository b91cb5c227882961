//! Provider and model resolution.
//!
//! Resolves which provider and model to use based on CLI flags, config
//! file, and hardcoded defaults. Supports `provider/model` shorthand.

use anyhow::Result;

use super::kind::{default_model_for, ProviderKind};
use crate::config::Config;
use crate::constants::DEFAULT_PROVIDER;

/// Resolved provider + model pair.
#[derive(Debug, Clone)]
pub struct ModelSelection {
    pub provider: ProviderKind,
    pub model: String,
}

/// Resolve which provider and model to use.
/// Priority: CLI flags > config > defaults.
///
/// Accepts these formats:
///   --model ollama/qwen2.5-coder:7b  (provider/model shorthand, only when --provider is omitted)
///   --provider lmstudio --model qwen2.5-7b-instruct
///   --provider ollama  (uses provider's default model)
///   (nothing)  (uses config, then hardcoded default)
pub fn resolve_model(
    cli_provider: Option<&str>,
    cli_model: Option<&str>,
    config: &Config,
) -> Result<ModelSelection> {
    // If --model contains a slash AND no explicit --provider, parse as provider/model shorthand
    if cli_provider.is_none() {
        if let Some(model_str) = cli_model {
            if let Some((prov, model)) = model_str.split_once('/') {
                if let Ok(provider) = ProviderKind::parse(prov) {
                    return Ok(ModelSelection {
                        provider,
                        model: model.to_string(),
                    });
                }
            }
        }
    }

    // Resolve provider
    let provider_str = cli_provider
        .or(config.provider_name())
        .unwrap_or(DEFAULT_PROVIDER);
    let provider = ProviderKind::parse(provider_str)?;

    // Resolve model: CLI flag > per-provider entry > global config > provider default
    let model = cli_model
        .map(String::from)
        .or_else(|| {
            config
                .provider_entry(provider.id())
                .and_then(|e| e.model.clone())
        })
        .or_else(|| config.model_name())
        .unwrap_or_else(|| default_model_for(&provider).to_string());

    Ok(ModelSelection { provider, model })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_splits_provider_and_model() {
        let config = Config::default();
        let sel = resolve_model(None, Some("lmstudio/my-model"), &config).unwrap();
        assert_eq!(sel.provider, ProviderKind::LmStudio);
        assert_eq!(sel.model, "my-model");
    }

    #[test]
    fn defaults_apply_when_nothing_is_configured() {
        let config = Config::default();
        let sel = resolve_model(None, None, &config).unwrap();
        assert_eq!(sel.provider, ProviderKind::Ollama);
        assert_eq!(sel.model, crate::constants::OLLAMA_DEFAULT_MODEL);
    }

    #[test]
    fn explicit_provider_keeps_slash_in_model_name() {
        let config = Config::default();
        let sel = resolve_model(Some("lmstudio"), Some("org/weird-name"), &config).unwrap();
        assert_eq!(sel.provider, ProviderKind::LmStudio);
        assert_eq!(sel.model, "org/weird-name");
    }
}
