//! Model listing for the `models` subcommand.

use anyhow::{Context, Result};
use serde::Deserialize;

use super::kind::ProviderKind;
use crate::config::Config;

/// Fetch the model names a provider currently serves.
pub async fn list_models(kind: ProviderKind, config: &Config) -> Result<Vec<String>> {
    let host = config
        .provider_entry(kind.id())
        .and_then(|e| e.host.clone())
        .unwrap_or_else(|| match kind {
            ProviderKind::Ollama => crate::constants::OLLAMA_DEFAULT_BASE_URL.to_string(),
            ProviderKind::LmStudio => crate::constants::LMSTUDIO_DEFAULT_BASE_URL.to_string(),
        });
    let host = host.trim_end_matches('/');

    match kind {
        ProviderKind::Ollama => {
            #[derive(Deserialize)]
            struct TagsResponse {
                #[serde(default)]
                models: Vec<TagEntry>,
            }
            #[derive(Deserialize)]
            struct TagEntry {
                name: String,
            }
            let response: TagsResponse = reqwest::get(format!("{host}/api/tags"))
                .await
                .with_context(|| format!("Could not reach Ollama at {host}"))?
                .json()
                .await
                .context("Unexpected response from /api/tags")?;
            Ok(response.models.into_iter().map(|m| m.name).collect())
        }
        ProviderKind::LmStudio => {
            #[derive(Deserialize)]
            struct ModelsResponse {
                #[serde(default)]
                data: Vec<ModelEntry>,
            }
            #[derive(Deserialize)]
            struct ModelEntry {
                id: String,
            }
            let response: ModelsResponse = reqwest::get(format!("{host}/v1/models"))
                .await
                .with_context(|| format!("Could not reach LM Studio at {host}"))?
                .json()
                .await
                .context("Unexpected response from /v1/models")?;
            Ok(response.data.into_iter().map(|m| m.id).collect())
        }
    }
}
