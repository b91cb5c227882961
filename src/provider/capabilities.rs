//! Static capability records for each provider.
//!
//! Capabilities drive option masking (unsupported request features are
//! stripped before dispatch) and let the configuration UI rebuild its
//! per-provider field list without provider-specific code.

use super::kind::{ProviderKind, ALL_PROVIDERS};

/// The widget type a config field renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Toggle,
    Number,
}

/// Descriptor for one provider-specific configuration field.
#[derive(Debug, Clone, Copy)]
pub struct ConfigField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub help: &'static str,
    pub default_value: &'static str,
}

/// Static capability record for one provider.
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    pub display_name: &'static str,
    pub default_port: u16,
    pub supports_thinking: bool,
    pub supports_keep_alive: bool,
    pub supports_tools: bool,
    pub supports_json_mode: bool,
    pub supports_streaming: bool,
    pub supports_embeddings: bool,
    pub supports_context_size_param: bool,
    pub config_warnings: &'static [&'static str],
    pub config_fields: &'static [ConfigField],
}

static OLLAMA_FIELDS: &[ConfigField] = &[
    ConfigField {
        key: "host",
        label: "Host",
        kind: FieldKind::Text,
        help: "Base URL of the Ollama server",
        default_value: "http://localhost:11434",
    },
    ConfigField {
        key: "keep_alive",
        label: "Keep-alive",
        kind: FieldKind::Text,
        help: "How long the model stays loaded after a request (e.g. 15m)",
        default_value: "5m",
    },
    ConfigField {
        key: "gpu_layers",
        label: "GPU layers",
        kind: FieldKind::Number,
        help: "Layers to offload to the GPU; blank lets the server decide",
        default_value: "",
    },
    ConfigField {
        key: "auto_start",
        label: "Auto-start server",
        kind: FieldKind::Toggle,
        help: "Run `ollama serve` when the server is unreachable",
        default_value: "false",
    },
];

static LMSTUDIO_FIELDS: &[ConfigField] = &[
    ConfigField {
        key: "host",
        label: "Host",
        kind: FieldKind::Text,
        help: "Base URL of the LM Studio server",
        default_value: "http://localhost:1234",
    },
    ConfigField {
        key: "endpoint",
        label: "Endpoint",
        kind: FieldKind::Text,
        help: "Chat completions path",
        default_value: "/v1/chat/completions",
    },
];

static OLLAMA_CAPS: ProviderCapabilities = ProviderCapabilities {
    display_name: "Ollama",
    default_port: 11434,
    supports_thinking: true,
    supports_keep_alive: true,
    supports_tools: true,
    supports_json_mode: true,
    supports_streaming: true,
    supports_embeddings: true,
    supports_context_size_param: true,
    config_warnings: &[],
    config_fields: OLLAMA_FIELDS,
};

static LMSTUDIO_CAPS: ProviderCapabilities = ProviderCapabilities {
    display_name: "LM Studio",
    default_port: 1234,
    supports_thinking: false,
    supports_keep_alive: false,
    supports_tools: true,
    supports_json_mode: true,
    supports_streaming: true,
    supports_embeddings: true,
    supports_context_size_param: false,
    config_warnings: &[
        "Context length is set in the LM Studio UI, not per request",
        "Model reasoning is not exposed over the OpenAI-compatible API",
    ],
    config_fields: LMSTUDIO_FIELDS,
};

/// Capability record for a provider.
pub fn capabilities_for(kind: ProviderKind) -> &'static ProviderCapabilities {
    match kind {
        ProviderKind::Ollama => &OLLAMA_CAPS,
        ProviderKind::LmStudio => &LMSTUDIO_CAPS,
    }
}

/// Look a provider up by its config identifier.
pub fn lookup(name: &str) -> Option<ProviderKind> {
    ProviderKind::parse(name).ok()
}

/// Iterate every registered provider with its capabilities.
pub fn all() -> impl Iterator<Item = (ProviderKind, &'static ProviderCapabilities)> {
    ALL_PROVIDERS.into_iter().map(|k| (k, capabilities_for(k)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_enumerates_every_provider() {
        let names: Vec<&str> = all().map(|(_, c)| c.display_name).collect();
        assert_eq!(names, vec!["Ollama", "LM Studio"]);
    }

    #[test]
    fn lookup_matches_kind_ids() {
        for (kind, _) in all() {
            assert_eq!(lookup(kind.id()), Some(kind));
        }
        assert_eq!(lookup("vllm"), None);
    }

    #[test]
    fn lmstudio_masks_thinking_and_keep_alive() {
        let caps = capabilities_for(ProviderKind::LmStudio);
        assert!(!caps.supports_thinking);
        assert!(!caps.supports_keep_alive);
        assert!(!caps.supports_context_size_param);
        let caps = capabilities_for(ProviderKind::Ollama);
        assert!(caps.supports_thinking);
        assert!(caps.supports_keep_alive);
    }
}
