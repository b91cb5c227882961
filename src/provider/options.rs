//! Chat request options and capability masking.

use super::capabilities::ProviderCapabilities;

/// Structured output request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
}

/// Options carried by one chat request.
///
/// Callers set whatever they want; [`ChatOptions::masked_for`] strips
/// anything the target provider cannot honor so the wire request is
/// indistinguishable from one that never set the option.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub enable_thinking: bool,
    pub response_format: Option<ResponseFormat>,
    /// Tool schemas in the `{type:"function",function:{...}}` form.
    pub tools: Vec<serde_json::Value>,
    pub keep_alive: Option<String>,
    pub context_size: Option<usize>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub repeat_penalty: Option<f64>,
}

impl ChatOptions {
    /// Mask off options the provider does not support.
    pub fn masked_for(mut self, caps: &ProviderCapabilities) -> Self {
        if !caps.supports_thinking {
            self.enable_thinking = false;
        }
        if !caps.supports_keep_alive {
            self.keep_alive = None;
        }
        if !caps.supports_context_size_param {
            self.context_size = None;
        }
        if !caps.supports_tools {
            self.tools.clear();
        }
        if !caps.supports_json_mode {
            self.response_format = None;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::capabilities::capabilities_for;
    use crate::provider::kind::ProviderKind;

    fn full_options() -> ChatOptions {
        ChatOptions {
            enable_thinking: true,
            response_format: Some(ResponseFormat::Json),
            tools: vec![serde_json::json!({"type":"function"})],
            keep_alive: Some("15m".into()),
            context_size: Some(8192),
            max_tokens: Some(1024),
            temperature: Some(0.2),
            repeat_penalty: Some(1.1),
        }
    }

    #[test]
    fn masking_strips_unsupported_options() {
        let caps = capabilities_for(ProviderKind::LmStudio);
        let masked = full_options().masked_for(caps);
        assert!(!masked.enable_thinking);
        assert!(masked.keep_alive.is_none());
        assert!(masked.context_size.is_none());
        // Supported options survive.
        assert_eq!(masked.max_tokens, Some(1024));
        assert!(!masked.tools.is_empty());
    }

    #[test]
    fn masking_is_identity_when_everything_is_supported() {
        let caps = capabilities_for(ProviderKind::Ollama);
        let masked = full_options().masked_for(caps);
        assert!(masked.enable_thinking);
        assert_eq!(masked.keep_alive.as_deref(), Some("15m"));
        assert_eq!(masked.context_size, Some(8192));
    }
}
