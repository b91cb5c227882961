//! Message types for tether's conversation history.
//!
//! Provides a structured [`Message`] type with a [`Role`] enum representing
//! conversation turns, plus [`ToolCall`] requests attached to assistant
//! messages. These are tether's internal types, converted to provider wire
//! formats when sent to the LLM.

use serde::{Deserialize, Serialize};

/// A single message in a conversation.
///
/// The orchestrator owns every message buffer. Content and thinking grow
/// only while the message is the current streaming assistant message;
/// otherwise messages are immutable until compression replaces them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Model reasoning text, populated only when thinking is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    /// Tool-call requests attached to an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Id of the call a tool-role message answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Shown to the user but never sent to the model.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub display_only: bool,
    /// Marks a compressed surrogate that replaced older messages.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub compressed: bool,
}

/// The role of a message sender in the conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single tool-call request emitted by the model.
///
/// Multiple calls may be attached to one assistant message; they execute in
/// declaration order within that batch. `arguments` is the raw JSON object
/// the model produced, kept as text until validation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl Message {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            thinking: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
            display_only: false,
            compressed: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    /// An empty assistant placeholder appended at streaming start.
    pub fn streaming_placeholder() -> Self {
        Self::text(Role::Assistant, "")
    }

    /// A tool-role message answering the call with the given id.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::text(Role::Tool, content)
        }
    }

    /// A message rendered to the user but excluded from outbound requests.
    pub fn display_only(content: impl Into<String>) -> Self {
        Self {
            display_only: true,
            ..Self::text(Role::Assistant, content)
        }
    }

    /// A compressed surrogate carrying the sentinel-prefixed summary.
    pub fn surrogate(role: Role, summary: impl Into<String>) -> Self {
        Self {
            compressed: true,
            ..Self::text(
                role,
                format!("{}{}", crate::constants::COMPRESSED_SENTINEL, summary.into()),
            )
        }
    }

    /// Appends streamed content to the message body.
    pub fn push_content(&mut self, delta: &str) {
        self.content.push_str(delta);
    }

    /// Appends streamed reasoning text to the thinking buffer.
    pub fn push_thinking(&mut self, delta: &str) {
        self.thinking.get_or_insert_with(String::new).push_str(delta);
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "you"),
            Role::Assistant => write!(f, "tether"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surrogate_carries_sentinel_and_flag() {
        let msg = Message::surrogate(Role::User, "asked about the parser");
        assert!(msg.compressed);
        assert!(msg
            .content
            .starts_with(crate::constants::COMPRESSED_SENTINEL));
    }

    #[test]
    fn streaming_appends_grow_buffers() {
        let mut msg = Message::streaming_placeholder();
        msg.push_content("Hi");
        msg.push_content("!");
        msg.push_thinking("let me see");
        assert_eq!(msg.content, "Hi!");
        assert_eq!(msg.thinking.as_deref(), Some("let me see"));
    }

    #[test]
    fn tool_result_links_call_id() {
        let msg = Message::tool_result("c1", "{}");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c1"));
    }
}
