//! Tool-call delta accumulation for the OpenAI-compatible path.
//!
//! LM Studio streams tool calls as incremental deltas: the first chunk for
//! a call carries its id and name, later chunks append argument-string
//! fragments, and fragments for different calls interleave. Pieces are
//! keyed by the server-assigned call index and assembled into complete
//! [`ToolCall`]s when the stream finishes with reason `tool_calls`.
//!
//! Ollama delivers complete calls in one chunk and bypasses this entirely;
//! after accumulation the batch shape downstream is identical either way.

use std::collections::BTreeMap;

use crate::message::ToolCall;

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

/// Accumulates interleaved tool-call deltas by call index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    // BTreeMap keeps declaration order when draining.
    calls: BTreeMap<u32, PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one delta into the call at `index`.
    pub fn push(
        &mut self,
        index: u32,
        id: Option<&str>,
        name: Option<&str>,
        arguments_fragment: Option<&str>,
    ) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id {
            call.id.get_or_insert_with(|| id.to_string());
        }
        if let Some(name) = name {
            call.name.get_or_insert_with(|| name.to_string());
        }
        if let Some(fragment) = arguments_fragment {
            call.arguments.push_str(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Drain the accumulated calls as one batch, in index order.
    ///
    /// Calls that never received a name are dropped; a missing id gets a
    /// synthetic one (some servers omit ids). Empty argument buffers become
    /// the empty JSON object so validation sees an object either way.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.calls)
            .into_values()
            .filter_map(|partial| {
                let name = partial.name?;
                let id = partial
                    .id
                    .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
                let arguments = if partial.arguments.is_empty() {
                    "{}".to_string()
                } else {
                    partial.arguments
                };
                Some(ToolCall {
                    id,
                    name,
                    arguments,
                })
            })
            .collect()
    }
}
