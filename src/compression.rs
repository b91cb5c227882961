//! LLM-driven history compression.
//!
//! When the tracker reports the history has outgrown its budget, the
//! orchestrator invokes [`compress_history`] between turns. Older messages
//! (everything in front of the protected tail of recent user+assistant
//! pairs) are staged as candidates, the built-in compressor agent
//! summarizes them through four staging tools, and the staged run is
//! committed as a single splice. Candidates the agent never covered get a
//! deterministic truncation surrogate, and if the per-message surrogates
//! still exceed the target the whole run collapses into one summary
//! message. History is only mutated at the commit point; any earlier
//! failure leaves it untouched.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::agents::{run_agent, AgentDeps, AgentRegistry};
use crate::config::Config;
use crate::message::{Message, Role};
use crate::permissions::{PermissionManager, PermissionMetadata, RiskLevel, ToolScope};
use crate::provider::Provider;
use crate::tokens;
use crate::tools::{ErrorKind, Tool, ToolContext, ToolRegistry, ToolResult};
use crate::vectors::VectorIndex;

/// Statistics returned from one compression run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressionStats {
    /// Candidate messages replaced.
    pub original_count: usize,
    /// Surrogate messages written in their place.
    pub compressed_count: usize,
    /// How many of the candidates were tool results.
    pub tool_results_compressed: usize,
    /// Messages left untouched in the protected tail.
    pub messages_protected: usize,
}

/// Surrogate content budget for one original role.
fn role_budget(role: Role) -> usize {
    match role {
        Role::Assistant => crate::constants::SURROGATE_ASSISTANT_TOKENS,
        _ => crate::constants::SURROGATE_USER_TOKENS,
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    role: Role,
    is_tool: bool,
    original_tokens: usize,
    text: String,
    summary: Option<String>,
}

/// Staged state shared between the engine and the compressor agent's tools.
#[derive(Debug, Default)]
pub struct CompressionWorkspace {
    candidates: Vec<Candidate>,
    target_tokens: usize,
    protected_tokens: usize,
}

impl CompressionWorkspace {
    /// Estimated history size if the staged run were committed now.
    fn staged_tokens(&self) -> usize {
        let staged: usize = self
            .candidates
            .iter()
            .map(|c| match &c.summary {
                Some(summary) => surrogate_tokens(summary),
                None => c.original_tokens,
            })
            .sum();
        self.protected_tokens + staged
    }

    fn unsummarized_ids(&self) -> Vec<usize> {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.summary.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    fn stage(&mut self, id: usize, summary: &str, tool_result: bool) -> Result<(), String> {
        let Some(candidate) = self.candidates.get_mut(id) else {
            return Err(format!("no candidate with id {id}"));
        };
        if candidate.is_tool != tool_result {
            return Err(if tool_result {
                format!("candidate {id} is not a tool result")
            } else {
                format!("candidate {id} is a tool result; use compress_tool_result")
            });
        }
        let budget = role_budget(candidate.role);
        candidate.summary = Some(tokens::truncate_to_tokens(summary.trim(), budget));
        Ok(())
    }
}

/// Tokens one surrogate message contributes, sentinel and framing included.
fn surrogate_tokens(summary: &str) -> usize {
    tokens::estimate_message(&Message::surrogate(Role::Assistant, summary))
}

/// Compress everything in front of the protected tail.
///
/// Returns zeroed statistics without touching history when there is
/// nothing to compress. Returns an error (history untouched) when the
/// compressor agent's provider faults.
#[allow(clippy::too_many_arguments)]
pub async fn compress_history(
    history: &mut Vec<Message>,
    provider: &Provider,
    permissions: &PermissionManager,
    agents: &AgentRegistry,
    config: &Config,
    workspace_root: &Path,
    model: &str,
    max_context: usize,
    index: Option<&mut VectorIndex>,
) -> Result<CompressionStats> {
    let start = leading_system_len(history);
    let boundary = protected_boundary(history);
    if boundary <= start {
        return Ok(CompressionStats {
            messages_protected: history.len().saturating_sub(start),
            ..CompressionStats::default()
        });
    }

    let target_tokens =
        (crate::constants::COMPRESSION_TARGET_RATIO * max_context as f64) as usize;
    let protected_tokens = tokens::estimate_history(&history[..start])
        + tokens::estimate_history(&history[boundary..]);

    let candidates: Vec<Candidate> = history[start..boundary]
        .iter()
        .filter(|m| !m.display_only)
        .map(|m| Candidate {
            role: m.role,
            is_tool: m.role == Role::Tool,
            original_tokens: tokens::estimate_message(m),
            text: m.content.clone(),
            summary: None,
        })
        .collect();
    if candidates.is_empty() {
        return Ok(CompressionStats {
            messages_protected: history.len() - boundary,
            ..CompressionStats::default()
        });
    }

    let workspace = Arc::new(Mutex::new(CompressionWorkspace {
        candidates,
        target_tokens,
        protected_tokens,
    }));

    run_compressor_agent(
        Arc::clone(&workspace),
        provider,
        permissions,
        agents,
        config,
        workspace_root,
        model,
    )
    .await?;

    // Commit: build the surrogate run, then splice once.
    let workspace = Arc::try_unwrap(workspace)
        .map_err(|_| anyhow!("compression workspace still shared"))?
        .into_inner()
        .map_err(|_| anyhow!("compression workspace poisoned"))?;

    let mut stats = CompressionStats {
        original_count: workspace.candidates.len(),
        compressed_count: 0,
        tool_results_compressed: workspace
            .candidates
            .iter()
            .filter(|c| c.is_tool)
            .count(),
        messages_protected: history.len() - boundary,
    };

    let mut surrogates: Vec<Message> = workspace
        .candidates
        .iter()
        .map(|c| {
            let summary = match &c.summary {
                Some(summary) => summary.clone(),
                None => fallback_summary(c),
            };
            // Tool results become assistant-voiced summaries; a bare
            // tool-role message without its call would be malformed.
            let role = match c.role {
                Role::Tool => Role::Assistant,
                role => role,
            };
            Message::surrogate(role, summary)
        })
        .collect();

    let staged: usize = surrogates.iter().map(tokens::estimate_message).sum();
    if workspace.protected_tokens + staged > target_tokens {
        // Per-message surrogates don't fit; collapse the run into one.
        let combined: Vec<String> = surrogates
            .iter()
            .map(|m| {
                m.content
                    .trim_start_matches(crate::constants::COMPRESSED_SENTINEL)
                    .to_string()
            })
            .collect();
        let room = target_tokens
            .saturating_sub(workspace.protected_tokens)
            .saturating_sub(24);
        let summary = tokens::truncate_to_tokens(&combined.join(" "), room.max(8));
        surrogates = vec![Message::surrogate(
            Role::System,
            format!("Earlier conversation summary: {}", summary),
        )];
    }
    stats.compressed_count = surrogates.len();

    let surrogate_texts: Vec<String> = surrogates.iter().map(|m| m.content.clone()).collect();
    history.splice(start..boundary, surrogates);

    // Keep compressed-away context recallable through the similarity store.
    if let Some(index) = index {
        if config.graph_rag_enabled() {
            for text in &surrogate_texts {
                if let Err(e) = index.add(provider, text).await {
                    log::warn!("could not index compression surrogate: {}", e);
                    break;
                }
            }
        }
    }

    Ok(stats)
}

/// Messages at the front of the history that are never candidates (the
/// leading system prompt run).
fn leading_system_len(history: &[Message]) -> usize {
    history
        .iter()
        .take_while(|m| m.role == Role::System && !m.compressed)
        .count()
}

/// Index of the first message in the protected tail: the start of the
/// N-th most recent user+assistant pair.
fn protected_boundary(history: &[Message]) -> usize {
    let mut users_seen = 0;
    for (i, msg) in history.iter().enumerate().rev() {
        if msg.role == Role::User && !msg.display_only {
            users_seen += 1;
            if users_seen == crate::constants::PROTECTED_TAIL_PAIRS {
                return i;
            }
        }
    }
    // Fewer pairs than the tail holds; everything is protected.
    leading_system_len(history)
}

/// Deterministic surrogate for a candidate the agent never covered.
fn fallback_summary(candidate: &Candidate) -> String {
    if candidate.is_tool {
        let digest = match serde_json::from_str::<ToolResult>(&candidate.text) {
            Ok(result) if result.success => format!(
                "tool result ok, {} bytes",
                result.metadata.data_size_bytes
            ),
            Ok(result) => format!(
                "tool result failed ({:?}): {}",
                result.error_type,
                result.error_message.unwrap_or_default()
            ),
            Err(_) => candidate.text.clone(),
        };
        return tokens::truncate_to_tokens(&digest, role_budget(Role::Tool));
    }
    tokens::truncate_to_tokens(&candidate.text, role_budget(candidate.role))
}

/// Run the built-in compressor agent against the staged workspace.
async fn run_compressor_agent(
    workspace: Arc<Mutex<CompressionWorkspace>>,
    provider: &Provider,
    permissions: &PermissionManager,
    agents: &AgentRegistry,
    config: &Config,
    workspace_root: &Path,
    model: &str,
) -> Result<()> {
    let def = agents
        .lookup("compressor")
        .ok_or_else(|| anyhow!("compressor agent not registered"))?;

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(GetCompressionMetadata {
        workspace: Arc::clone(&workspace),
    }));
    registry.register(Box::new(CompressConversationSegment {
        workspace: Arc::clone(&workspace),
    }));
    registry.register(Box::new(CompressToolResult {
        workspace: Arc::clone(&workspace),
    }));
    registry.register(Box::new(VerifyCompressionTarget {
        workspace: Arc::clone(&workspace),
    }));

    let deps = AgentDeps {
        provider,
        tools: &registry,
        permissions,
        agents,
        config,
        workspace_root,
        model,
        recent_context: &[],
    };

    let (candidate_count, target) = {
        let ws = workspace.lock().unwrap();
        (ws.candidates.len(), ws.target_tokens)
    };
    let task = format!(
        "Compress the {} candidate messages so the history fits in {} tokens. \
         Start with get_compression_metadata.",
        candidate_count, target
    );

    let outcome = run_agent(def, &task, &deps, None).await;
    if !outcome.success {
        return Err(anyhow!(
            "compressor agent failed: {}",
            outcome
                .error_message
                .unwrap_or_else(|| "unknown error".to_string())
        ));
    }
    Ok(())
}

fn safe_metadata() -> PermissionMetadata {
    PermissionMetadata {
        scope: ToolScope::Read,
        risk: RiskLevel::Safe,
    }
}

struct GetCompressionMetadata {
    workspace: Arc<Mutex<CompressionWorkspace>>,
}

#[async_trait::async_trait]
impl Tool for GetCompressionMetadata {
    fn name(&self) -> &str {
        "get_compression_metadata"
    }

    fn description(&self) -> &str {
        "List the candidate messages with ids, roles, token counts, and previews."
    }

    fn schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn metadata(&self) -> PermissionMetadata {
        safe_metadata()
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let ws = self.workspace.lock().unwrap();
        let candidates: Vec<Value> = ws
            .candidates
            .iter()
            .enumerate()
            .map(|(id, c)| {
                let preview: String = c.text.chars().take(120).collect();
                json!({
                    "id": id,
                    "role": match c.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                        Role::Tool => "tool",
                    },
                    "tool_result": c.is_tool,
                    "tokens": c.original_tokens,
                    "summarized": c.summary.is_some(),
                    "preview": preview,
                })
            })
            .collect();
        Ok(ToolResult::ok(json!({
            "candidates": candidates,
            "target_tokens": ws.target_tokens,
            "staged_tokens": ws.staged_tokens(),
        })))
    }
}

struct CompressConversationSegment {
    workspace: Arc<Mutex<CompressionWorkspace>>,
}

#[async_trait::async_trait]
impl Tool for CompressConversationSegment {
    fn name(&self) -> &str {
        "compress_conversation_segment"
    }

    fn description(&self) -> &str {
        "Submit a summary for a user or assistant candidate message."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer", "description": "Candidate id"},
                "summary": {"type": "string", "description": "Replacement summary"}
            },
            "required": ["id", "summary"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        safe_metadata()
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: StageInput = serde_json::from_value(input)?;
        let mut ws = self.workspace.lock().unwrap();
        match ws.stage(input.id, &input.summary, false) {
            Ok(()) => Ok(ToolResult::ok(json!({"id": input.id, "staged": true}))),
            Err(reason) => Ok(ToolResult::failure(ErrorKind::ValidationFailed, reason)),
        }
    }
}

struct CompressToolResult {
    workspace: Arc<Mutex<CompressionWorkspace>>,
}

#[async_trait::async_trait]
impl Tool for CompressToolResult {
    fn name(&self) -> &str {
        "compress_tool_result"
    }

    fn description(&self) -> &str {
        "Submit a summary for a tool-result candidate message."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer", "description": "Candidate id"},
                "summary": {"type": "string", "description": "Replacement summary"}
            },
            "required": ["id", "summary"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        safe_metadata()
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: StageInput = serde_json::from_value(input)?;
        let mut ws = self.workspace.lock().unwrap();
        match ws.stage(input.id, &input.summary, true) {
            Ok(()) => Ok(ToolResult::ok(json!({"id": input.id, "staged": true}))),
            Err(reason) => Ok(ToolResult::failure(ErrorKind::ValidationFailed, reason)),
        }
    }
}

struct VerifyCompressionTarget {
    workspace: Arc<Mutex<CompressionWorkspace>>,
}

#[async_trait::async_trait]
impl Tool for VerifyCompressionTarget {
    fn name(&self) -> &str {
        "verify_compression_target"
    }

    fn description(&self) -> &str {
        "Check the staged token estimate against the compression target."
    }

    fn schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    fn metadata(&self) -> PermissionMetadata {
        safe_metadata()
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let ws = self.workspace.lock().unwrap();
        let staged = ws.staged_tokens();
        Ok(ToolResult::ok(json!({
            "staged_tokens": staged,
            "target_tokens": ws.target_tokens,
            "met": staged <= ws.target_tokens,
            "unsummarized_ids": ws.unsummarized_ids(),
        })))
    }
}

#[derive(Deserialize)]
struct StageInput {
    id: usize,
    summary: String,
}
