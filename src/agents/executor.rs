//! Sub-agent execution.
//!
//! Runs one agent definition as an isolated conversation: private history,
//! filtered tool list, same provider and permission manager as the outer
//! session. The caller blocks until the agent returns; each streaming
//! round reuses the worker-and-pipe pattern of the main loop.

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::message::{Message, ToolCall};
use crate::permissions::{AuditOutcome, PermissionManager};
use crate::provider::{chunk_pipe, ChatOptions, Provider, StreamChunk};
use crate::tools::{ToolContext, ToolRegistry};

use super::{AgentDefinition, AgentRegistry};

/// Orchestrator-owned dependencies a sub-agent run borrows.
pub struct AgentDeps<'a> {
    pub provider: &'a Provider,
    pub tools: &'a ToolRegistry,
    pub permissions: &'a PermissionManager,
    pub agents: &'a AgentRegistry,
    pub config: &'a Config,
    pub workspace_root: &'a Path,
    /// Session model, used unless the definition overrides it.
    pub model: &'a str,
    /// Recent outer messages, injected only when the definition asks.
    pub recent_context: &'a [Message],
}

/// Progress events surfaced to an optional callback.
#[derive(Debug, Clone, Copy)]
pub enum AgentProgress<'a> {
    Thinking(&'a str),
    Content(&'a str),
    ToolCall(&'a str),
    Iteration(usize),
    Complete,
    Embedding(&'a str),
    Storage(&'a str),
}

/// Counters reported with every result.
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    pub iterations_used: usize,
    pub tool_calls_made: usize,
    pub elapsed_ms: u64,
}

/// Outcome of one agent run.
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub success: bool,
    pub data: String,
    pub error_message: Option<String>,
    pub stats: AgentStats,
    pub thinking: Option<String>,
}

impl AgentResult {
    fn failed(message: impl Into<String>, stats: AgentStats, thinking: Option<String>) -> Self {
        Self {
            success: false,
            data: String::new(),
            error_message: Some(message.into()),
            stats,
            thinking,
        }
    }
}

type ProgressFn<'a> = &'a mut (dyn FnMut(AgentProgress<'_>) + Send);

/// Run one agent to completion.
///
/// The loop streams a round, executes any requested tools through the
/// registry under the shared permission manager, and repeats until the
/// model answers without tool calls, the iteration cap is hit, or the
/// provider faults.
pub async fn run_agent(
    def: &AgentDefinition,
    task: &str,
    deps: &AgentDeps<'_>,
    mut progress: Option<ProgressFn<'_>>,
) -> AgentResult {
    let started = Instant::now();
    let mut stats = AgentStats::default();
    let mut thinking_log = String::new();

    let mut history = vec![Message::system(def.system_prompt.clone())];
    let inject = def.capabilities.inject_recent_messages;
    if inject > 0 {
        let skip = deps.recent_context.len().saturating_sub(inject);
        for msg in &deps.recent_context[skip..] {
            history.push(msg.clone());
        }
    }
    history.push(Message::user(task));

    let model = def.capabilities.model.as_deref().unwrap_or(deps.model);
    let tool_schemas = deps.tools.schemas_for(&def.capabilities.allowed_tools);
    let ctx = ToolContext {
        provider: deps.provider,
        permissions: deps.permissions,
        agents: deps.agents,
        tools: deps.tools,
        config: deps.config,
        workspace_root: deps.workspace_root,
    };

    for iteration in 0..def.capabilities.max_iterations {
        if let Some(ref mut cb) = progress {
            cb(AgentProgress::Iteration(iteration));
        }

        let options = ChatOptions {
            enable_thinking: def.capabilities.thinking,
            tools: tool_schemas.clone(),
            context_size: def.capabilities.context_size,
            max_tokens: Some(deps.config.max_tokens()),
            temperature: def.capabilities.temperature,
            ..ChatOptions::default()
        };

        let (tx, mut rx) = chunk_pipe();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker = deps
            .provider
            .chat_stream(model, &history, options, tx, cancel);

        let mut content = String::new();
        let mut thinking = String::new();
        let mut batch: Vec<ToolCall> = Vec::new();
        let mut fault: Option<String> = None;

        while let Some(chunk) = rx.recv().await {
            match chunk {
                StreamChunk::Thinking(delta) => {
                    if let Some(ref mut cb) = progress {
                        cb(AgentProgress::Thinking(&delta));
                    }
                    thinking.push_str(&delta);
                }
                StreamChunk::Content(delta) => {
                    if let Some(ref mut cb) = progress {
                        cb(AgentProgress::Content(&delta));
                    }
                    content.push_str(&delta);
                }
                StreamChunk::ToolCalls(calls) => batch.extend(calls),
                StreamChunk::Done(end) => {
                    fault = end.error;
                    break;
                }
            }
        }
        let _ = worker.await;
        stats.iterations_used = iteration + 1;
        if !thinking.is_empty() {
            thinking_log.push_str(&thinking);
        }

        if let Some(error) = fault {
            stats.elapsed_ms = started.elapsed().as_millis() as u64;
            return AgentResult::failed(error, stats, nonempty(thinking_log));
        }

        let mut assistant = Message::assistant(content.clone());
        if !thinking.is_empty() {
            assistant.thinking = Some(thinking);
        }
        assistant.tool_calls = batch.clone();
        history.push(assistant);

        if batch.is_empty() {
            if let Some(ref mut cb) = progress {
                cb(AgentProgress::Complete);
            }
            stats.elapsed_ms = started.elapsed().as_millis() as u64;
            return AgentResult {
                success: true,
                data: content,
                error_message: None,
                stats,
                thinking: nonempty(thinking_log),
            };
        }

        for call in batch {
            if let Some(ref mut cb) = progress {
                cb(AgentProgress::ToolCall(&call.name));
            }
            let result =
                execute_agent_call(&call, &def.capabilities.allowed_tools, deps, &ctx).await;
            stats.tool_calls_made += 1;
            history.push(Message::tool_result(call.id.clone(), result));
        }
    }

    stats.elapsed_ms = started.elapsed().as_millis() as u64;
    AgentResult::failed(
        format!(
            "agent {} hit its iteration limit ({})",
            def.name, def.capabilities.max_iterations
        ),
        stats,
        nonempty(thinking_log),
    )
}

/// Execute one sub-agent tool call under the shared permission manager.
///
/// Only tools in the agent's allowed set may run, whatever the model
/// asked for. Policy denials block; decisions that would prompt the user
/// are auto-granted for the sub-agent run and audited.
async fn execute_agent_call(
    call: &ToolCall,
    allowed: &[String],
    deps: &AgentDeps<'_>,
    ctx: &ToolContext<'_>,
) -> String {
    if !allowed.iter().any(|name| name == &call.name) {
        deps.permissions.audit(
            &call.name,
            "tool not in agent's allowed set",
            AuditOutcome::FailedValidation,
            false,
        );
        return crate::tools::ToolResult::failure(
            crate::tools::ErrorKind::NotFound,
            format!("tool not available to this agent: {}", call.name),
        )
        .to_wire();
    }

    let Some(tool) = deps.tools.lookup(&call.name) else {
        deps.permissions.audit(
            &call.name,
            "unknown tool",
            AuditOutcome::FailedValidation,
            false,
        );
        return crate::tools::ToolResult::failure(
            crate::tools::ErrorKind::NotFound,
            format!("unknown tool: {}", call.name),
        )
        .to_wire();
    };

    let metadata = tool.metadata();
    let decision = deps
        .permissions
        .evaluate(&call.name, &call.arguments, &metadata);
    if !decision.allowed && !decision.ask_user {
        deps.permissions.audit(
            &call.name,
            decision.reason,
            AuditOutcome::DeniedByPolicy,
            false,
        );
        return crate::tools::ToolResult::permission_denied(format!(
            "Policy denied {}: {}",
            call.name, decision.reason
        ))
        .to_wire();
    }
    // Sub-agents cannot reach the user prompt path without deadlocking the
    // turn; ask-decisions are granted within the run and audited.
    let reason = if decision.ask_user {
        "sub-agent scope auto-grant"
    } else {
        decision.reason
    };
    deps.permissions
        .audit(&call.name, reason, AuditOutcome::AutoApproved, true);

    deps.tools
        .execute(&call.name, &call.arguments, ctx)
        .await
        .to_wire()
}

fn nonempty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentCapabilities;
    use crate::permissions::PolicyConfig;
    use crate::provider::StreamEnd;
    use std::path::PathBuf;

    fn curator() -> AgentDefinition {
        AgentDefinition {
            name: "file_curator".into(),
            description: "curates".into(),
            system_prompt: "curate".into(),
            capabilities: AgentCapabilities {
                allowed_tools: vec!["read_file".into()],
                max_iterations: 3,
                ..AgentCapabilities::default()
            },
        }
    }

    struct Fixture {
        tools: ToolRegistry,
        permissions: PermissionManager,
        agents: AgentRegistry,
        config: Config,
        root: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tools: ToolRegistry::with_builtins(PathBuf::from(".")),
                permissions: PermissionManager::new(PolicyConfig::default()),
                agents: AgentRegistry::with_builtins(),
                config: Config::default(),
                root: PathBuf::from("."),
            }
        }

        fn deps<'a>(&'a self, provider: &'a Provider) -> AgentDeps<'a> {
            AgentDeps {
                provider,
                tools: &self.tools,
                permissions: &self.permissions,
                agents: &self.agents,
                config: &self.config,
                workspace_root: &self.root,
                model: "test-model",
                recent_context: &[],
            }
        }
    }

    #[tokio::test]
    async fn plain_answer_completes_in_one_iteration() {
        let fixture = Fixture::new();
        let provider = Provider::scripted(vec![vec![
            StreamChunk::Content("done".into()),
            StreamChunk::Done(StreamEnd::ok()),
        ]]);
        let result = run_agent(&curator(), "summarize", &fixture.deps(&provider), None).await;
        assert!(result.success);
        assert_eq!(result.data, "done");
        assert_eq!(result.stats.iterations_used, 1);
        assert_eq!(result.stats.tool_calls_made, 0);
    }

    #[tokio::test]
    async fn tool_round_trip_feeds_result_back() {
        let fixture = Fixture::new();
        let provider = Provider::scripted(vec![
            vec![
                StreamChunk::ToolCalls(vec![ToolCall {
                    id: "c1".into(),
                    name: "read_file".into(),
                    arguments: r#"{"path":"Cargo.toml"}"#.into(),
                }]),
                StreamChunk::Done(StreamEnd::ok()),
            ],
            vec![
                StreamChunk::Content("summarized".into()),
                StreamChunk::Done(StreamEnd::ok()),
            ],
        ]);
        let result = run_agent(&curator(), "summarize", &fixture.deps(&provider), None).await;
        assert!(result.success);
        assert_eq!(result.stats.tool_calls_made, 1);
        assert_eq!(result.stats.iterations_used, 2);
        // The ask-path auto-grant and the safe-tool approval both audit.
        assert!(fixture.permissions.audit_len() >= 1);
    }

    #[tokio::test]
    async fn provider_fault_fails_the_run() {
        let fixture = Fixture::new();
        let provider =
            Provider::scripted(vec![vec![StreamChunk::Done(StreamEnd::failed(
                "connection refused",
            ))]]);
        let result = run_agent(&curator(), "summarize", &fixture.deps(&provider), None).await;
        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn empty_tool_list_still_runs_to_iteration_limit() {
        let fixture = Fixture::new();
        let mut def = curator();
        def.capabilities.allowed_tools.clear();
        def.capabilities.max_iterations = 2;
        // The model keeps asking for a registered tool, with arguments
        // that would pass its schema, so only the allowed-set gate can
        // stop the call from executing.
        let script: Vec<Vec<StreamChunk>> = (0..2)
            .map(|i| {
                vec![
                    StreamChunk::ToolCalls(vec![ToolCall {
                        id: format!("c{i}"),
                        name: "read_file".into(),
                        arguments: r#"{"path":"Cargo.toml"}"#.into(),
                    }]),
                    StreamChunk::Done(StreamEnd::ok()),
                ]
            })
            .collect();
        let provider = Provider::scripted(script);
        let result = run_agent(&def, "go", &fixture.deps(&provider), None).await;
        assert!(!result.success);
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .contains("iteration limit"));
        assert_eq!(result.stats.iterations_used, 2);

        // Neither call was executed: both were refused at the allowed-set
        // gate and audited, with no approval entries at all.
        let entries = fixture.permissions.audit_entries();
        assert_eq!(entries.len(), 2);
        for entry in &entries {
            assert_eq!(entry.outcome, AuditOutcome::FailedValidation);
            assert_eq!(entry.reason, "tool not in agent's allowed set");
            assert!(!entry.executed);
        }
    }

    #[tokio::test]
    async fn tools_outside_the_allowed_set_are_refused() {
        let fixture = Fixture::new();
        // The curator may read files but asks to write one anyway.
        let provider = Provider::scripted(vec![
            vec![
                StreamChunk::ToolCalls(vec![ToolCall {
                    id: "c1".into(),
                    name: "write_file".into(),
                    arguments: r#"{"path":"notes.txt","content":"hi"}"#.into(),
                }]),
                StreamChunk::Done(StreamEnd::ok()),
            ],
            vec![
                StreamChunk::Content("giving up".into()),
                StreamChunk::Done(StreamEnd::ok()),
            ],
        ]);
        let result = run_agent(&curator(), "summarize", &fixture.deps(&provider), None).await;
        assert!(result.success);
        // The refusal surfaced to the model as a result, not an execution.
        assert!(!std::path::Path::new("notes.txt").exists());
        let entries = fixture.permissions.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, AuditOutcome::FailedValidation);
        assert!(!entries[0].executed);
    }
}
