//! The main conversational loop.
//!
//! The orchestrator owns the message history and every piece of mutable
//! session state: the tool executor, the context tracker, the permission
//! manager, the registries, and the chunk pipe of the in-flight stream.
//! One turn interleaves streaming rounds with tool batches until the model
//! stops requesting tools or a cap is hit; compression runs only in the
//! quiet gap between turns. The UI talks to the session through commands
//! in and abstract events out.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::agents::AgentRegistry;
use crate::compression::compress_history;
use crate::config::Config;
use crate::executor::{PermissionMode, TickResult, ToolExecutor};
use crate::injector;
use crate::message::{Message, Role, ToolCall};
use crate::permissions::{AuditEntry, PermissionManager};
use crate::provider::{chunk_pipe, ChatOptions, ChunkReceiver, Provider, StreamChunk};
use crate::tokens;
use crate::tools::{ToolContext, ToolRegistry};
use crate::tracker::ContextTracker;
use crate::vectors::VectorIndex;

/// Commands the UI sends into the session.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    SubmitUserMessage(String),
    DeliverPermission(PermissionMode),
    Cancel,
    OpenModal(ModalKind),
    CloseModal,
    Shutdown,
}

/// Which modal surface is in front of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalKind {
    Config,
    AgentBuilder,
    Help,
}

/// Abstract events the core emits for the UI to render.
#[derive(Debug, Clone)]
pub enum UiEvent {
    MessageAppended(usize),
    MessageUpdated(usize),
    PermissionPrompt {
        tool_name: String,
        args: String,
        reason: String,
    },
    Progress {
        kind: &'static str,
        text: String,
    },
    RedrawRequested,
    Error(String),
}

/// The rendering side of the session boundary.
///
/// `request_permission` blocks the turn until the user answers; the REPL
/// reads a key, tests script the responses.
pub trait UiSink {
    fn event(&mut self, event: UiEvent);
    fn request_permission(&mut self, tool_name: &str, args: &str, reason: &str) -> PermissionMode;
}

struct StreamHandle {
    rx: ChunkReceiver,
    cancel: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

/// Owns the conversation and drives one turn at a time.
pub struct Orchestrator {
    provider: Provider,
    model: String,
    config: Config,
    workspace_root: PathBuf,
    history: Vec<Message>,
    tracker: ContextTracker,
    executor: ToolExecutor,
    permissions: PermissionManager,
    tools: ToolRegistry,
    agents: AgentRegistry,
    index: VectorIndex,
    stream: Option<StreamHandle>,
    pending_batch: Vec<ToolCall>,
    iteration_count: usize,
    tool_call_depth: usize,
    active_modal: Option<ModalKind>,
    compressing: bool,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        provider: Provider,
        model: String,
        workspace_root: PathBuf,
        agents: AgentRegistry,
    ) -> Self {
        let permissions = PermissionManager::new(config.permissions.clone());
        let tools = ToolRegistry::with_builtins(workspace_root.clone());
        let index = VectorIndex::new(config.embedding_model.clone());

        let mut orchestrator = Self {
            provider,
            model,
            config,
            workspace_root,
            history: Vec::new(),
            tracker: ContextTracker::new(),
            executor: ToolExecutor::new(),
            permissions,
            tools,
            agents,
            index,
            stream: None,
            pending_batch: Vec::new(),
            iteration_count: 0,
            tool_call_depth: 0,
            active_modal: None,
            compressing: false,
        };
        if let Some(prompt) = orchestrator.config.system_prompt.clone() {
            let msg = Message::system(prompt);
            orchestrator.tracker.on_message_appended(&msg);
            orchestrator.history.push(msg);
        }
        orchestrator
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tracker(&self) -> &ContextTracker {
        &self.tracker
    }

    pub fn agents(&self) -> &AgentRegistry {
        &self.agents
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.permissions.audit_entries()
    }

    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn tool_call_depth(&self) -> usize {
        self.tool_call_depth
    }

    pub fn modal(&self) -> Option<ModalKind> {
        self.active_modal
    }

    /// Dispatch one UI command. Returns `false` on shutdown.
    pub async fn handle_command(
        &mut self,
        command: SessionCommand,
        sink: &mut dyn UiSink,
    ) -> Result<bool> {
        match command {
            SessionCommand::SubmitUserMessage(text) => {
                if self.active_modal.is_some() {
                    sink.event(UiEvent::Progress {
                        kind: "modal",
                        text: "input routed to the open modal".to_string(),
                    });
                    return Ok(true);
                }
                self.run_turn(&text, sink).await?;
            }
            SessionCommand::DeliverPermission(mode) => self.deliver_permission(mode),
            SessionCommand::Cancel => self.cancel(sink).await,
            SessionCommand::OpenModal(kind) => {
                self.active_modal = Some(kind);
                sink.event(UiEvent::RedrawRequested);
            }
            SessionCommand::CloseModal => {
                self.active_modal = None;
                sink.event(UiEvent::RedrawRequested);
            }
            SessionCommand::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    /// Run one full turn: user message in, streaming rounds and tool
    /// batches until the model rests or a cap trips, then the compression
    /// checkpoint.
    pub async fn run_turn(&mut self, text: &str, sink: &mut dyn UiSink) -> Result<()> {
        self.iteration_count = 0;
        self.tool_call_depth = 0;
        self.append(Message::user(text), sink);
        self.begin_streaming_round(sink);

        loop {
            if self.executor.has_pending_work() {
                let tick = self.executor.tick(
                    &self.tools,
                    &self.permissions,
                    self.iteration_count,
                    self.config.max_iterations(),
                );
                match tick {
                    TickResult::NoAction => {}
                    TickResult::RenderRequested => {
                        self.service_executor(sink).await;
                        continue;
                    }
                    TickResult::ShowPermissionPrompt => {
                        self.prompt_permission(sink);
                        continue;
                    }
                    TickResult::IterationComplete => {
                        self.executor.finish();
                        self.iteration_count += 1;
                        self.begin_streaming_round(sink);
                        continue;
                    }
                    TickResult::IterationLimitReached => {
                        self.executor.finish();
                        let notice = format!(
                            "Stopped after {} tool iterations; raise limits.max_iterations to continue.",
                            self.config.max_iterations()
                        );
                        self.append(Message::display_only(&notice), sink);
                        sink.event(UiEvent::Error(notice));
                        continue;
                    }
                }
            }

            if self.stream.is_some() {
                self.drain_stream(sink).await;
                continue;
            }

            break;
        }

        self.compression_checkpoint(sink).await;
        Ok(())
    }

    /// Forward the user's permission choice to the state machine.
    pub fn deliver_permission(&mut self, mode: PermissionMode) {
        self.executor
            .set_permission_response(mode, &self.tools, &self.permissions);
    }

    /// Abort the in-flight stream and discard the partial assistant message.
    pub async fn cancel(&mut self, sink: &mut dyn UiSink) {
        let Some(mut stream) = self.stream.take() else {
            return;
        };
        stream.cancel.store(true, Ordering::Relaxed);
        // Drain until the worker's terminal chunk so it never blocks on a
        // full pipe.
        while let Some(chunk) = stream.rx.recv().await {
            if matches!(chunk, StreamChunk::Done(_)) {
                break;
            }
        }
        let _ = stream.worker.await;

        if self
            .history
            .last()
            .is_some_and(|m| m.role == Role::Assistant && !m.display_only)
        {
            self.history.pop();
            self.tracker.recompute(&self.history);
        }
        self.pending_batch.clear();
        sink.event(UiEvent::Progress {
            kind: "cancelled",
            text: "generation cancelled".to_string(),
        });
        sink.event(UiEvent::RedrawRequested);
    }

    /// Manual compression entry point (the `/compress` command).
    pub async fn compress_now(&mut self, sink: &mut dyn UiSink) {
        self.run_compression(sink).await;
    }

    /// Search the similarity store for compressed-away context.
    pub async fn recall(&self, query: &str, limit: usize) -> Result<Vec<(String, f32)>> {
        let hits = self.index.search(&self.provider, query, limit).await?;
        Ok(hits
            .into_iter()
            .map(|h| (h.text.to_string(), h.score))
            .collect())
    }

    /// Current token usage against the configured context window.
    pub fn token_usage(&self) -> (usize, usize) {
        (self.tracker.estimated_tokens(), self.config.context_size())
    }

    fn append(&mut self, msg: Message, sink: &mut dyn UiSink) -> usize {
        self.history.push(msg);
        let idx = self.history.len() - 1;
        self.tracker.on_message_appended(&self.history[idx]);
        sink.event(UiEvent::MessageAppended(idx));
        idx
    }

    /// Start one streaming round: build the outbound request (preamble
    /// included, display-only messages excluded), spawn the worker, and
    /// append the empty assistant placeholder.
    fn begin_streaming_round(&mut self, sink: &mut dyn UiSink) {
        let last_user = self
            .history
            .iter()
            .rev()
            .find(|m| m.role == Role::User && !m.display_only)
            .map(|m| m.content.clone());

        // Preamble goes after the leading system run, before the
        // conversation proper. It is rebuilt per request and never stored.
        let mut outbound: Vec<Message> = Vec::with_capacity(self.history.len() + 1);
        let leading = self
            .history
            .iter()
            .take_while(|m| m.role == Role::System)
            .count();
        outbound.extend_from_slice(&self.history[..leading]);
        if let Some(preamble) = injector::build_preamble(&self.tracker, last_user.as_deref()) {
            outbound.push(preamble);
        }
        outbound.extend_from_slice(&self.history[leading..]);

        let options = ChatOptions {
            enable_thinking: self.config.thinking_enabled(),
            response_format: None,
            tools: self.tools.list_schemas(),
            keep_alive: self.provider.default_keep_alive(),
            context_size: Some(self.config.context_size()),
            max_tokens: Some(self.config.max_tokens()),
            temperature: None,
            repeat_penalty: None,
        };

        let (tx, rx) = chunk_pipe();
        let cancel = Arc::new(AtomicBool::new(false));
        let worker = self
            .provider
            .chat_stream(&self.model, &outbound, options, tx, Arc::clone(&cancel));
        self.stream = Some(StreamHandle { rx, cancel, worker });
        self.pending_batch.clear();

        self.append(Message::streaming_placeholder(), sink);
    }

    /// Pull chunks from the pipe into the current assistant message until
    /// the terminal chunk arrives.
    async fn drain_stream(&mut self, sink: &mut dyn UiSink) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let current = self.history.len() - 1;

        let end = loop {
            match stream.rx.recv().await {
                Some(StreamChunk::Thinking(delta)) => {
                    self.history[current].push_thinking(&delta);
                    self.tracker.on_streaming_delta(&delta);
                    sink.event(UiEvent::MessageUpdated(current));
                }
                Some(StreamChunk::Content(delta)) => {
                    self.history[current].push_content(&delta);
                    self.tracker.on_streaming_delta(&delta);
                    sink.event(UiEvent::MessageUpdated(current));
                }
                Some(StreamChunk::ToolCalls(calls)) => {
                    self.pending_batch.extend(calls);
                }
                Some(StreamChunk::Done(end)) => break end,
                // Worker died without its terminal chunk; treat as fault.
                None => break crate::provider::StreamEnd::failed("stream worker exited early"),
            }
        };

        if let Some(stream) = self.stream.take() {
            let _ = stream.worker.await;
        }

        if let Some(error) = end.error {
            self.pending_batch.clear();
            let notice = format!("provider error: {}", error);
            self.append(Message::display_only(&notice), sink);
            sink.event(UiEvent::Error(notice));
            return;
        }

        if self.pending_batch.is_empty() {
            sink.event(UiEvent::MessageUpdated(current));
            return;
        }

        let batch = std::mem::take(&mut self.pending_batch);
        if self.tool_call_depth >= self.config.max_tool_depth() {
            let notice = format!(
                "Tool batch ignored: depth limit {} reached this turn.",
                self.config.max_tool_depth()
            );
            self.append(Message::display_only(&notice), sink);
            sink.event(UiEvent::Error(notice));
            return;
        }

        for call in &batch {
            self.tracker.on_streaming_delta(&call.name);
            self.tracker.on_streaming_delta(&call.arguments);
        }
        self.history[current].tool_calls = batch.clone();
        sink.event(UiEvent::MessageUpdated(current));
        self.tool_call_depth += 1;
        self.executor.start_execution(batch);
    }

    /// Emit the permission prompt and feed the answer back to the machine.
    fn prompt_permission(&mut self, sink: &mut dyn UiSink) {
        let Some(call) = self.executor.current_call() else {
            return;
        };
        let (name, args) = (call.name.clone(), call.arguments.clone());
        let reason = "tool requires approval";
        sink.event(UiEvent::PermissionPrompt {
            tool_name: name.clone(),
            args: args.clone(),
            reason: reason.to_string(),
        });
        let mode = sink.request_permission(&name, &args, reason);
        self.deliver_permission(mode);
    }

    /// Perform the action the executor cleared: run the current call or
    /// append its denial result, then advance the machine.
    async fn service_executor(&mut self, sink: &mut dyn UiSink) {
        let Some(call) = self.executor.current_call().cloned() else {
            self.executor.advance_after_execution();
            return;
        };

        let result = match self.executor.state() {
            crate::executor::ExecutorState::Executing => {
                let ctx = ToolContext {
                    provider: &self.provider,
                    permissions: &self.permissions,
                    agents: &self.agents,
                    tools: &self.tools,
                    config: &self.config,
                    workspace_root: &self.workspace_root,
                };
                self.tools.execute(&call.name, &call.arguments, &ctx).await
            }
            _ => crate::tools::ToolResult::permission_denied("User denied permission"),
        };

        self.tracker
            .observe_tool_result(&call.name, &call.arguments, &result);

        // Transcript line for the user, then the model-facing result.
        let icon = if result.success { "\u{2713}" } else { "\u{2717}" };
        let mut summary = format!(
            "{} {} ({} ms)",
            icon, call.name, result.metadata.execution_time_ms
        );
        if !result.success {
            summary.push_str(&format!(" [{:?}]", result.error_type));
        }
        if self.config.features.show_tool_json.unwrap_or(false) {
            summary.push_str(&format!(" {}", call.arguments));
        }
        self.append(Message::display_only(&summary), sink);
        self.append(Message::tool_result(call.id.clone(), result.to_wire()), sink);

        self.executor.advance_after_execution();
        sink.event(UiEvent::RedrawRequested);
    }

    /// Between-turns compression checkpoint.
    async fn compression_checkpoint(&mut self, sink: &mut dyn UiSink) {
        if self.stream.is_some() || !self.executor.is_idle() || self.compressing {
            return;
        }
        if !self.tracker.needs_compression(self.config.context_size()) {
            return;
        }
        self.run_compression(sink).await;
    }

    async fn run_compression(&mut self, sink: &mut dyn UiSink) {
        if self.compressing {
            return;
        }
        self.compressing = true;
        let outcome = compress_history(
            &mut self.history,
            &self.provider,
            &self.permissions,
            &self.agents,
            &self.config,
            &self.workspace_root,
            &self.model,
            self.config.context_size(),
            Some(&mut self.index),
        )
        .await;
        self.compressing = false;

        match outcome {
            Ok(stats) => {
                let before = self.tracker.estimated_tokens();
                self.tracker.recompute(&self.history);
                sink.event(UiEvent::Progress {
                    kind: "compression",
                    text: format!(
                        "compressed {} messages into {} ({} -> {} tokens, {} protected)",
                        stats.original_count,
                        stats.compressed_count,
                        tokens::format_number(before),
                        tokens::format_number(self.tracker.estimated_tokens()),
                        stats.messages_protected,
                    ),
                });
                sink.event(UiEvent::RedrawRequested);
            }
            Err(e) => {
                log::warn!("compression failed, continuing without it: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{StreamChunk, StreamEnd};
    use std::collections::VecDeque;

    struct TestSink {
        events: Vec<UiEvent>,
        responses: VecDeque<PermissionMode>,
        prompts_seen: usize,
    }

    impl TestSink {
        fn new() -> Self {
            Self {
                events: Vec::new(),
                responses: VecDeque::new(),
                prompts_seen: 0,
            }
        }

        fn answering(responses: Vec<PermissionMode>) -> Self {
            Self {
                responses: responses.into(),
                ..Self::new()
            }
        }
    }

    impl UiSink for TestSink {
        fn event(&mut self, event: UiEvent) {
            self.events.push(event);
        }

        fn request_permission(&mut self, _tool: &str, _args: &str, _reason: &str) -> PermissionMode {
            self.prompts_seen += 1;
            self.responses.pop_front().unwrap_or(PermissionMode::AllowOnce)
        }
    }

    fn orchestrator(provider: Provider, config: Config) -> Orchestrator {
        Orchestrator::new(
            config,
            provider,
            "test-model".to_string(),
            PathBuf::from("."),
            AgentRegistry::with_builtins(),
        )
    }

    fn visible(history: &[Message]) -> Vec<&Message> {
        history.iter().filter(|m| !m.display_only).collect()
    }

    #[tokio::test]
    async fn simple_exchange_appends_user_and_assistant() {
        let provider = Provider::scripted(vec![vec![
            StreamChunk::Content("Hi".into()),
            StreamChunk::Content("!".into()),
            StreamChunk::Done(StreamEnd::ok()),
        ]]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::new();

        orch.run_turn("hello", &mut sink).await.unwrap();

        let msgs = visible(orch.history());
        // system prompt, user, assistant
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[1].role, Role::User);
        assert_eq!(msgs[1].content, "hello");
        assert_eq!(msgs[2].role, Role::Assistant);
        assert_eq!(msgs[2].content, "Hi!");
        assert_eq!(orch.iteration_count(), 0);
        assert_eq!(orch.tool_call_depth(), 0);
        assert_eq!(sink.prompts_seen, 0);
    }

    #[tokio::test]
    async fn tool_round_trip_produces_paired_messages() {
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
                StreamChunk::Content("Here is the manifest.".into()),
                StreamChunk::Done(StreamEnd::ok()),
            ],
        ]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::new();

        orch.run_turn("read the manifest", &mut sink).await.unwrap();

        let msgs = visible(orch.history());
        // system, user, assistant+calls, tool, assistant
        assert_eq!(msgs.len(), 5);
        assert_eq!(msgs[2].tool_calls.len(), 1);
        assert_eq!(msgs[3].role, Role::Tool);
        assert_eq!(msgs[3].tool_call_id.as_deref(), Some("c1"));
        assert!(msgs[3].content.contains("\"success\":true"));
        assert_eq!(msgs[4].content, "Here is the manifest.");
        assert_eq!(orch.iteration_count(), 1);
        assert_eq!(orch.tool_call_depth(), 1);
        assert_eq!(sink.prompts_seen, 0);
    }

    #[tokio::test]
    async fn denied_tool_yields_denial_result_and_audit_entry() {
        let provider = Provider::scripted(vec![
            vec![
                StreamChunk::ToolCalls(vec![ToolCall {
                    id: "c1".into(),
                    name: "write_file".into(),
                    arguments: r#"{"path":"bar","content":""}"#.into(),
                }]),
                StreamChunk::Done(StreamEnd::ok()),
            ],
            vec![
                StreamChunk::Content("Understood, leaving the file alone.".into()),
                StreamChunk::Done(StreamEnd::ok()),
            ],
        ]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::answering(vec![PermissionMode::Deny]);

        orch.run_turn("delete bar", &mut sink).await.unwrap();

        let msgs = visible(orch.history());
        assert_eq!(msgs[3].role, Role::Tool);
        assert_eq!(msgs[3].tool_call_id.as_deref(), Some("c1"));
        assert!(msgs[3].content.contains("permission_denied"));
        assert!(msgs[3].content.contains("User denied permission"));
        assert_eq!(msgs[4].content, "Understood, leaving the file alone.");

        let denials: Vec<_> = orch
            .audit_entries()
            .into_iter()
            .filter(|e| e.outcome == crate::permissions::AuditOutcome::DeniedByUser)
            .collect();
        assert_eq!(denials.len(), 1);
        assert_eq!(sink.prompts_seen, 1);
    }

    #[tokio::test]
    async fn iteration_cap_stops_the_turn_after_two_batches() {
        let looping_round = || {
            vec![
                StreamChunk::ToolCalls(vec![ToolCall {
                    id: "c".into(),
                    name: "read_file".into(),
                    arguments: r#"{"path":"Cargo.toml"}"#.into(),
                }]),
                StreamChunk::Done(StreamEnd::ok()),
            ]
        };
        let provider = Provider::scripted(vec![
            looping_round(),
            looping_round(),
            looping_round(),
            looping_round(),
        ]);
        let mut config = Config::default();
        config.limits.max_iterations = Some(2);
        let mut orch = orchestrator(provider, config);
        let mut sink = TestSink::new();

        orch.run_turn("loop forever", &mut sink).await.unwrap();

        // Exactly two executed batches reached the history.
        let tool_msgs = orch
            .history()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .count();
        assert_eq!(tool_msgs, 2);
        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, UiEvent::Error(text) if text.contains("tool iterations"))));
    }

    #[tokio::test]
    async fn provider_fault_surfaces_error_and_returns_to_idle() {
        let provider = Provider::scripted(vec![vec![
            StreamChunk::Content("partial".into()),
            StreamChunk::Done(StreamEnd::failed("connection refused")),
        ]]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::new();

        orch.run_turn("hello", &mut sink).await.unwrap();

        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, UiEvent::Error(text) if text.contains("connection refused"))));
        // The partial assistant content is kept, and the session is idle.
        let msgs = visible(orch.history());
        assert_eq!(msgs.last().unwrap().content, "partial");
    }

    #[tokio::test]
    async fn cancel_discards_partial_assistant_message() {
        let provider = Provider::scripted(vec![vec![
            StreamChunk::Content("will be discarded".into()),
            StreamChunk::Done(StreamEnd::ok()),
        ]]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::new();

        let before = orch.history().len();
        orch.history.push(Message::user("hi"));
        orch.begin_streaming_round(&mut sink);
        orch.cancel(&mut sink).await;

        assert_eq!(orch.history().len(), before + 1);
        assert!(orch.stream.is_none());
    }

    #[tokio::test]
    async fn tool_depth_cap_blocks_the_handoff() {
        let provider = Provider::scripted(vec![vec![
            StreamChunk::ToolCalls(vec![ToolCall {
                id: "c1".into(),
                name: "read_file".into(),
                arguments: r#"{"path":"Cargo.toml"}"#.into(),
            }]),
            StreamChunk::Done(StreamEnd::ok()),
        ]]);
        let mut config = Config::default();
        config.limits.max_tool_depth = Some(0);
        let mut orch = orchestrator(provider, config);
        let mut sink = TestSink::new();

        orch.run_turn("go", &mut sink).await.unwrap();

        assert_eq!(
            orch.history().iter().filter(|m| m.role == Role::Tool).count(),
            0
        );
        assert!(sink
            .events
            .iter()
            .any(|e| matches!(e, UiEvent::Error(text) if text.contains("depth limit"))));
    }

    #[tokio::test]
    async fn token_estimate_matches_recomputed_history() {
        let provider = Provider::scripted(vec![vec![
            StreamChunk::Content("short answer".into()),
            StreamChunk::Done(StreamEnd::ok()),
        ]]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::new();
        orch.run_turn("hello", &mut sink).await.unwrap();

        let incremental = orch.tracker().estimated_tokens();
        let recomputed = tokens::estimate_history(orch.history());
        assert_eq!(incremental, recomputed);
    }

    #[tokio::test]
    async fn modal_blocks_user_messages() {
        let provider = Provider::scripted(vec![]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::new();

        orch.handle_command(SessionCommand::OpenModal(ModalKind::Help), &mut sink)
            .await
            .unwrap();
        let before = orch.history().len();
        orch.handle_command(
            SessionCommand::SubmitUserMessage("ignored".into()),
            &mut sink,
        )
        .await
        .unwrap();
        assert_eq!(orch.history().len(), before);

        orch.handle_command(SessionCommand::CloseModal, &mut sink)
            .await
            .unwrap();
        assert!(orch.modal().is_none());
    }

    #[tokio::test]
    async fn shutdown_command_ends_the_session() {
        let provider = Provider::scripted(vec![]);
        let mut orch = orchestrator(provider, Config::default());
        let mut sink = TestSink::new();
        let keep_going = orch
            .handle_command(SessionCommand::Shutdown, &mut sink)
            .await
            .unwrap();
        assert!(!keep_going);
    }
}
