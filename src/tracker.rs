//! Per-session context tracking.
//!
//! Single-writer (the orchestrator). Tracks which files the session has
//! read, which line ranges it modified, the current todo list, and a
//! running token estimate for the message history. The estimate is updated
//! incrementally at append time and recomputed wholesale only when
//! compression rewrites the history.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::tokens;
use crate::tools::ToolResult;

/// Status of a single todo entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

/// One tracked todo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: u64,
    pub content: String,
    pub status: TodoStatus,
}

impl std::fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
        };
        write!(f, "{}", label)
    }
}

/// Session-scoped workflow state.
#[derive(Debug)]
pub struct ContextTracker {
    read_files: BTreeSet<String>,
    modified: BTreeMap<String, Vec<(usize, usize)>>,
    todos: Vec<TodoItem>,
    estimated_tokens: usize,
}

impl Default for ContextTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTracker {
    pub fn new() -> Self {
        Self {
            read_files: BTreeSet::new(),
            modified: BTreeMap::new(),
            todos: Vec::new(),
            // Matches the conversation framing in the history estimator so
            // incremental and recomputed totals agree.
            estimated_tokens: tokens::CONVERSATION_OVERHEAD,
        }
    }

    /// Fold a newly appended message into the running token estimate.
    ///
    /// Display-only messages never reach the model and are excluded.
    pub fn on_message_appended(&mut self, msg: &Message) {
        if msg.display_only {
            return;
        }
        self.estimated_tokens += tokens::estimate_message(msg);
    }

    /// Fold streamed deltas into the estimate for the current assistant
    /// message without re-walking the history.
    pub fn on_streaming_delta(&mut self, delta: &str) {
        self.estimated_tokens += tokens::count_tokens(delta);
    }

    /// Record workflow state from a finished tool call.
    pub fn observe_tool_result(&mut self, tool_name: &str, args: &str, result: &ToolResult) {
        if !result.success {
            return;
        }
        let parsed_args: Option<serde_json::Value> = serde_json::from_str(args).ok();
        let path_arg = parsed_args
            .as_ref()
            .and_then(|a| a.get("path"))
            .and_then(|p| p.as_str())
            .map(str::to_string);

        match tool_name {
            "read_file" => {
                if let Some(path) = path_arg {
                    self.record_read(path);
                }
            }
            "write_file" | "edit" => {
                if let Some(path) = path_arg {
                    let range = result
                        .data
                        .as_ref()
                        .and_then(|d| d.get("lines_changed"))
                        .and_then(|r| r.as_array())
                        .and_then(|r| {
                            let start = r.first()?.as_u64()? as usize;
                            let end = r.get(1)?.as_u64()? as usize;
                            Some((start, end))
                        })
                        .unwrap_or((1, 1));
                    self.record_modification(path, range);
                }
            }
            "update_todos" => {
                if let Some(todos) = result
                    .data
                    .as_ref()
                    .and_then(|d| d.get("todos"))
                    .and_then(|t| serde_json::from_value::<Vec<TodoItem>>(t.clone()).ok())
                {
                    self.set_todos(todos);
                }
            }
            _ => {}
        }
    }

    pub fn record_read(&mut self, path: String) {
        self.read_files.insert(path);
    }

    pub fn record_modification(&mut self, path: String, range: (usize, usize)) {
        self.modified.entry(path).or_default().push(range);
    }

    /// Mirror the todo set produced by the todo tool.
    pub fn set_todos(&mut self, todos: Vec<TodoItem>) {
        self.todos = todos;
    }

    pub fn read_files(&self) -> impl Iterator<Item = &str> {
        self.read_files.iter().map(String::as_str)
    }

    pub fn modifications(&self) -> &BTreeMap<String, Vec<(usize, usize)>> {
        &self.modified
    }

    pub fn todos(&self) -> &[TodoItem] {
        &self.todos
    }

    pub fn estimated_tokens(&self) -> usize {
        self.estimated_tokens
    }

    /// Whether the history has outgrown its share of the context window.
    pub fn needs_compression(&self, max_context: usize) -> bool {
        self.estimated_tokens as f64
            > crate::constants::COMPRESSION_TRIGGER_RATIO * max_context as f64
    }

    /// Recompute the estimate from scratch after compression rewrote the
    /// history. The estimate strictly decreases across a successful commit.
    pub fn recompute(&mut self, messages: &[Message]) {
        self.estimated_tokens = tokens::estimate_history(messages);
    }
}
