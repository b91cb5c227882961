//! Todo tool: lets the model keep a working task list.
//!
//! The tool owns the canonical list; each call replaces it wholesale and
//! returns the resulting set, which the orchestrator mirrors into the
//! context tracker.

use std::sync::Mutex;

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolContext, ToolResult};
use crate::permissions::{PermissionMetadata, RiskLevel, ToolScope};
use crate::tracker::{TodoItem, TodoStatus};

pub struct TodoTool {
    state: Mutex<TodoState>,
}

#[derive(Default)]
struct TodoState {
    todos: Vec<TodoItem>,
    next_id: u64,
}

impl TodoTool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TodoState {
                todos: Vec::new(),
                next_id: 1,
            }),
        }
    }
}

#[derive(Deserialize)]
struct TodoInput {
    todos: Vec<TodoEntry>,
}

#[derive(Deserialize)]
struct TodoEntry {
    /// Existing id to preserve; new entries omit it.
    id: Option<u64>,
    content: String,
    status: TodoStatus,
}

#[async_trait::async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "update_todos"
    }

    fn description(&self) -> &str {
        "Replace the session todo list. Pass every todo with its status; omit an id to create a new entry."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "description": "The complete todo list",
                    "items": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "integer", "description": "Existing todo id"},
                            "content": {"type": "string", "description": "What needs doing"},
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "completed"],
                            }
                        },
                        "required": ["content", "status"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        PermissionMetadata {
            scope: ToolScope::Read,
            risk: RiskLevel::Safe,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: TodoInput = serde_json::from_value(input)?;
        let mut state = self.state.lock().unwrap();

        let mut todos = Vec::with_capacity(input.todos.len());
        for entry in input.todos {
            let id = entry.id.unwrap_or_else(|| {
                let id = state.next_id;
                state.next_id += 1;
                id
            });
            state.next_id = state.next_id.max(id + 1);
            todos.push(TodoItem {
                id,
                content: entry.content,
                status: entry.status,
            });
        }
        state.todos = todos;

        Ok(ToolResult::ok(json!({"todos": &state.todos})))
    }
}
