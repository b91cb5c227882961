//! Tool definitions and dispatch.
//!
//! Every capability the model can invoke lives behind the [`Tool`] trait:
//! a JSON schema advertised to the model, permission metadata for the
//! policy engine, and an executor. [`ToolRegistry`] owns the catalog and is
//! the sole callable side-effect surface: `execute` validates arguments,
//! never panics, and always returns a well-formed [`ToolResult`] with
//! timing metrics filled in.

pub mod agent_tool;
pub mod bash_tool;
pub mod edit_tool;
pub mod glob_tool;
pub mod grep_tool;
pub mod read_file;
pub mod todo_tool;
pub mod write_file;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::agents::AgentRegistry;
use crate::config::Config;
use crate::permissions::{PermissionManager, PermissionMetadata};
use crate::provider::Provider;

use agent_tool::AgentTool;
use bash_tool::BashTool;
use edit_tool::EditTool;
use glob_tool::GlobTool;
use grep_tool::GrepTool;
use read_file::ReadFileTool;
use todo_tool::TodoTool;
use write_file::WriteFileTool;

/// Failure classification carried by a [`ToolResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    None,
    NotFound,
    ValidationFailed,
    PermissionDenied,
    IoError,
    ParseError,
    InternalError,
}

/// Execution metrics attached to every result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolMetrics {
    pub execution_time_ms: u64,
    pub data_size_bytes: usize,
    /// RFC 3339 completion timestamp.
    pub timestamp: String,
}

/// The result of executing a tool.
///
/// Serialized compactly as the content of the tool-role message the model
/// sees; [`ToolResult::to_wire`] is that stable textual form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub error_type: ErrorKind,
    /// Reasoning text from sub-agent runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    #[serde(default)]
    pub metadata: ToolMetrics,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
            error_type: ErrorKind::None,
            thinking: None,
            metadata: ToolMetrics::default(),
        }
    }

    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_message: Some(message.into()),
            error_type: kind,
            thinking: None,
            metadata: ToolMetrics::default(),
        }
    }

    /// The denial result appended when a call is refused.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::failure(ErrorKind::PermissionDenied, message)
    }

    /// Compact JSON form included as the tool-role message content.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"success":false,"error_message":"unserializable result","error_type":"internal_error"}"#
                .to_string()
        })
    }

    fn stamp(mut self, started: Instant) -> Self {
        self.metadata.execution_time_ms = started.elapsed().as_millis() as u64;
        self.metadata.data_size_bytes = self
            .data
            .as_ref()
            .map(|d| d.to_string().len())
            .unwrap_or(0);
        self.metadata.timestamp = chrono::Utc::now().to_rfc3339();
        self
    }
}

/// Orchestrator-owned dependencies handed to each executor.
///
/// Passing these explicitly keeps the registry free of global state; only
/// the sub-agent tool uses most of them.
pub struct ToolContext<'a> {
    pub provider: &'a Provider,
    pub permissions: &'a PermissionManager,
    pub agents: &'a AgentRegistry,
    pub tools: &'a ToolRegistry,
    pub config: &'a Config,
    pub workspace_root: &'a Path,
}

/// Every tool implements this trait.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model uses to call this tool.
    fn name(&self) -> &str;

    /// Human-readable description advertised to the model.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's input parameters.
    fn schema(&self) -> Value;

    /// Scope and risk level for the permission engine.
    fn metadata(&self) -> PermissionMetadata;

    /// Execute the tool with validated JSON input.
    async fn execute(&self, input: Value, ctx: &ToolContext<'_>) -> Result<ToolResult>;
}

/// Holds all registered tools and dispatches calls by name.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Register a tool. Called during startup.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(Arc::from(tool));
    }

    /// Create a registry with all built-in tools.
    pub fn with_builtins(workspace_root: PathBuf) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(ReadFileTool::new(workspace_root.clone())));
        registry.register(Box::new(GlobTool::new(workspace_root.clone())));
        registry.register(Box::new(GrepTool::new(workspace_root.clone())));
        registry.register(Box::new(WriteFileTool::new(workspace_root.clone())));
        registry.register(Box::new(EditTool::new(workspace_root.clone())));
        registry.register(Box::new(BashTool::new(workspace_root)));
        registry.register(Box::new(TodoTool::new()));
        registry.register(Box::new(AgentTool::new()));
        registry
    }

    /// Look up a tool by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    /// The `tools` array sent to the provider.
    pub fn list_schemas(&self) -> Vec<Value> {
        self.tools.iter().map(|t| function_schema(&**t)).collect()
    }

    /// Schemas restricted to an agent's allowed tool names.
    pub fn schemas_for(&self, allowed: &[String]) -> Vec<Value> {
        self.tools
            .iter()
            .filter(|t| allowed.iter().any(|name| name == t.name()))
            .map(|t| function_schema(&**t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate a raw argument payload against the named tool's schema.
    ///
    /// Returns the parsed object on success, or a description of what
    /// failed for the audit log.
    pub fn validate_args(&self, name: &str, args: &str) -> Result<Value, String> {
        let tool = self
            .lookup(name)
            .ok_or_else(|| format!("unknown tool: {name}"))?;
        let parsed: Value =
            serde_json::from_str(args).map_err(|e| format!("arguments are not JSON: {e}"))?;
        validate_against_schema(&tool.schema(), &parsed)?;
        Ok(parsed)
    }

    /// Execute a tool by name with pre-validated argument text.
    ///
    /// All faults become failure results; this function never panics and
    /// always fills in the execution metrics.
    pub async fn execute(&self, name: &str, args: &str, ctx: &ToolContext<'_>) -> ToolResult {
        let started = Instant::now();
        let tool = match self.lookup(name) {
            Some(tool) => tool,
            None => {
                return ToolResult::failure(ErrorKind::NotFound, format!("unknown tool: {name}"))
                    .stamp(started)
            }
        };
        let parsed: Value = match serde_json::from_str(args) {
            Ok(parsed) => parsed,
            Err(e) => {
                return ToolResult::failure(
                    ErrorKind::ParseError,
                    format!("arguments are not JSON: {e}"),
                )
                .stamp(started)
            }
        };
        if let Err(reason) = validate_against_schema(&tool.schema(), &parsed) {
            return ToolResult::failure(ErrorKind::ValidationFailed, reason).stamp(started);
        }
        match tool.execute(parsed, ctx).await {
            Ok(result) => result.stamp(started),
            Err(e) => {
                let kind = if e.downcast_ref::<std::io::Error>().is_some() {
                    ErrorKind::IoError
                } else {
                    ErrorKind::InternalError
                };
                ToolResult::failure(kind, e.to_string()).stamp(started)
            }
        }
    }
}

/// The `{type:"function",...}` wrapper advertised to the model.
fn function_schema(tool: &dyn Tool) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.schema(),
        }
    })
}

/// Check an argument object against a tool's top-level JSON schema:
/// required fields must be present and property types must match.
fn validate_against_schema(schema: &Value, args: &Value) -> Result<(), String> {
    let obj = args
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for field in required {
            if let Some(name) = field.as_str() {
                if !obj.contains_key(name) {
                    return Err(format!("missing required argument: {name}"));
                }
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) {
        for (key, value) in obj {
            let Some(expected) = properties.get(key) else {
                continue;
            };
            let Some(kind) = expected.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            let matches = match kind {
                "string" => value.is_string(),
                "number" => value.is_number(),
                "integer" => value.is_i64() || value.is_u64(),
                "boolean" => value.is_boolean(),
                "array" => value.is_array(),
                "object" => value.is_object(),
                _ => true,
            };
            if !matches {
                return Err(format!("argument {key} must be of type {kind}"));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests;
