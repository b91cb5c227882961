//! Sub-agent tool: lets the model delegate a task to a named agent.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ErrorKind, Tool, ToolContext, ToolResult};
use crate::agents::{run_agent, AgentDeps, AgentProgress};
use crate::permissions::{PermissionMetadata, RiskLevel, ToolScope};

pub struct AgentTool;

impl AgentTool {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Deserialize)]
struct AgentInput {
    agent: String,
    task: String,
}

#[async_trait::async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        "run_agent"
    }

    fn description(&self) -> &str {
        "Delegate a task to a named sub-agent. The agent runs its own conversation \
         with a restricted tool set and returns its final answer."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "agent": {
                    "type": "string",
                    "description": "Name of a registered agent (see /agents)"
                },
                "task": {
                    "type": "string",
                    "description": "What the agent should do"
                }
            },
            "required": ["agent", "task"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        PermissionMetadata {
            scope: ToolScope::Execute,
            risk: RiskLevel::Caution,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: AgentInput = serde_json::from_value(input)?;

        let Some(def) = ctx.agents.lookup(&input.agent) else {
            return Ok(ToolResult::failure(
                ErrorKind::NotFound,
                format!("unknown agent: {}", input.agent),
            ));
        };

        let model = ctx
            .config
            .model_name()
            .unwrap_or_else(|| crate::constants::OLLAMA_DEFAULT_MODEL.to_string());
        let deps = AgentDeps {
            provider: ctx.provider,
            tools: ctx.tools,
            permissions: ctx.permissions,
            agents: ctx.agents,
            config: ctx.config,
            workspace_root: ctx.workspace_root,
            model: &model,
            recent_context: &[],
        };

        let mut progress = |p: AgentProgress<'_>| match p {
            AgentProgress::Iteration(n) => log::debug!("agent {}: iteration {}", input.agent, n),
            AgentProgress::ToolCall(name) => log::debug!("agent {}: tool {}", input.agent, name),
            AgentProgress::Complete => log::debug!("agent {}: complete", input.agent),
            _ => {}
        };
        let outcome = run_agent(def, &input.task, &deps, Some(&mut progress)).await;

        if outcome.success {
            let mut result = ToolResult::ok(json!({
                "agent": input.agent,
                "result": outcome.data,
                "stats": {
                    "iterations_used": outcome.stats.iterations_used,
                    "tool_calls_made": outcome.stats.tool_calls_made,
                    "elapsed_ms": outcome.stats.elapsed_ms,
                },
            }));
            result.thinking = outcome.thinking;
            Ok(result)
        } else {
            Ok(ToolResult::failure(
                ErrorKind::InternalError,
                outcome
                    .error_message
                    .unwrap_or_else(|| "agent run failed".to_string()),
            ))
        }
    }
}
