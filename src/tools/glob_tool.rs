use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use super::{Tool, ToolContext, ToolResult};
use crate::constants::GLOB_MAX_RESULTS;
use crate::permissions::{PermissionMetadata, RiskLevel, ToolScope};

pub struct GlobTool {
    workspace_root: PathBuf,
}

impl GlobTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }
}

#[derive(Deserialize)]
struct GlobInput {
    pattern: String,
}

#[async_trait::async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "List files matching a glob pattern relative to the workspace root."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern (e.g. 'src/**/*.rs')"
                }
            },
            "required": ["pattern"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        PermissionMetadata {
            scope: ToolScope::Read,
            risk: RiskLevel::Safe,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: GlobInput = serde_json::from_value(input)?;
        let full_pattern = self.workspace_root.join(&input.pattern);
        let pattern_str = full_pattern.to_string_lossy();

        let root_canonical = self.workspace_root.canonicalize()?;

        let mut paths: Vec<String> = Vec::new();
        let mut truncated = false;
        for entry in glob::glob(&pattern_str)? {
            if paths.len() >= GLOB_MAX_RESULTS {
                truncated = true;
                break;
            }
            let entry = entry?;
            // Skip entries outside the workspace root
            if let Ok(canonical) = entry.canonicalize() {
                if !canonical.starts_with(&root_canonical) {
                    continue;
                }
            } else {
                continue; // broken symlinks etc.
            }
            let relative = entry.strip_prefix(&self.workspace_root).unwrap_or(&entry);
            paths.push(relative.display().to_string());
        }

        Ok(ToolResult::ok(json!({
            "count": paths.len(),
            "matches": paths,
            "truncated": truncated,
        })))
    }
}
