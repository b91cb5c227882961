//! Write-file tool — writes content to a file, creating parent directories as needed.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

use super::{Tool, ToolContext, ToolResult};
use crate::permissions::{PermissionMetadata, RiskLevel, ToolScope};

/// Tool that writes string content to a file within the workspace root.
///
/// Parent directories are created automatically. Path traversal outside
/// the workspace root is rejected.
pub struct WriteFileTool {
    workspace_root: PathBuf,
}

impl WriteFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }

    /// Resolve and validate that the path stays within the workspace root.
    ///
    /// The target file may not exist yet, so the *parent* directory is
    /// canonicalized instead of the file itself. Parent directories are
    /// created if they don't already exist.
    fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        let resolved = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.workspace_root.join(path)
        };

        let parent = resolved
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Path has no parent directory: {}", path))?;

        fs::create_dir_all(parent)?;

        let parent_canonical = parent.canonicalize()?;
        let root_canonical = self.workspace_root.canonicalize()?;

        if !parent_canonical.starts_with(&root_canonical) {
            anyhow::bail!("Path escapes workspace directory: {}", path);
        }

        let filename = resolved
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Path has no filename: {}", path))?;

        Ok(parent_canonical.join(filename))
    }
}

#[derive(Deserialize)]
struct WriteFileInput {
    path: String,
    content: String,
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. Creates parent directories as needed. Path is relative to the workspace root."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        PermissionMetadata {
            scope: ToolScope::Write,
            risk: RiskLevel::Caution,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: WriteFileInput = serde_json::from_value(input)?;
        let path = self.resolve_path(&input.path)?;

        fs::write(&path, &input.content)?;

        let line_count = input.content.lines().count().max(1);
        Ok(ToolResult::ok(json!({
            "path": input.path,
            "bytes_written": input.content.len(),
            "lines_changed": [1, line_count],
        })))
    }
}
