use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::{ErrorKind, Tool, ToolContext, ToolResult};
use crate::permissions::{PermissionMetadata, RiskLevel, ToolScope};

pub struct ReadFileTool {
    /// Workspace root directory. Paths are resolved relative to this.
    workspace_root: PathBuf,
}

impl ReadFileTool {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }

    /// Resolve and validate that the path stays within the workspace root.
    fn resolve_path(&self, path: &str) -> Result<PathBuf> {
        let resolved = if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.workspace_root.join(path)
        };
        let canonical = resolved.canonicalize()?;
        let root_canonical = self.workspace_root.canonicalize()?;
        if !canonical.starts_with(&root_canonical) {
            anyhow::bail!("Path escapes workspace directory: {}", path);
        }
        Ok(canonical)
    }
}

#[derive(Deserialize)]
struct ReadFileInput {
    path: String,
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Path is relative to the workspace root."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to workspace root"
                }
            },
            "required": ["path"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        PermissionMetadata {
            scope: ToolScope::Read,
            risk: RiskLevel::Safe,
        }
    }

    async fn execute(&self, input: Value, ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: ReadFileInput = serde_json::from_value(input)?;
        let path = match self.resolve_path(&input.path) {
            Ok(path) => path,
            Err(e) => {
                return Ok(ToolResult::failure(ErrorKind::NotFound, e.to_string()));
            }
        };

        let max_size = ctx
            .config
            .limits
            .max_file_size
            .unwrap_or(crate::constants::MAX_READ_SIZE);
        let metadata = std::fs::metadata(&path)?;
        if metadata.len() > max_size {
            return Ok(ToolResult::failure(
                ErrorKind::ValidationFailed,
                format!("File too large: {} bytes (max {})", metadata.len(), max_size),
            ));
        }

        let content = std::fs::read(&path)?;
        // Check for binary content (null bytes in the head of the file)
        let check_len = content
            .len()
            .min(crate::constants::BINARY_DETECTION_BYTES);
        if content[..check_len].contains(&0) {
            return Ok(ToolResult::failure(
                ErrorKind::ValidationFailed,
                "Binary file detected. Cannot display binary content.",
            ));
        }

        let text = String::from_utf8(content)
            .map_err(|_| anyhow::anyhow!("File is not valid UTF-8"))?;
        Ok(ToolResult::ok(json!({
            "path": input.path,
            "content": text,
        })))
    }
}
