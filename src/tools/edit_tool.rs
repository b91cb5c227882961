//! Edit tool — search-and-replace based file editing within the workspace root.

use anyhow::Result;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::{ErrorKind, Tool, ToolContext, ToolResult};
use crate::permissions::{PermissionMetadata, RiskLevel, ToolScope};

/// Tool that performs search-and-replace edits on existing files.
///
/// Finds exact text matches and replaces them, optionally replacing all
/// occurrences. Path traversal outside the workspace root is rejected.
pub struct EditTool {
    workspace_root: PathBuf,
}

impl EditTool {
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
struct EditInput {
    path: String,
    old_text: String,
    new_text: String,
    #[serde(default)]
    replace_all: bool,
}

/// Line range `[first, last]` touched by replacing `old_text` at `offset`.
fn changed_lines(content: &str, offset: usize, new_text: &str) -> [usize; 2] {
    let first = content[..offset].matches('\n').count() + 1;
    let last = first + new_text.lines().count().saturating_sub(1);
    [first, last.max(first)]
}

#[async_trait::async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "edit"
    }

    fn description(&self) -> &str {
        "Search and replace text in an existing file. Finds exact text matches and replaces them. \
         Path is relative to the workspace root."
    }

    fn schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to workspace root"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to search for in the file"
                },
                "new_text": {
                    "type": "string",
                    "description": "Text to replace old_text with"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default: false, replaces first only)"
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    fn metadata(&self) -> PermissionMetadata {
        PermissionMetadata {
            scope: ToolScope::Write,
            risk: RiskLevel::Caution,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext<'_>) -> Result<ToolResult> {
        let input: EditInput = serde_json::from_value(input)?;
        let path = match self.resolve_path(&input.path) {
            Ok(path) => path,
            Err(e) => return Ok(ToolResult::failure(ErrorKind::NotFound, e.to_string())),
        };

        let content = std::fs::read_to_string(&path)?;

        let Some(offset) = content.find(&input.old_text) else {
            return Ok(ToolResult::failure(
                ErrorKind::NotFound,
                format!(
                    "Text not found in {}. Make sure the old_text matches exactly, \
                     including whitespace and indentation.",
                    input.path
                ),
            ));
        };

        let (new_content, replacements) = if input.replace_all {
            let count = content.matches(&input.old_text).count();
            (content.replace(&input.old_text, &input.new_text), count)
        } else {
            (content.replacen(&input.old_text, &input.new_text, 1), 1)
        };

        std::fs::write(&path, &new_content)?;

        Ok(ToolResult::ok(json!({
            "path": input.path,
            "replacements": replacements,
            "lines_changed": changed_lines(&content, offset, &input.new_text),
        })))
    }
}
