//! Agent registry: built-ins plus definitions loaded from disk.

use std::path::Path;

use anyhow::{Context, Result};

use super::{AgentCapabilities, AgentDefinition};

/// Holds every known agent definition. Built-ins are always present and
/// win name collisions with loaded definitions.
pub struct AgentRegistry {
    agents: Vec<AgentDefinition>,
}

impl AgentRegistry {
    /// Registry containing only the built-in agents.
    pub fn with_builtins() -> Self {
        Self {
            agents: builtin_agents(),
        }
    }

    /// Registry with built-ins plus definitions from `dir` (one TOML file
    /// per agent). Unreadable or malformed files are skipped with a
    /// warning; duplicate names lose to whatever is already registered.
    pub fn load(dir: &Path) -> Self {
        let mut registry = Self::with_builtins();
        if !dir.is_dir() {
            return registry;
        }
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("could not read agents directory {:?}: {}", dir, e);
                return registry;
            }
        };
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        paths.sort();
        for path in paths {
            match load_definition(&path) {
                Ok(def) => registry.register(def),
                Err(e) => log::warn!("skipping agent file {:?}: {}", path, e),
            }
        }
        registry
    }

    /// Register a definition unless the name is already taken.
    pub fn register(&mut self, def: AgentDefinition) {
        if self.lookup(&def.name).is_some() {
            log::warn!("agent {} already registered, keeping the first", def.name);
            return;
        }
        self.agents.push(def);
    }

    pub fn lookup(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn all(&self) -> &[AgentDefinition] {
        &self.agents
    }
}

fn load_definition(path: &Path) -> Result<AgentDefinition> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read agent file {:?}", path))?;
    toml::from_str(&contents).with_context(|| format!("Failed to parse agent file {:?}", path))
}

/// The agents every session starts with.
fn builtin_agents() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition {
            name: "file_curator".to_string(),
            description: "Summarizes and cross-checks files touched during the session"
                .to_string(),
            system_prompt: crate::constants::FILE_CURATOR_PROMPT.to_string(),
            capabilities: AgentCapabilities {
                allowed_tools: vec![
                    "read_file".to_string(),
                    "glob".to_string(),
                    "grep".to_string(),
                ],
                max_iterations: 10,
                ..AgentCapabilities::default()
            },
        },
        AgentDefinition {
            name: "compressor".to_string(),
            description: "Summarizes older conversation messages to reclaim context space"
                .to_string(),
            system_prompt: crate::constants::COMPRESSION_AGENT_PROMPT.to_string(),
            capabilities: AgentCapabilities {
                allowed_tools: vec![
                    "get_compression_metadata".to_string(),
                    "compress_tool_result".to_string(),
                    "compress_conversation_segment".to_string(),
                    "verify_compression_target".to_string(),
                ],
                max_iterations: crate::constants::COMPRESSION_AGENT_MAX_ITERATIONS,
                temperature: Some(crate::constants::COMPRESSION_AGENT_TEMPERATURE),
                ..AgentCapabilities::default()
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_always_present() {
        let registry = AgentRegistry::with_builtins();
        assert!(registry.lookup("file_curator").is_some());
        assert!(registry.lookup("compressor").is_some());
    }

    #[test]
    fn duplicate_names_keep_the_builtin() {
        let mut registry = AgentRegistry::with_builtins();
        let shadowing = AgentDefinition {
            name: "compressor".to_string(),
            description: "imposter".to_string(),
            system_prompt: "you are not the compressor".to_string(),
            capabilities: AgentCapabilities::default(),
        };
        registry.register(shadowing);
        let kept = registry.lookup("compressor").unwrap();
        assert_ne!(kept.description, "imposter");
    }

    #[test]
    fn load_reads_toml_definitions() {
        let dir = std::env::temp_dir().join(format!(
            "tether-agents-{}",
            uuid::Uuid::new_v4().simple()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("reviewer.toml"),
            r#"
name = "reviewer"
description = "Reviews changes"
system_prompt = "You review diffs."

[capabilities]
allowed_tools = ["read_file", "grep"]
max_iterations = 5
"#,
        )
        .unwrap();

        let registry = AgentRegistry::load(&dir);
        let reviewer = registry.lookup("reviewer").unwrap();
        assert_eq!(reviewer.capabilities.max_iterations, 5);
        assert_eq!(reviewer.capabilities.allowed_tools.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
