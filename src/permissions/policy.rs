//! Persistent permission policies and the evaluation order.

use serde::{Deserialize, Serialize};

/// The capability class a tool needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolScope {
    Read,
    Write,
    Execute,
}

/// Default risk level advertised by a tool definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Caution,
    Dangerous,
}

/// Permission metadata a tool definition carries.
#[derive(Debug, Clone, Copy)]
pub struct PermissionMetadata {
    pub scope: ToolScope,
    pub risk: RiskLevel,
}

impl PermissionMetadata {
    /// Safe-by-default tools auto-approve when no policy matches.
    pub fn safe_by_default(&self) -> bool {
        self.risk == RiskLevel::Safe
    }
}

/// How a matching policy resolves a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    AllowOnce,
    AlwaysAllow,
    AskEachTime,
    Deny,
}

/// A persistent policy loaded from config or inserted at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Scope the policy applies to.
    pub scope: ToolScope,
    pub mode: PolicyMode,
    /// Path patterns the policy explicitly allows (`src/*` style).
    #[serde(default)]
    pub allow_paths: Vec<String>,
    /// Path patterns the policy refuses regardless of mode.
    #[serde(default)]
    pub deny_paths: Vec<String>,
}

/// Policy list as it appears under `[permissions]` in config.toml.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl PolicyConfig {
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

/// Outcome of policy evaluation for one tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub ask_user: bool,
    pub reason: &'static str,
}

impl Decision {
    pub const fn allow(reason: &'static str) -> Self {
        Self {
            allowed: true,
            ask_user: false,
            reason,
        }
    }

    pub const fn deny(reason: &'static str) -> Self {
        Self {
            allowed: false,
            ask_user: false,
            reason,
        }
    }

    pub const fn ask(reason: &'static str) -> Self {
        Self {
            allowed: false,
            ask_user: true,
            reason,
        }
    }
}

/// Evaluates tool calls against the persistent policy list.
pub struct PolicyEngine {
    policies: Vec<Policy>,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            policies: config.policies,
        }
    }

    /// Insert a policy at runtime (user chose "always allow").
    pub fn insert(&mut self, policy: Policy) {
        self.policies.push(policy);
    }

    /// Evaluate one tool call.
    ///
    /// Order: deny patterns win; then always_allow policies; then
    /// ask_each_time; then safe-by-default tools auto-approve; otherwise ask.
    pub fn evaluate(
        &self,
        _tool_name: &str,
        args: &str,
        metadata: &PermissionMetadata,
    ) -> Decision {
        let target_path = extract_path(args);
        let scoped: Vec<&Policy> = self
            .policies
            .iter()
            .filter(|p| p.scope == metadata.scope)
            .collect();

        for policy in &scoped {
            if let Some(ref path) = target_path {
                if policy.deny_paths.iter().any(|pat| wildcard_match(pat, path)) {
                    return Decision::deny("path refused by policy");
                }
            }
            if policy.mode == PolicyMode::Deny && policy.deny_paths.is_empty() {
                return Decision::deny("scope refused by policy");
            }
        }

        for policy in &scoped {
            if policy.mode == PolicyMode::AlwaysAllow && path_permitted(policy, &target_path) {
                return Decision::allow("allowed by policy");
            }
        }

        if scoped.iter().any(|p| p.mode == PolicyMode::AskEachTime) {
            return Decision::ask("policy requires confirmation");
        }

        if metadata.safe_by_default() {
            return Decision::allow("safe tool auto-approved");
        }

        Decision::ask("no policy matched")
    }
}

/// Whether the policy's allow list (if any) covers the target path.
fn path_permitted(policy: &Policy, target: &Option<String>) -> bool {
    if policy.allow_paths.is_empty() {
        return true;
    }
    match target {
        Some(path) => policy
            .allow_paths
            .iter()
            .any(|pat| wildcard_match(pat, path)),
        // No path in the args; an allow list cannot vouch for it.
        None => false,
    }
}

/// Pull the `path` argument out of a tool-call payload, if present.
fn extract_path(args: &str) -> Option<String> {
    let parsed: serde_json::Value = serde_json::from_str(args).ok()?;
    parsed
        .get("path")
        .and_then(|p| p.as_str())
        .map(str::to_string)
}

/// Simple wildcard matching: "src/*" matches "src/main.rs", "src/a/b.rs", etc.
pub(super) fn wildcard_match(pattern: &str, text: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix('*') {
        text.starts_with(prefix)
    } else {
        pattern == text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(scope: ToolScope, risk: RiskLevel) -> PermissionMetadata {
        PermissionMetadata { scope, risk }
    }

    #[test]
    fn deny_patterns_win_over_allow() {
        let engine = PolicyEngine::new(PolicyConfig {
            policies: vec![Policy {
                scope: ToolScope::Write,
                mode: PolicyMode::AlwaysAllow,
                allow_paths: vec!["src/*".into()],
                deny_paths: vec!["src/secrets/*".into()],
            }],
        });
        let decision = engine.evaluate(
            "write_file",
            r#"{"path":"src/secrets/key.pem"}"#,
            &meta(ToolScope::Write, RiskLevel::Caution),
        );
        assert!(!decision.allowed);
        assert!(!decision.ask_user);
    }

    #[test]
    fn always_allow_matches_scope_and_path() {
        let engine = PolicyEngine::new(PolicyConfig {
            policies: vec![Policy {
                scope: ToolScope::Write,
                mode: PolicyMode::AlwaysAllow,
                allow_paths: vec!["docs/*".into()],
                deny_paths: vec![],
            }],
        });
        let yes = engine.evaluate(
            "write_file",
            r#"{"path":"docs/readme.md"}"#,
            &meta(ToolScope::Write, RiskLevel::Caution),
        );
        assert!(yes.allowed);
        let no = engine.evaluate(
            "write_file",
            r#"{"path":"src/main.rs"}"#,
            &meta(ToolScope::Write, RiskLevel::Caution),
        );
        assert!(no.ask_user);
    }

    #[test]
    fn ask_each_time_overrides_safe_default() {
        let engine = PolicyEngine::new(PolicyConfig {
            policies: vec![Policy {
                scope: ToolScope::Read,
                mode: PolicyMode::AskEachTime,
                allow_paths: vec![],
                deny_paths: vec![],
            }],
        });
        let decision = engine.evaluate(
            "read_file",
            r#"{"path":"Cargo.toml"}"#,
            &meta(ToolScope::Read, RiskLevel::Safe),
        );
        assert!(decision.ask_user);
    }

    #[test]
    fn safe_tools_auto_approve_without_policies() {
        let engine = PolicyEngine::new(PolicyConfig::default());
        let decision = engine.evaluate(
            "read_file",
            r#"{"path":"Cargo.toml"}"#,
            &meta(ToolScope::Read, RiskLevel::Safe),
        );
        assert!(decision.allowed);
    }

    #[test]
    fn unmatched_risky_tool_asks() {
        let engine = PolicyEngine::new(PolicyConfig::default());
        let decision = engine.evaluate(
            "write_file",
            r#"{"path":"a.txt"}"#,
            &meta(ToolScope::Write, RiskLevel::Caution),
        );
        assert!(decision.ask_user);
    }
}
