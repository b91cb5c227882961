//! Permission arbitration for tool execution.
//!
//! Three sub-components behind one facade: the [`PolicyEngine`] evaluates
//! persistent policies, [`SessionGrants`] holds in-memory "remember for
//! session" choices, and the [`AuditLog`] records every decision point.
//!
//! The manager takes `&self` everywhere and wraps its state in mutexes:
//! tools receive a shared reference through the execution context (the
//! sub-agent path), while the executor state machine consults it between
//! ticks. All access stays on the orchestrator thread.

mod audit;
mod policy;
mod session;

pub use audit::{AuditEntry, AuditLog, AuditOutcome};
pub use policy::{
    Decision, PermissionMetadata, Policy, PolicyConfig, PolicyEngine, PolicyMode, RiskLevel,
    ToolScope,
};
pub use session::{Grant, SessionGrants};

use std::sync::Mutex;

use chrono::Utc;

/// Facade over policy evaluation, session grants, and the audit log.
pub struct PermissionManager {
    engine: Mutex<PolicyEngine>,
    session: Mutex<SessionGrants>,
    audit: Mutex<AuditLog>,
}

impl PermissionManager {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            engine: Mutex::new(PolicyEngine::new(config)),
            session: Mutex::new(SessionGrants::default()),
            audit: Mutex::new(AuditLog::default()),
        }
    }

    /// Evaluate one tool call against the persistent policies.
    pub fn evaluate(&self, tool: &str, args: &str, metadata: &PermissionMetadata) -> Decision {
        self.engine.lock().unwrap().evaluate(tool, args, metadata)
    }

    /// Whether the user already granted this tool+scope for the session.
    pub fn has_session_grant(&self, tool: &str, scope: ToolScope) -> bool {
        self.session.lock().unwrap().has_grant(tool, scope)
    }

    /// Record a "remember for session" choice.
    pub fn add_session_grant(&self, tool: &str, scope: ToolScope) {
        self.session.lock().unwrap().add_grant(Grant {
            tool: tool.to_string(),
            scope,
            granted_at: Utc::now(),
        });
    }

    /// Insert a persistent policy (user chose "always allow").
    pub fn insert_policy(&self, policy: Policy) {
        self.engine.lock().unwrap().insert(policy);
    }

    /// Record one decision point. Exactly one entry per decision.
    pub fn audit(&self, tool: &str, reason: &str, outcome: AuditOutcome, executed: bool) {
        self.audit
            .lock()
            .unwrap()
            .record(tool, reason, outcome, executed);
    }

    /// Snapshot of the audit log for display.
    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.audit.lock().unwrap().entries().to_vec()
    }

    pub fn audit_len(&self) -> usize {
        self.audit.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_grant_round_trip() {
        let mgr = PermissionManager::new(PolicyConfig::default());
        assert!(!mgr.has_session_grant("write_file", ToolScope::Write));
        mgr.add_session_grant("write_file", ToolScope::Write);
        assert!(mgr.has_session_grant("write_file", ToolScope::Write));
    }

    #[test]
    fn inserted_policy_changes_evaluation() {
        let mgr = PermissionManager::new(PolicyConfig::default());
        let meta = PermissionMetadata {
            scope: ToolScope::Write,
            risk: RiskLevel::Caution,
        };
        assert!(mgr.evaluate("write_file", "{}", &meta).ask_user);
        mgr.insert_policy(Policy {
            scope: ToolScope::Write,
            mode: PolicyMode::AlwaysAllow,
            allow_paths: vec![],
            deny_paths: vec![],
        });
        assert!(mgr.evaluate("write_file", "{}", &meta).allowed);
    }
}
