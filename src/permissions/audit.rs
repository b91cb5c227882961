//! Append-only audit log for permission decisions.
//!
//! The log owns copies of every reason string; policy evaluation hands out
//! static strings and the log clones them into owned storage.

use chrono::{DateTime, Utc};

/// How a decision point resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    AutoApproved,
    SessionGranted,
    UserApproved,
    DeniedByPolicy,
    DeniedByUser,
    FailedValidation,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuditOutcome::AutoApproved => "auto_approved",
            AuditOutcome::SessionGranted => "session_granted",
            AuditOutcome::UserApproved => "user_approved",
            AuditOutcome::DeniedByPolicy => "denied_by_policy",
            AuditOutcome::DeniedByUser => "denied_by_user",
            AuditOutcome::FailedValidation => "failed_validation",
        };
        write!(f, "{}", label)
    }
}

/// One recorded decision.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub id: String,
    pub tool: String,
    pub reason: String,
    pub outcome: AuditOutcome,
    /// Whether the decision resulted in execution.
    pub executed: bool,
    pub at: DateTime<Utc>,
}

/// Append-only; entries are never mutated or removed.
#[derive(Debug, Default)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn record(&mut self, tool: &str, reason: &str, outcome: AuditOutcome, executed: bool) {
        self.entries.push(AuditEntry {
            id: uuid::Uuid::new_v4().to_string(),
            tool: tool.to_string(),
            reason: reason.to_string(),
            outcome,
            executed,
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_own_their_reasons() {
        let mut log = AuditLog::default();
        {
            let reason = String::from("scoped reason");
            log.record("read_file", &reason, AuditOutcome::AutoApproved, true);
        }
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].reason, "scoped reason");
        assert!(log.entries()[0].executed);
    }
}
