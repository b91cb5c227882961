//! Per-batch tool execution state machine.
//!
//! The executor owns *which* call is in flight and *whether* it may run;
//! it never performs the call itself. When a call is cleared to execute
//! the machine reports `RenderRequested` and the orchestrator invokes the
//! registry, then calls [`ToolExecutor::advance_after_execution`]. This
//! keeps message creation out of the state machine.
//!
//! States: idle → evaluating_policy → (awaiting_permission) → executing /
//! creating_denial_result → ... → completed.

use crate::message::ToolCall;
use crate::permissions::{AuditOutcome, PermissionManager, Policy, PolicyMode};
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    EvaluatingPolicy,
    AwaitingPermission,
    Executing,
    CreatingDenialResult,
    Completed,
}

/// What the orchestrator should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickResult {
    NoAction,
    RenderRequested,
    ShowPermissionPrompt,
    IterationComplete,
    IterationLimitReached,
}

/// The user's answer to a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    AllowOnce,
    AlwaysAllow,
    AskEachTime,
    Deny,
}

/// Drives one batch of tool calls in declaration order.
pub struct ToolExecutor {
    state: ExecutorState,
    batch: Vec<ToolCall>,
    index: usize,
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self {
            state: ExecutorState::Idle,
            batch: Vec::new(),
            index: 0,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == ExecutorState::Idle
    }

    /// Whether the orchestrator should keep ticking this batch.
    pub fn has_pending_work(&self) -> bool {
        self.state != ExecutorState::Idle
    }

    /// The call currently being decided or executed.
    pub fn current_call(&self) -> Option<&ToolCall> {
        self.batch.get(self.index)
    }

    /// Stage a batch at index 0. An empty batch completes immediately.
    pub fn start_execution(&mut self, calls: Vec<ToolCall>) {
        self.batch = calls;
        self.index = 0;
        self.state = if self.batch.is_empty() {
            ExecutorState::Completed
        } else {
            ExecutorState::EvaluatingPolicy
        };
    }

    /// Advance the machine one step.
    ///
    /// Policy evaluation consumes calls until one needs rendering, a
    /// prompt, or the batch ends. Calls whose metadata lookup or argument
    /// validation fails are audited and skipped without a result; every
    /// call that reaches a permission decision produces exactly one
    /// tool-role message downstream.
    pub fn tick(
        &mut self,
        registry: &ToolRegistry,
        permissions: &PermissionManager,
        iteration_count: usize,
        max_iterations: usize,
    ) -> TickResult {
        loop {
            match self.state {
                ExecutorState::Idle => return TickResult::NoAction,
                ExecutorState::AwaitingPermission => return TickResult::NoAction,
                ExecutorState::Executing | ExecutorState::CreatingDenialResult => {
                    return TickResult::RenderRequested
                }
                ExecutorState::Completed => {
                    return if iteration_count >= max_iterations {
                        TickResult::IterationLimitReached
                    } else {
                        TickResult::IterationComplete
                    };
                }
                ExecutorState::EvaluatingPolicy => {
                    // A batch staged past the iteration cap never executes.
                    if self.index == 0 && iteration_count >= max_iterations {
                        self.state = ExecutorState::Completed;
                        continue;
                    }
                    let Some(call) = self.batch.get(self.index) else {
                        self.state = ExecutorState::Completed;
                        continue;
                    };

                    let Some(tool) = registry.lookup(&call.name) else {
                        permissions.audit(
                            &call.name,
                            "unknown tool",
                            AuditOutcome::FailedValidation,
                            false,
                        );
                        self.index += 1;
                        continue;
                    };

                    if let Err(reason) = registry.validate_args(&call.name, &call.arguments) {
                        permissions.audit(
                            &call.name,
                            &reason,
                            AuditOutcome::FailedValidation,
                            false,
                        );
                        self.index += 1;
                        continue;
                    }

                    let metadata = tool.metadata();
                    if permissions.has_session_grant(&call.name, metadata.scope) {
                        permissions.audit(
                            &call.name,
                            "session grant",
                            AuditOutcome::SessionGranted,
                            true,
                        );
                        self.state = ExecutorState::Executing;
                        continue;
                    }

                    let decision =
                        permissions.evaluate(&call.name, &call.arguments, &metadata);
                    if decision.allowed {
                        permissions.audit(
                            &call.name,
                            decision.reason,
                            AuditOutcome::AutoApproved,
                            true,
                        );
                        self.state = ExecutorState::Executing;
                        continue;
                    }
                    if !decision.ask_user {
                        permissions.audit(
                            &call.name,
                            decision.reason,
                            AuditOutcome::DeniedByPolicy,
                            false,
                        );
                        self.state = ExecutorState::CreatingDenialResult;
                        continue;
                    }

                    self.state = ExecutorState::AwaitingPermission;
                    return TickResult::ShowPermissionPrompt;
                }
            }
        }
    }

    /// Inject the user's permission choice.
    ///
    /// A no-op outside `awaiting_permission`, so delivering the same mode
    /// twice for one prompt has the same effect as delivering it once.
    pub fn set_permission_response(
        &mut self,
        mode: PermissionMode,
        registry: &ToolRegistry,
        permissions: &PermissionManager,
    ) {
        if self.state != ExecutorState::AwaitingPermission {
            return;
        }
        let Some(call) = self.batch.get(self.index) else {
            self.state = ExecutorState::Completed;
            return;
        };

        match mode {
            PermissionMode::Deny => {
                permissions.audit(
                    &call.name,
                    "user denied permission",
                    AuditOutcome::DeniedByUser,
                    false,
                );
                self.state = ExecutorState::CreatingDenialResult;
                return;
            }
            PermissionMode::AlwaysAllow => {
                if let Some(tool) = registry.lookup(&call.name) {
                    permissions.insert_policy(Policy {
                        scope: tool.metadata().scope,
                        mode: PolicyMode::AlwaysAllow,
                        allow_paths: Vec::new(),
                        deny_paths: Vec::new(),
                    });
                }
            }
            PermissionMode::AskEachTime => {
                if let Some(tool) = registry.lookup(&call.name) {
                    permissions.add_session_grant(&call.name, tool.metadata().scope);
                }
            }
            PermissionMode::AllowOnce => {}
        }

        permissions.audit(
            &call.name,
            "user approved",
            AuditOutcome::UserApproved,
            true,
        );
        self.state = ExecutorState::Executing;
    }

    /// Move past the current call after the orchestrator recorded its
    /// result (execution or denial).
    pub fn advance_after_execution(&mut self) {
        self.index += 1;
        self.state = if self.index >= self.batch.len() {
            ExecutorState::Completed
        } else {
            ExecutorState::EvaluatingPolicy
        };
    }

    /// Return to idle once the orchestrator consumed the completion.
    pub fn finish(&mut self) {
        self.batch.clear();
        self.index = 0;
        self.state = ExecutorState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PolicyConfig;
    use std::path::PathBuf;

    fn registry() -> ToolRegistry {
        ToolRegistry::with_builtins(PathBuf::from("."))
    }

    fn perms() -> PermissionManager {
        PermissionManager::new(PolicyConfig::default())
    }

    fn call(name: &str, args: &str, id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: args.into(),
        }
    }

    #[test]
    fn empty_batch_completes_immediately() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(Vec::new());
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::IterationComplete
        );
        assert_eq!(
            executor.tick(&registry, &perms, 5, 5),
            TickResult::IterationLimitReached
        );
    }

    #[test]
    fn batch_staged_past_the_cap_never_executes() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![call("read_file", r#"{"path":"Cargo.toml"}"#, "c1")]);
        assert_eq!(
            executor.tick(&registry, &perms, 2, 2),
            TickResult::IterationLimitReached
        );
        // No decision point was reached, so nothing was audited.
        assert_eq!(perms.audit_len(), 0);
    }

    #[test]
    fn safe_tool_auto_approves_and_requests_render() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![call("read_file", r#"{"path":"Cargo.toml"}"#, "c1")]);
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::RenderRequested
        );
        assert_eq!(executor.state(), ExecutorState::Executing);
        let entries = perms.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, crate::permissions::AuditOutcome::AutoApproved);

        executor.advance_after_execution();
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::IterationComplete
        );
    }

    #[test]
    fn risky_tool_prompts_then_executes_on_allow_once() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![call("write_file", r#"{"path":"a","content":""}"#, "c1")]);
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::ShowPermissionPrompt
        );
        // Re-ticking while awaiting must not re-prompt.
        assert_eq!(executor.tick(&registry, &perms, 0, 5), TickResult::NoAction);

        executor.set_permission_response(PermissionMode::AllowOnce, &registry, &perms);
        assert_eq!(executor.state(), ExecutorState::Executing);
        // One prompt, one decision entry.
        assert_eq!(perms.audit_len(), 1);
    }

    #[test]
    fn deny_routes_through_denial_result() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![call("write_file", r#"{"path":"a","content":""}"#, "c1")]);
        executor.tick(&registry, &perms, 0, 5);
        executor.set_permission_response(PermissionMode::Deny, &registry, &perms);
        assert_eq!(executor.state(), ExecutorState::CreatingDenialResult);
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::RenderRequested
        );
        let entries = perms.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].outcome, crate::permissions::AuditOutcome::DeniedByUser);
        assert!(!entries[0].executed);
    }

    #[test]
    fn permission_response_is_idempotent() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![call("write_file", r#"{"path":"a","content":""}"#, "c1")]);
        executor.tick(&registry, &perms, 0, 5);
        executor.set_permission_response(PermissionMode::Deny, &registry, &perms);
        let after_first = perms.audit_len();
        executor.set_permission_response(PermissionMode::Deny, &registry, &perms);
        assert_eq!(perms.audit_len(), after_first);
        assert_eq!(executor.state(), ExecutorState::CreatingDenialResult);
    }

    #[test]
    fn ask_each_time_choice_becomes_a_session_grant() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![
            call("write_file", r#"{"path":"a","content":""}"#, "c1"),
            call("write_file", r#"{"path":"b","content":""}"#, "c2"),
        ]);
        executor.tick(&registry, &perms, 0, 5);
        executor.set_permission_response(PermissionMode::AskEachTime, &registry, &perms);
        executor.advance_after_execution();
        // The second call rides the session grant without prompting.
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::RenderRequested
        );
        let outcomes: Vec<_> = perms.audit_entries().iter().map(|e| e.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                crate::permissions::AuditOutcome::UserApproved,
                crate::permissions::AuditOutcome::SessionGranted,
            ]
        );
    }

    #[test]
    fn always_allow_choice_inserts_a_policy() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![call("write_file", r#"{"path":"a","content":""}"#, "c1")]);
        executor.tick(&registry, &perms, 0, 5);
        executor.set_permission_response(PermissionMode::AlwaysAllow, &registry, &perms);
        executor.advance_after_execution();
        executor.finish();

        // A fresh batch with the same scope now auto-approves.
        executor.start_execution(vec![call("edit", r#"{"path":"a","old_text":"x","new_text":"y"}"#, "c2")]);
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::RenderRequested
        );
        assert_eq!(executor.state(), ExecutorState::Executing);
    }

    #[test]
    fn invalid_calls_are_skipped_without_results() {
        let (registry, perms) = (registry(), perms());
        let mut executor = ToolExecutor::new();
        executor.start_execution(vec![
            call("no_such_tool", "{}", "c1"),
            call("read_file", r#"{"wrong":"field"}"#, "c2"),
            call("read_file", r#"{"path":"Cargo.toml"}"#, "c3"),
        ]);
        // The two bad calls are audited and skipped in one tick.
        assert_eq!(
            executor.tick(&registry, &perms, 0, 5),
            TickResult::RenderRequested
        );
        assert_eq!(executor.current_call().unwrap().id, "c3");
        let entries = perms.audit_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0].outcome,
            crate::permissions::AuditOutcome::FailedValidation
        );
        assert_eq!(
            entries[1].outcome,
            crate::permissions::AuditOutcome::FailedValidation
        );
    }
}
