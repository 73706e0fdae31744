//! Central safety policy (spec §4.C, component C).
//!
//! `SafetyPolicy` is the one piece of global mutable state Pulsus
//! carries besides the registry (spec §5 "Shared-resource policy").
//! Per Design Note §9 it is exposed as an explicit handle everywhere —
//! a process-global default is offered for ergonomics, but nothing
//! requires it.

mod compiled;
mod mode;
mod operation;

pub use compiled::{CompiledAllowlist, NetworkRule};
pub use mode::{ModeSnapshot, ModeStore};
pub use operation::{OperationPolicy, PolicyDecision};

use std::collections::HashMap;
use std::sync::RwLock;

use pulsus_common::capability::{ExecutionMode, SafetyLevel};
use serde_json::Value;

/// Confirmation tokens are opaque strings supplied by the caller at
/// invocation time for non-interactive use (spec §4.C).
pub type ConfirmationToken = String;

#[derive(Debug, Default)]
pub struct SafetyPolicy {
    mode: ModeStore,
    operations: RwLock<HashMap<(String, String), OperationPolicy>>,
    platform_type_whitelist: RwLock<HashMap<String, Vec<String>>>,
}

impl SafetyPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load operation policies plus a compiled file/network allowlist
    /// from a YAML document (spec SPEC_FULL.md §4.C "compiled policy").
    pub fn from_yaml(yaml: &str) -> Result<(Self, CompiledAllowlist), PolicyLoadError> {
        let doc: compiled::PolicyDocument =
            serde_yaml::from_str(yaml).map_err(|e| PolicyLoadError::Parse(e.to_string()))?;
        let policy = Self::new();
        for entry in &doc.operations {
            policy.register_operation(
                &entry.domain,
                &entry.action,
                entry.safety_level,
                entry.requires_confirmation,
                entry.allowed_type_tags.clone(),
            );
        }
        let compiled = compiled::compile_allowlist(&doc.allowlist)
            .map_err(|e| PolicyLoadError::Compile(e.to_string()))?;
        Ok((policy, compiled))
    }

    /// Atomic mode write. Readers that began a cycle before this call
    /// keep seeing the pre-write mode for the rest of that cycle
    /// (spec §5 "Ordering guarantees").
    pub fn set_mode(&self, mode: ExecutionMode) {
        self.mode.set(mode);
    }

    pub fn get_mode(&self) -> ExecutionMode {
        self.mode.get()
    }

    /// Snapshot the mode at router entry (spec §4.C, §5).
    pub fn snapshot_mode(&self) -> ModeSnapshot {
        self.mode.snapshot()
    }

    pub fn register_operation(
        &self,
        domain: &str,
        action: &str,
        level: SafetyLevel,
        requires_confirmation: bool,
        allowed_type_tags: Vec<String>,
    ) {
        let mut ops = self.operations.write().expect("policy lock poisoned");
        ops.insert(
            (domain.to_string(), action.to_string()),
            OperationPolicy {
                safety_level: level,
                requires_confirmation,
                allowed_type_tags,
            },
        );
    }

    pub fn register_platform_whitelist(&self, platform_tag: &str, type_tags: Vec<String>) {
        let mut wl = self.platform_type_whitelist.write().expect("lock poisoned");
        wl.insert(platform_tag.to_string(), type_tags);
    }

    pub fn operation_policy(&self, domain: &str, action: &str) -> Option<OperationPolicy> {
        self.operations
            .read()
            .expect("policy lock poisoned")
            .get(&(domain.to_string(), action.to_string()))
            .cloned()
    }

    /// Deterministic table lookup (spec §4.C table). `value_type_tag`
    /// is the runtime type tag of the value the operation would act on
    /// (e.g. a parameter's declared type tag); only `restricted_write`
    /// operations in `execute` mode consult it, via
    /// [`Self::check_type_safety`]. Pass `None` when no concrete value
    /// is bound yet — a `restricted_write` operation then fails
    /// closed, the same as an unrecognized type tag would.
    pub fn validate_operation(
        &self,
        domain: &str,
        action: &str,
        mode: ExecutionMode,
        confirmation_token: Option<&ConfirmationToken>,
        value_type_tag: Option<&str>,
    ) -> PolicyDecision {
        let Some(op) = self.operation_policy(domain, action) else {
            return PolicyDecision::Deny(format!(
                "unregistered operation `{domain}.{action}`"
            ));
        };
        let type_safety_ok = if op.safety_level == SafetyLevel::RestrictedWrite {
            value_type_tag
                .map(|tag| self.check_type_safety(domain, action, tag, None))
                .unwrap_or(false)
        } else {
            true
        };
        operation::decide(&op, mode, confirmation_token, type_safety_ok)
    }

    /// Check a runtime value's type tag against an operation's allowed
    /// set, falling back to a registered platform whitelist (spec
    /// §4.C "check_type_safety").
    pub fn check_type_safety(
        &self,
        domain: &str,
        action: &str,
        value_type_tag: &str,
        platform_tag: Option<&str>,
    ) -> bool {
        let Some(op) = self.operation_policy(domain, action) else {
            return false;
        };
        if op.allowed_type_tags.iter().any(|t| t == value_type_tag) {
            return true;
        }
        if let Some(platform_tag) = platform_tag {
            let wl = self.platform_type_whitelist.read().expect("lock poisoned");
            if let Some(tags) = wl.get(platform_tag) {
                return tags.iter().any(|t| t == value_type_tag);
            }
        }
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyLoadError {
    #[error("failed to parse policy document: {0}")]
    Parse(String),
    #[error("failed to compile allowlist: {0}")]
    Compile(String),
}

/// JSON-safe snapshot of a single operation's declared properties, used
/// by the registry when reporting a capability descriptor's safety
/// level (spec §4.D).
pub fn safety_level_to_json(level: SafetyLevel) -> Value {
    serde_json::to_value(level).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_with_write_safe() -> SafetyPolicy {
        let policy = SafetyPolicy::new();
        policy.register_operation("script", "write_docstring", SafetyLevel::WriteSafe, true, vec![]);
        policy
    }

    fn policy_with_restricted_write() -> SafetyPolicy {
        let policy = SafetyPolicy::new();
        policy.register_operation(
            "db",
            "update_row",
            SafetyLevel::RestrictedWrite,
            true,
            vec!["row".to_string()],
        );
        policy
    }

    #[test]
    fn plan_mode_blocks_write_safe() {
        let policy = policy_with_write_safe();
        let decision = policy.validate_operation("script", "write_docstring", ExecutionMode::Plan, None, None);
        assert!(matches!(decision, PolicyDecision::Deny(_)));
    }

    #[test]
    fn execute_mode_requires_confirmation_for_write_safe() {
        let policy = policy_with_write_safe();
        let decision =
            policy.validate_operation("script", "write_docstring", ExecutionMode::Execute, None, None);
        assert!(matches!(decision, PolicyDecision::RequireConfirm));

        let token = "tok-abc".to_string();
        let decision = policy.validate_operation(
            "script",
            "write_docstring",
            ExecutionMode::Execute,
            Some(&token),
            None,
        );
        assert!(matches!(decision, PolicyDecision::Allow));
    }

    #[test]
    fn execute_mode_denies_restricted_write_with_a_mismatched_type_tag() {
        let policy = policy_with_restricted_write();
        let token = "tok-abc".to_string();
        let decision = policy.validate_operation(
            "db",
            "update_row",
            ExecutionMode::Execute,
            Some(&token),
            Some("blob"),
        );
        assert!(matches!(decision, PolicyDecision::Deny(_)));
    }

    #[test]
    fn execute_mode_requires_confirmation_for_restricted_write_with_a_matching_type_tag() {
        let policy = policy_with_restricted_write();
        let decision =
            policy.validate_operation("db", "update_row", ExecutionMode::Execute, None, Some("row"));
        assert!(matches!(decision, PolicyDecision::RequireConfirm));

        let token = "tok-abc".to_string();
        let decision = policy.validate_operation(
            "db",
            "update_row",
            ExecutionMode::Execute,
            Some(&token),
            Some("row"),
        );
        assert!(matches!(decision, PolicyDecision::Allow));
    }

    #[test]
    fn execute_mode_denies_restricted_write_with_no_type_tag_supplied() {
        let policy = policy_with_restricted_write();
        let token = "tok-abc".to_string();
        let decision = policy.validate_operation(
            "db",
            "update_row",
            ExecutionMode::Execute,
            Some(&token),
            None,
        );
        assert!(matches!(decision, PolicyDecision::Deny(_)));
    }

    #[test]
    fn unsafe_mode_allows_everything() {
        let policy = policy_with_write_safe();
        let decision = policy.validate_operation("script", "write_docstring", ExecutionMode::Unsafe, None, None);
        assert!(matches!(decision, PolicyDecision::Allow));
    }

    #[test]
    fn read_only_always_allowed() {
        let policy = SafetyPolicy::new();
        policy.register_operation("data", "summarize", SafetyLevel::ReadOnly, false, vec![]);
        for mode in [ExecutionMode::Plan, ExecutionMode::Execute, ExecutionMode::Unsafe] {
            assert!(matches!(
                policy.validate_operation("data", "summarize", mode, None, None),
                PolicyDecision::Allow
            ));
        }
    }

    #[test]
    fn unregistered_operation_is_denied() {
        let policy = SafetyPolicy::new();
        let decision = policy.validate_operation("ghost", "op", ExecutionMode::Unsafe, None, None);
        assert!(matches!(decision, PolicyDecision::Deny(_)));
    }
}
