//! Per-operation policy and the deterministic `validate_operation` table
//! (spec §4.C).

use pulsus_common::capability::{ExecutionMode, SafetyLevel};

#[derive(Debug, Clone)]
pub struct OperationPolicy {
    pub safety_level: SafetyLevel,
    pub requires_confirmation: bool,
    pub allowed_type_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allow,
    Deny(String),
    RequireConfirm,
}

/// The spec §4.C table, reproduced exactly:
///
/// | Level \ Mode | plan | execute | unsafe |
/// |---|---|---|---|
/// | read_only | allow | allow | allow |
/// | cached | allow | allow | allow |
/// | write_safe | deny | require_confirm | allow |
/// | restricted_write | deny | require_confirm + check types | allow |
/// | transactional | deny | require_confirm | allow |
///
/// `type_safety_ok` is the caller's already-computed result of
/// [`crate::SafetyPolicy::check_type_safety`] for the value the
/// operation would run against; it only gates `restricted_write` —
/// the table's only row with a "check types" clause. Callers outside
/// `restricted_write` can pass `true`, since the row they land on
/// never consults it.
pub fn decide(
    op: &OperationPolicy,
    mode: ExecutionMode,
    confirmation_token: Option<&str>,
    type_safety_ok: bool,
) -> PolicyDecision {
    use ExecutionMode::{Execute, Plan, Unsafe};
    use SafetyLevel::{Cached, ReadOnly, RestrictedWrite, Transactional, WriteSafe};

    match (op.safety_level, mode) {
        (ReadOnly, _) | (Cached, _) => PolicyDecision::Allow,
        (_, Unsafe) => PolicyDecision::Allow,
        (WriteSafe | RestrictedWrite | Transactional, Plan) => {
            PolicyDecision::Deny("plan mode blocks writes".to_string())
        }
        (RestrictedWrite, Execute) => {
            if !type_safety_ok {
                return PolicyDecision::Deny(
                    "restricted_write value failed check_type_safety".to_string(),
                );
            }
            confirm(op, confirmation_token)
        }
        (WriteSafe | Transactional, Execute) => confirm(op, confirmation_token),
    }
}

fn confirm(op: &OperationPolicy, confirmation_token: Option<&str>) -> PolicyDecision {
    if !op.requires_confirmation {
        return PolicyDecision::Allow;
    }
    match confirmation_token {
        Some(token) if !token.is_empty() => PolicyDecision::Allow,
        _ => PolicyDecision::RequireConfirm,
    }
}
