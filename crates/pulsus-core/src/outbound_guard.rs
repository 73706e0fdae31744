//! Process-global outbound-network guard (SPEC_FULL.md §4.I supplement).
//!
//! Ported from the teacher's `providers::network` policy gate: even
//! the Generator's own HTTP call to the completion endpoint — the one
//! piece of this codebase explicitly allowed to do network I/O — is
//! checked against a switchable policy so it stays auditable and can
//! be denied outright in tests, the same way sandboxed dry-runs are
//! denied network access unconditionally.

use std::sync::{Mutex, OnceLock};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkPolicy {
    Allow,
    Deny(String),
}

fn state() -> &'static Mutex<NetworkPolicy> {
    static STATE: OnceLock<Mutex<NetworkPolicy>> = OnceLock::new();
    STATE.get_or_init(|| Mutex::new(NetworkPolicy::Allow))
}

/// RAII override of the outbound policy, restored on drop. Used by
/// tests to assert the Generator's HTTP client respects a deny.
pub struct NetworkPolicyGuard {
    previous: NetworkPolicy,
}

impl NetworkPolicyGuard {
    pub fn deny(reason: impl Into<String>) -> Self {
        let mut s = state().lock().unwrap_or_else(|p| p.into_inner());
        let previous = s.clone();
        *s = NetworkPolicy::Deny(reason.into());
        Self { previous }
    }
}

impl Drop for NetworkPolicyGuard {
    fn drop(&mut self) {
        let mut s = state().lock().unwrap_or_else(|p| p.into_inner());
        *s = self.previous.clone();
    }
}

pub fn check_outbound(target: &str) -> Result<(), String> {
    let policy = state().lock().unwrap_or_else(|p| p.into_inner()).clone();
    match policy {
        NetworkPolicy::Allow => Ok(()),
        NetworkPolicy::Deny(reason) => Err(format!(
            "outbound network blocked by policy (target={target}): {reason}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn deny_guard_blocks_and_restores_on_drop() {
        {
            let _guard = NetworkPolicyGuard::deny("unit test");
            assert!(check_outbound("https://example.com").is_err());
        }
        assert!(check_outbound("https://example.com").is_ok());
    }
}
