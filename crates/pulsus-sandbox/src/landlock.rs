//! Linux-only filesystem and network confinement applied to the
//! dry-run child before it is spawned (spec §4.K "network off",
//! "filesystem allowlist").
//!
//! Landlock rules attach to the calling *thread*, not the process, and
//! are inherited by anything that thread subsequently forks+execs —
//! the same pattern this is ported from applies the ruleset on a
//! dedicated thread immediately before spawning the sandboxed child.
//! `no_new_privs` plus an empty network-rule set denies outbound
//! connections outright, satisfying the "no network I/O" non-goal
//! defense-in-depth rather than by convention alone.

use std::path::Path;

use landlock::{
    Access, AccessFs, AccessNet, PathBeneath, PathFd, Ruleset, RulesetAttr, RulesetCreatedAttr,
    ABI,
};

use crate::SandboxError;

/// Confine the current thread to read access under `allowed_read_roots`
/// and deny all network access. Call this on a freshly spawned thread
/// immediately before `Command::spawn`.
pub fn confine_current_thread(allowed_read_roots: &[impl AsRef<Path>]) -> Result<(), SandboxError> {
    let abi = ABI::V4;
    let mut ruleset = Ruleset::default()
        .handle_access(AccessFs::from_all(abi))
        .map_err(landlock_err)?
        .handle_access(AccessNet::from_all(abi))
        .map_err(landlock_err)?
        .create()
        .map_err(landlock_err)?;

    for root in allowed_read_roots {
        let root = root.as_ref();
        if !root.exists() {
            continue;
        }
        let path_fd = PathFd::new(root).map_err(landlock_err)?;
        ruleset = ruleset
            .add_rule(PathBeneath::new(path_fd, AccessFs::from_read(abi)))
            .map_err(landlock_err)?;
    }

    // No AccessNet rules are added: every TCP bind/connect is denied.
    ruleset
        .set_no_new_privs(true)
        .restrict_self()
        .map_err(landlock_err)?;
    Ok(())
}

fn landlock_err(e: impl std::fmt::Display) -> SandboxError {
    SandboxError::Isolation(e.to_string())
}

pub fn is_available() -> bool {
    landlock::Ruleset::default()
        .handle_access(AccessFs::from_all(ABI::V4))
        .and_then(|r| r.create())
        .is_ok()
}
