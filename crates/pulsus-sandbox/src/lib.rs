//! Sandboxed dry-run execution (spec §4.K, component K).
//!
//! The fourth validator-pipeline stage runs a candidate module once,
//! isolated, before it is ever handed back to a user: wall-clock and
//! memory ceilings, no network, stdin closed, stdout/stderr captured
//! and capped, filesystem access limited to an explicit allowlist. On
//! Linux this is enforced defense-in-depth (cgroup v2 for resource
//! limits, Landlock for filesystem/network confinement); everywhere
//! else it degrades to process-level limits only, logged loudly so the
//! reduced isolation is never silent (SPEC_FULL.md §4.K supplement).

mod cgroup;
mod exec;

#[cfg(target_os = "linux")]
mod landlock;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("io error: {0}")]
    Io(String),
    #[error("failed to set up process isolation: {0}")]
    Isolation(String),
}

/// Wall-clock, memory, and output-capture ceilings for one dry-run
/// (spec §4.K: "Stdout/stderr: captured; truncated at a configurable
/// cap (default 64 KiB each)").
#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub wall_clock: Duration,
    pub memory_bytes: u64,
    pub stdout_cap_bytes: usize,
    pub stderr_cap_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            wall_clock: Duration::from_secs(10),
            memory_bytes: 256 * 1024 * 1024,
            stdout_cap_bytes: 64 * 1024,
            stderr_cap_bytes: 64 * 1024,
        }
    }
}

/// Outcome of one isolated run (spec §4.K return shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub wall_ms: u64,
    pub peak_rss_bytes: Option<u64>,
    pub timed_out: bool,
}

impl SandboxResult {
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Executes one command under isolation. Constructed once per router
/// and reused across dry-runs — it carries no per-run state.
pub struct SandboxExecutor {
    allowed_read_roots: Vec<PathBuf>,
}

impl SandboxExecutor {
    pub fn new(allowed_read_roots: Vec<PathBuf>) -> Self {
        Self { allowed_read_roots }
    }

    /// Run `command args...` from `cwd`, enforcing `limits`. Never
    /// returns `Err` for a failing or timed-out *child* — those are
    /// reported through [`SandboxResult`]; `Err` is reserved for the
    /// sandbox itself failing to set up (e.g. cgroup unavailable and no
    /// fallback path).
    pub fn run(
        &self,
        command: &str,
        args: &[String],
        cwd: &Path,
        limits: SandboxLimits,
    ) -> Result<SandboxResult, SandboxError> {
        #[cfg(target_os = "linux")]
        {
            self.run_linux(command, args, cwd, limits)
        }
        #[cfg(not(target_os = "linux"))]
        {
            self.run_fallback(command, args, cwd, limits)
        }
    }

    #[cfg(target_os = "linux")]
    fn run_linux(
        &self,
        command: &str,
        args: &[String],
        cwd: &Path,
        limits: SandboxLimits,
    ) -> Result<SandboxResult, SandboxError> {
        if !cgroup::is_available() || !landlock::is_available() {
            tracing::warn!(
                "cgroup v2 or landlock unavailable on this host; dry-run falling back to \
                 process-level limits only"
            );
            return self.run_fallback(command, args, cwd, limits);
        }

        let manager = cgroup::CgroupManager::new()
            .map_err(|e| SandboxError::Isolation(e.to_string()))?;
        let session = manager
            .create_session(limits.memory_bytes)
            .map_err(|e| SandboxError::Isolation(e.to_string()))?;

        let roots = self.allowed_read_roots.clone();
        let owned_command = command.to_string();
        let owned_args = args.to_vec();
        let owned_cwd = cwd.to_path_buf();

        let outcome = std::thread::spawn(move || -> Result<_, SandboxError> {
            landlock::confine_current_thread(&roots)?;
            let mut child = exec::spawn_piped(&owned_command, &owned_args, &owned_cwd)
                .map_err(|e| SandboxError::Io(e.to_string()))?;
            Ok((child.stdout.take(), child.stderr.take(), child))
        })
        .join()
        .map_err(|_| SandboxError::Isolation("dry-run thread panicked".into()))??;

        let (stdout, stderr, mut child) = outcome;
        session
            .add_process(child.id())
            .map_err(|e| SandboxError::Isolation(e.to_string()))?;

        let readers = exec::start_draining(
            stdout.expect("piped stdout"),
            stderr.expect("piped stderr"),
            limits.stdout_cap_bytes,
            limits.stderr_cap_bytes,
        );
        let (exit_code, timed_out, elapsed) = exec::wait_with_timeout(&mut child, limits.wall_clock)?;
        if timed_out {
            session.kill_and_cleanup();
        }
        let (stdout, stderr) = readers.join();
        let peak_rss = session.peak_memory_bytes();
        session.kill_and_cleanup();

        Ok(exec::to_result(exit_code, timed_out, elapsed, stdout, stderr, peak_rss))
    }

    fn run_fallback(
        &self,
        command: &str,
        args: &[String],
        cwd: &Path,
        limits: SandboxLimits,
    ) -> Result<SandboxResult, SandboxError> {
        let mut child =
            exec::spawn_piped(command, args, cwd).map_err(|e| SandboxError::Io(e.to_string()))?;
        let stdout = child.stdout.take().expect("piped stdout");
        let stderr = child.stderr.take().expect("piped stderr");
        let readers = exec::start_draining(stdout, stderr, limits.stdout_cap_bytes, limits.stderr_cap_bytes);
        let (exit_code, timed_out, elapsed) = exec::wait_with_timeout(&mut child, limits.wall_clock)?;
        let (stdout, stderr) = readers.join();
        Ok(exec::to_result(exit_code, timed_out, elapsed, stdout, stderr, None))
    }
}
