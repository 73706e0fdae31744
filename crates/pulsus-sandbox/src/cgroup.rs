//! Cgroup v2 resource accounting and teardown for one dry-run (spec
//! §4.K "wall-clock and memory limits").
//!
//! Ported from the cgroup-session pattern used for harness isolation
//! elsewhere in this codebase, trimmed to what a single short-lived
//! dry-run needs: a `memory.max` ceiling, best-effort peak-RSS
//! accounting via `memory.peak`, and a pidfd-based kill that does not
//! race a reused PID.

#![allow(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};

pub struct CgroupManager {
    root_path: PathBuf,
}

pub struct SessionCgroup {
    path: PathBuf,
}

impl CgroupManager {
    /// Resolve the unified-hierarchy cgroup this process already lives
    /// in, so sessions nest correctly under systemd slices / containers.
    pub fn new() -> Result<Self> {
        let mount_point = PathBuf::from("/sys/fs/cgroup");
        if !mount_point.is_dir() {
            return Err(anyhow!("cgroup v2 mount not found at {}", mount_point.display()));
        }

        let content =
            fs::read_to_string("/proc/self/cgroup").context("reading /proc/self/cgroup")?;
        let line = content
            .lines()
            .find(|l| l.starts_with("0::"))
            .ok_or_else(|| anyhow!("no unified hierarchy entry in /proc/self/cgroup"))?;
        let relative = line
            .split("::")
            .nth(1)
            .ok_or_else(|| anyhow!("malformed /proc/self/cgroup line"))?;
        let relative = relative.strip_prefix('/').unwrap_or(relative);

        let root_path = mount_point.join(relative);
        if !root_path.exists() {
            return Err(anyhow!("cgroup path {} does not exist", root_path.display()));
        }
        Ok(Self { root_path })
    }

    /// Create one ephemeral cgroup for a single dry-run, with a memory
    /// ceiling pre-applied.
    pub fn create_session(&self, memory_limit_bytes: u64) -> Result<SessionCgroup> {
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = self.root_path.join(format!("pulsus-dry-run-{timestamp}"));
        if path.exists() {
            let _ = fs::remove_dir(&path);
        }
        fs::create_dir(&path).context("creating cgroup session directory")?;

        let subtree_control = self.root_path.join("cgroup.subtree_control");
        if subtree_control.exists() {
            let _ = fs::write(&subtree_control, "+memory +pids");
        }

        let memory_max = path.join("memory.max");
        if memory_max.exists() {
            let _ = fs::write(&memory_max, memory_limit_bytes.to_string());
        }
        let pids_max = path.join("pids.max");
        if pids_max.exists() {
            let _ = fs::write(&pids_max, "64");
        }

        Ok(SessionCgroup { path })
    }
}

impl SessionCgroup {
    pub fn add_process(&self, pid: u32) -> Result<()> {
        fs::write(self.path.join("cgroup.procs"), pid.to_string())
            .context("adding pid to cgroup.procs")
    }

    /// Best-effort high-water mark since `memory.peak` is not present on
    /// every kernel (added in Linux 6.x). Returns `None` rather than an
    /// error when unavailable.
    pub fn peak_memory_bytes(&self) -> Option<u64> {
        fs::read_to_string(self.path.join("memory.peak"))
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Kill every process in the session via `cgroup.kill` (instant,
    /// SIGKILL-equivalent, no PID-reuse race) and tear the session down.
    pub fn kill_and_cleanup(&self) {
        let kill_file = self.path.join("cgroup.kill");
        if kill_file.exists() {
            let _ = fs::write(&kill_file, "1");
        } else {
            self.kill_via_pidfd();
        }
        let _ = fs::remove_dir(&self.path);
    }

    fn kill_via_pidfd(&self) {
        let Ok(procs) = fs::read_to_string(self.path.join("cgroup.procs")) else {
            return;
        };
        for pid in procs.lines().filter_map(|l| l.trim().parse::<i32>().ok()) {
            if pid <= 0 {
                continue;
            }
            unsafe {
                let fd = libc::syscall(libc::SYS_pidfd_open, pid, 0) as i32;
                if fd >= 0 {
                    libc::syscall(
                        libc::SYS_pidfd_send_signal,
                        fd,
                        libc::SIGKILL,
                        std::ptr::null::<libc::siginfo_t>(),
                        0,
                    );
                    libc::close(fd);
                } else {
                    libc::kill(pid, libc::SIGKILL);
                }
            }
        }
    }
}

impl Drop for SessionCgroup {
    fn drop(&mut self) {
        let _ = fs::remove_dir(&self.path);
    }
}

pub fn is_available() -> bool {
    Path::new("/sys/fs/cgroup/cgroup.controllers").exists()
}
