//! Spawn-wait-capture loop shared by the Linux and fallback executors.
//!
//! The wait loop is a poll-with-timeout identical in shape to the
//! subprocess-verification helper this workspace already uses to keep
//! a parent process safe from a child's panics and hard timeouts: poll
//! `try_wait` on a short interval, kill on timeout rather than block
//! forever. Unlike that helper — which only ever piped stderr — a
//! dry-run's stdout matters too, so both pipes are drained on
//! dedicated threads concurrently with the wait loop; reading them
//! only after the child exits would deadlock the moment a chatty child
//! fills a pipe buffer.

use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

use crate::{SandboxError, SandboxResult};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

pub fn spawn_piped(command: &str, args: &[String], cwd: &Path) -> std::io::Result<Child> {
    Command::new(command)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Drains `reader` but never buffers more than `cap_bytes`, so a
/// runaway or chatty child cannot exhaust the router's memory (spec
/// §4.K "truncated at a configurable cap").
fn drain_capped(mut reader: impl Read, cap_bytes: usize) -> String {
    let mut buf = Vec::with_capacity(4096.min(cap_bytes));
    let _ = reader
        .by_ref()
        .take(cap_bytes as u64)
        .read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Handles to the background readers started the moment a child is
/// spawned, so its pipes never back up while the wait loop is polling.
pub struct PipeReaders {
    stdout: std::thread::JoinHandle<String>,
    stderr: std::thread::JoinHandle<String>,
}

pub fn start_draining(
    stdout: ChildStdout,
    stderr: ChildStderr,
    stdout_cap_bytes: usize,
    stderr_cap_bytes: usize,
) -> PipeReaders {
    PipeReaders {
        stdout: std::thread::spawn(move || drain_capped(stdout, stdout_cap_bytes)),
        stderr: std::thread::spawn(move || drain_capped(stderr, stderr_cap_bytes)),
    }
}

impl PipeReaders {
    pub fn join(self) -> (String, String) {
        let stdout = self.stdout.join().unwrap_or_default();
        let stderr = self.stderr.join().unwrap_or_default();
        (stdout, stderr)
    }
}

/// Wait for `child` to exit, polling at [`POLL_INTERVAL`] up to
/// `timeout`. On timeout the child is killed (caller may additionally
/// tear down a cgroup session for a harder, race-free kill).
pub fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<(Option<i32>, bool, Duration), SandboxError> {
    let start = Instant::now();
    loop {
        match child.try_wait().map_err(|e| SandboxError::Io(e.to_string()))? {
            Some(status) => return Ok((status.code(), false, start.elapsed())),
            None => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok((None, true, start.elapsed()));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

pub fn to_result(
    exit_code: Option<i32>,
    timed_out: bool,
    elapsed: Duration,
    stdout: String,
    stderr: String,
    peak_rss_bytes: Option<u64>,
) -> SandboxResult {
    SandboxResult {
        exit_code,
        stdout,
        stderr,
        wall_ms: elapsed.as_millis() as u64,
        peak_rss_bytes,
        timed_out,
    }
}
