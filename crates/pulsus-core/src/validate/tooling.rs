//! External lint/type-check tool invocation (SPEC_FULL.md §4.J
//! supplement — the spec leaves the concrete linter/type-checker
//! unspecified, so both are modeled as an arbitrary configured
//! command-line rather than a hardcoded tool).

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use pulsus_common::decision::StageResult;

/// Run `command[0] command[1..] artifact_path`, capturing combined
/// stdout/stderr as diagnostics on a nonzero exit. Warnings (nonzero
/// exit code 0 paired with stderr output) are recorded but do not
/// fail the stage — only a nonzero exit does (spec §4.J "warnings are
/// allowed and recorded").
pub fn run_external_command(command: &[String], artifact_path: &Path) -> StageResult {
    let started = Instant::now();
    let Some((binary, args)) = command.split_first() else {
        return StageResult::pass(0);
    };

    let output = Command::new(binary)
        .args(args)
        .arg(artifact_path)
        .output();

    let duration_ms = started.elapsed().as_millis() as u64;
    match output {
        Ok(output) if output.status.success() => {
            let warnings = String::from_utf8_lossy(&output.stderr);
            let mut result = StageResult::pass(duration_ms);
            if !warnings.trim().is_empty() {
                result.diagnostics.push(warnings.trim().to_string());
            }
            result
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            StageResult::fail(duration_ms, vec![stderr, stdout].into_iter().filter(|s| !s.is_empty()).collect())
        }
        Err(e) => StageResult::fail(duration_ms, vec![format!("failed to spawn `{binary}`: {e}")]),
    }
}
