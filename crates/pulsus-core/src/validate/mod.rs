//! Validator Pipeline (spec §4.J, component J).
//!
//! Four stages, short-circuit on first failure, all results recorded
//! into a [`ValidationReport`]: lint, type-check, import-load, and a
//! sandboxed dry-run (component K, `pulsus_sandbox`).

mod tooling;

use std::path::Path;
use std::time::{Duration, Instant};

use pulsus_common::decision::{StageResult, ValidationReport};
use pulsus_sandbox::{SandboxExecutor, SandboxLimits};

use crate::config::{SandboxConfig, ValidatorToolingConfig};

pub use tooling::run_external_command;

/// Run every stage against `artifact_path` in order, stopping at the
/// first failure (spec §4.J "short-circuit on first failure").
pub fn validate(
    artifact_path: &Path,
    utterance: &str,
    tooling: &ValidatorToolingConfig,
    sandbox_config: &SandboxConfig,
    sandbox: &SandboxExecutor,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    report.lint = run_lint(artifact_path, tooling);
    if !report.lint.passed {
        return report;
    }

    report.typecheck = run_typecheck(artifact_path, tooling);
    if !report.typecheck.passed {
        return report;
    }

    report.import = run_import_load(artifact_path, sandbox, sandbox_config);
    if !report.import.passed {
        return report;
    }

    report.dryrun = run_dry_run(artifact_path, utterance, sandbox, sandbox_config);
    report
}

fn run_lint(artifact_path: &Path, tooling: &ValidatorToolingConfig) -> StageResult {
    if tooling.lint_command.is_empty() {
        return StageResult::pass(0);
    }
    tooling::run_external_command(&tooling.lint_command, artifact_path)
}

fn run_typecheck(artifact_path: &Path, tooling: &ValidatorToolingConfig) -> StageResult {
    if tooling.typecheck_command.is_empty() {
        return StageResult::pass(0);
    }
    tooling::run_external_command(&tooling.typecheck_command, artifact_path)
}

/// Spawn a fresh subprocess that imports the module and asserts a
/// callable `handle` with the expected arity exists (spec §4.J stage
/// 3). Runs inside the same sandbox as the dry-run, but with a much
/// smaller wall-clock budget since it does no real work.
fn run_import_load(
    artifact_path: &Path,
    sandbox: &SandboxExecutor,
    sandbox_config: &SandboxConfig,
) -> StageResult {
    let started = Instant::now();
    let cwd = artifact_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let module_arg = artifact_path.display().to_string();
    let probe = format!(
        "import importlib.util, inspect, sys\n\
         spec = importlib.util.spec_from_file_location(\"candidate\", {module_arg:?})\n\
         module = importlib.util.module_from_spec(spec)\n\
         spec.loader.exec_module(module)\n\
         handle = getattr(module, \"handle\", None)\n\
         if not callable(handle):\n    sys.exit(\"no callable `handle` found\")\n\
         if len(inspect.signature(handle).parameters) != 1:\n    sys.exit(\"`handle` must take exactly one argument\")\n"
    );
    let limits = SandboxLimits {
        wall_clock: Duration::from_millis(5_000),
        memory_bytes: sandbox_config.mem_bytes,
        stdout_cap_bytes: sandbox_config.stdout_cap_bytes,
        stderr_cap_bytes: sandbox_config.stderr_cap_bytes,
    };
    let result = sandbox.run("python3", &["-c".to_string(), probe], &cwd, limits);
    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(r) if r.succeeded() => StageResult::pass(duration_ms),
        Ok(r) => StageResult::fail(duration_ms, vec![r.stderr, r.stdout]),
        Err(e) => StageResult::fail(duration_ms, vec![e.to_string()]),
    }
}

/// Invoke `handle` with the original utterance inside the sandbox
/// (spec §4.J stage 4). Pass requires `success=true` OR a structured
/// `failure` envelope on stdout; an unhandled exception or a
/// non-envelope return is a hard fail.
fn run_dry_run(
    artifact_path: &Path,
    utterance: &str,
    sandbox: &SandboxExecutor,
    sandbox_config: &SandboxConfig,
) -> StageResult {
    let started = Instant::now();
    let cwd = artifact_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    let module_arg = artifact_path.display().to_string();
    let driver = format!(
        "import importlib.util, json, sys\n\
         spec = importlib.util.spec_from_file_location(\"candidate\", {module_arg:?})\n\
         module = importlib.util.module_from_spec(spec)\n\
         spec.loader.exec_module(module)\n\
         result = module.handle({utterance:?})\n\
         if not isinstance(result, dict) or \"success\" not in result:\n\
         \x20\x20\x20\x20sys.exit(\"handle() did not return an envelope\")\n\
         print(json.dumps(result))\n"
    );
    let limits = SandboxLimits {
        wall_clock: Duration::from_millis(sandbox_config.wall_ms),
        memory_bytes: sandbox_config.mem_bytes,
        stdout_cap_bytes: sandbox_config.stdout_cap_bytes,
        stderr_cap_bytes: sandbox_config.stderr_cap_bytes,
    };
    let result = sandbox.run("python3", &["-c".to_string(), driver], &cwd, limits);
    let duration_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(r) if r.timed_out => StageResult::fail(duration_ms, vec!["dry-run exceeded wall-clock limit".to_string()]),
        Ok(r) if r.succeeded() => match serde_json::from_str::<serde_json::Value>(&r.stdout) {
            Ok(_) => StageResult::pass(duration_ms),
            Err(e) => StageResult::fail(duration_ms, vec![format!("dry-run stdout was not a parseable envelope: {e}")]),
        },
        Ok(r) => StageResult::fail(duration_ms, vec![r.stderr, r.stdout]),
        Err(e) => StageResult::fail(duration_ms, vec![e.to_string()]),
    }
}
