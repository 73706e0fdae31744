//! Composer (spec §4.H, component H).
//!
//! Emits a small Python module chaining 2+ selected capabilities'
//! `handle` entry points with a simple data-piping contract, then
//! writes it to the run-scoped scratch directory for the validator
//! pipeline to pick up.
//!
//! Each step is inlined by loading its actual module file via
//! `importlib` at its real on-disk path — there is no `pulsus_runtime`
//! bridge module to dispatch through, so the composed artifact must be
//! runnable on its own under the same import-load/dry-run stages every
//! other artifact goes through (spec §4.J). Only `Locator::ScriptModule`
//! steps have a file to inline this way; [`compose`] rejects a plan
//! containing any `Locator::McpMethod` step rather than emit a call
//! that can never resolve.

use std::path::{Path, PathBuf};

use pulsus_common::capability::{CapabilityDescriptor, Locator};

pub struct ComposedModule {
    pub source: String,
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("step {domain}.{action} has no script module to inline (built-in MCP steps cannot be composed into a Python artifact)")]
    NotInlineable { domain: String, action: String },
}

/// Render the compose plan and write it to
/// `scratch_dir/<run_id>/composed.py` (spec §6 persisted-state layout:
/// `<workflows_root>/route_tmp/<run_id>/<artifact>`).
pub fn compose(
    steps: &[CapabilityDescriptor],
    utterance: &str,
    scratch_dir: &Path,
    run_id: &str,
) -> Result<ComposedModule, ComposeError> {
    let source = render(steps, utterance)?;
    let run_dir = scratch_dir.join(run_id);
    std::fs::create_dir_all(&run_dir)?;
    let path = run_dir.join("composed.py");
    std::fs::write(&path, &source)?;
    Ok(ComposedModule { source, path })
}

fn render(steps: &[CapabilityDescriptor], utterance: &str) -> Result<String, ComposeError> {
    let mut out = String::new();
    out.push_str("# Composed module — chains the following steps in order:\n");
    for step in steps {
        out.push_str(&format!("#   {}.{}\n", step.domain, step.action));
    }
    out.push_str(&format!("# Source utterance: {utterance:?}\n\n"));
    out.push_str("import importlib.util\n\n");
    out.push_str("domain = \"compose\"\n");
    out.push_str("action = \"chain\"\n\n");
    out.push_str("def _load_step(path, name):\n");
    out.push_str("    spec = importlib.util.spec_from_file_location(name, path)\n");
    out.push_str("    module = importlib.util.module_from_spec(spec)\n");
    out.push_str("    spec.loader.exec_module(module)\n");
    out.push_str("    return module\n\n");
    out.push_str("def handle(text):\n");
    out.push_str("    data = text\n");
    out.push_str("    trace = []\n");
    for (i, step) in steps.iter().enumerate() {
        let Locator::ScriptModule { module_path, entry_fn } = &step.locator else {
            return Err(ComposeError::NotInlineable {
                domain: step.domain.clone(),
                action: step.action.clone(),
            });
        };
        let abs_path = std::fs::canonicalize(module_path)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|_| module_path.clone());
        out.push_str(&format!(
            "    _step{i} = _load_step({abs_path:?}, \"_step{i}\")\n"
        ));
        out.push_str(&format!("    step = _step{i}.{entry_fn}(data)\n"));
        out.push_str("    trace.append(step.get(\"trace\", []))\n");
        out.push_str("    if not step.get(\"success\"):\n");
        out.push_str("        step[\"trace\"] = [\"composition halted\"] + step.get(\"trace\", [])\n");
        out.push_str("        return step\n");
        out.push_str("    data = step[\"data\"].get(\"text\", step[\"data\"]) if isinstance(step[\"data\"], dict) else step[\"data\"]\n");
    }
    out.push_str(
        "    return {\"success\": True, \"data\": data, \"error\": None, \"status\": \"success\", \"context\": {}, \"trace\": trace, \"metadata\": {}}\n",
    );
    Ok(out)
}
