//! User-script discovery (spec §4.D item 1, SPEC_FULL.md §4.D
//! "manifest contract").
//!
//! Per Design Note §9, discovery never introspects a loaded module at
//! runtime. Every user-script tool under a `framework_root` directory
//! declares a sibling `manifest.json` read deterministically instead.

use std::path::{Path, PathBuf};

use pulsus_common::capability::{CapabilityDescriptor, Locator, Parameter, Provider, SafetyLevel};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ScriptManifest {
    pub domain: String,
    pub action: String,
    pub description: String,
    #[serde(default)]
    pub safety_level: Option<SafetyLevel>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Path to the module relative to the manifest, e.g. `summarize.py`.
    pub module: String,
    #[serde(default = "default_entry_fn")]
    pub entry_fn: String,
}

fn default_entry_fn() -> String {
    "handle".to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest {path} references module `{module}` which does not exist")]
    MissingModule { path: PathBuf, module: String },
}

/// Scan one `framework_root` directory for `*/manifest.json` tool
/// declarations. A directory with no manifest is not an error — it
/// simply contributes no capability. A malformed manifest is returned
/// as an error for the caller to log as a warning and skip (spec §4.D
/// "a malformed module is skipped ... must not abort discovery").
pub fn scan_framework_root(root: &Path) -> Vec<Result<CapabilityDescriptor, ManifestError>> {
    let mut results = Vec::new();
    let Ok(entries) = std::fs::read_dir(root) else {
        return results;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let manifest_path = if path.is_dir() {
            path.join("manifest.json")
        } else if path.file_name().and_then(|n| n.to_str()) == Some("manifest.json") {
            path.clone()
        } else {
            continue;
        };
        if !manifest_path.exists() {
            continue;
        }
        results.push(load_manifest(&manifest_path));
    }
    results
}

fn load_manifest(manifest_path: &Path) -> Result<CapabilityDescriptor, ManifestError> {
    let raw =
        std::fs::read_to_string(manifest_path).map_err(|source| ManifestError::Read {
            path: manifest_path.to_path_buf(),
            source,
        })?;
    let manifest: ScriptManifest =
        serde_json::from_str(&raw).map_err(|source| ManifestError::Parse {
            path: manifest_path.to_path_buf(),
            source,
        })?;
    let module_path = manifest_path
        .parent()
        .map(|p| p.join(&manifest.module))
        .unwrap_or_else(|| PathBuf::from(&manifest.module));
    if !module_path.exists() {
        return Err(ManifestError::MissingModule {
            path: manifest_path.to_path_buf(),
            module: manifest.module,
        });
    }
    Ok(CapabilityDescriptor {
        domain: manifest.domain,
        action: manifest.action,
        safety_level: manifest.safety_level.unwrap_or(SafetyLevel::ReadOnly),
        parameters: manifest.parameters,
        description: manifest.description,
        provider: Provider::UserScript,
        locator: Locator::ScriptModule {
            module_path: module_path.to_string_lossy().into_owned(),
            entry_fn: manifest.entry_fn,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovers_a_well_formed_tool() {
        let dir = tempdir().unwrap();
        let tool_dir = dir.path().join("summarize");
        std::fs::create_dir_all(&tool_dir).unwrap();
        std::fs::write(tool_dir.join("summarize.py"), "# handle(text) -> envelope\n").unwrap();
        std::fs::write(
            tool_dir.join("manifest.json"),
            serde_json::json!({
                "domain": "data",
                "action": "summarize",
                "description": "Summarize the input data matrix.",
                "module": "summarize.py"
            })
            .to_string(),
        )
        .unwrap();

        let results = scan_framework_root(dir.path());
        assert_eq!(results.len(), 1);
        let descriptor = results.into_iter().next().unwrap().unwrap();
        assert_eq!(descriptor.domain, "data");
        assert_eq!(descriptor.action, "summarize");
        assert_eq!(descriptor.provider, Provider::UserScript);
    }

    #[test]
    fn missing_module_is_a_skippable_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let tool_dir = dir.path().join("broken");
        std::fs::create_dir_all(&tool_dir).unwrap();
        std::fs::write(
            tool_dir.join("manifest.json"),
            serde_json::json!({
                "domain": "data",
                "action": "broken",
                "description": "never loads",
                "module": "does_not_exist.py"
            })
            .to_string(),
        )
        .unwrap();

        let results = scan_framework_root(dir.path());
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }
}
