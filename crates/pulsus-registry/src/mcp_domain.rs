//! Built-in MCP domain classes (spec §4.D item 2).
//!
//! A domain class is compiled in and registers its operations
//! explicitly through [`CapabilityClass::descriptors`] — never via
//! attribute/decorator introspection, matching Design Note §9's
//! "no dynamic introspection" rule for the user-script side too.

use pulsus_common::capability::{
    CapabilityDescriptor, Locator, Parameter, Provider, SafetyLevel,
};
use pulsus_common::envelope::Envelope;

/// A compiled-in source of capability descriptors.
pub trait CapabilityClass: Send + Sync {
    fn class_name(&self) -> &'static str;
    fn descriptors(&self) -> Vec<CapabilityDescriptor>;

    /// Execute one declared method in-process, producing an
    /// envelope-shaped value (spec §3 "Envelope"). This is what the
    /// Validator Pipeline's dry-run stage calls for a SELECTed
    /// built-in capability (spec §4.J stage 4): there is no module
    /// file to lint, type-check, or import-load, and no Python
    /// subprocess to sandbox — the method is already compiled into
    /// this binary, so the dry-run is the real in-process call itself.
    fn invoke(&self, method: &str, text: &str) -> Envelope;
}

fn method_descriptor(
    class: &'static str,
    method: &'static str,
    domain: &'static str,
    action: &'static str,
    safety_level: SafetyLevel,
    description: &'static str,
    parameters: Vec<Parameter>,
) -> CapabilityDescriptor {
    CapabilityDescriptor {
        domain: domain.to_string(),
        action: action.to_string(),
        safety_level,
        parameters,
        description: description.to_string(),
        provider: Provider::McpClassMethod,
        locator: Locator::McpMethod {
            class: class.to_string(),
            method: method.to_string(),
        },
    }
}

fn string_param(name: &'static str, required: bool) -> Parameter {
    Parameter {
        name: name.to_string(),
        type_tag: "string".to_string(),
        required,
        default: None,
    }
}

/// Filesystem inspection: the canonical `(analysis, analyze_path)`
/// capability the parser's explicit-path heuristic routes to directly
/// (spec §4.E, §8 scenario 6).
pub struct AnalysisDomain;

impl CapabilityClass for AnalysisDomain {
    fn class_name(&self) -> &'static str {
        "AnalysisDomain"
    }

    fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![
            method_descriptor(
                self.class_name(),
                "analyze_path",
                "analysis",
                "analyze_path",
                SafetyLevel::ReadOnly,
                "Inspect a single file or directory and report its structure.",
                vec![string_param("path", true)],
            ),
            method_descriptor(
                self.class_name(),
                "analyze_repository",
                "analysis",
                "analyze_repository",
                SafetyLevel::ReadOnly,
                "Walk a repository root and summarize its module layout.",
                vec![string_param("path", true)],
            ),
        ]
    }

    /// Both methods are read-only inspection of whatever path `text`
    /// names; a nonexistent path is a structured failure envelope, not
    /// an error, since inspecting an absent path is a routine outcome
    /// for this capability (spec §4.J stage 4: "success=true OR a
    /// structured failure envelope").
    fn invoke(&self, method: &str, text: &str) -> Envelope {
        match method {
            "analyze_path" | "analyze_repository" => {
                let path = std::path::Path::new(text);
                if path.exists() {
                    let kind = if path.is_dir() { "directory" } else { "file" };
                    Envelope::ok(serde_json::json!({"path": text, "kind": kind}))
                        .with_trace(format!("inspected {text}"))
                } else {
                    Envelope::fail(format!("path does not exist: {text}"))
                }
            }
            other => Envelope::fail(format!("{} has no method `{other}`", self.class_name())),
        }
    }
}

/// Script inspection and annotation (spec §8 scenario 4's `(script,
/// write_docstring)` example).
pub struct ScriptOpsDomain;

impl CapabilityClass for ScriptOpsDomain {
    fn class_name(&self) -> &'static str {
        "ScriptOpsDomain"
    }

    fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        vec![
            method_descriptor(
                self.class_name(),
                "read_script",
                "script",
                "read_script",
                SafetyLevel::ReadOnly,
                "Read a script's source text without executing it.",
                vec![string_param("path", true)],
            ),
            method_descriptor(
                self.class_name(),
                "write_docstring",
                "script",
                "write_docstring",
                SafetyLevel::WriteSafe,
                "Insert or replace the module-level docstring of a script.",
                vec![string_param("path", true), string_param("docstring", true)],
            ),
        ]
    }

    /// `write_docstring` is `write_safe`: the router's safety check
    /// already gated this SELECT before validation started (spec
    /// §4.C), but the dry-run itself must still not touch whatever
    /// real path the caller named — it writes to a scratch fixture of
    /// its own instead, the same "minimal synthetic fixture" role a
    /// script artifact's dry-run input plays (spec §4.J stage 4).
    fn invoke(&self, method: &str, text: &str) -> Envelope {
        match method {
            "read_script" => match std::fs::read_to_string(text) {
                Ok(contents) => Envelope::ok(serde_json::json!({"source": contents})),
                Err(e) => Envelope::fail(format!("failed to read {text}: {e}")),
            },
            "write_docstring" => {
                let fixture = std::env::temp_dir()
                    .join(format!("pulsus-dryrun-write_docstring-{}.py", std::process::id()));
                let result = std::fs::write(&fixture, format!("\"\"\"{text}\"\"\"\n"));
                let _ = std::fs::remove_file(&fixture);
                match result {
                    Ok(()) => Envelope::ok(serde_json::json!({"fixture": fixture.display().to_string()}))
                        .with_trace("wrote docstring to a scratch fixture, not the caller's path"),
                    Err(e) => Envelope::fail(format!("dry-run write failed: {e}")),
                }
            }
            other => Envelope::fail(format!("{} has no method `{other}`", self.class_name())),
        }
    }
}

/// The fixed set of compiled-in domain classes shipped with the core.
pub fn built_in_domains() -> Vec<Box<dyn CapabilityClass>> {
    vec![Box::new(AnalysisDomain), Box::new(ScriptOpsDomain)]
}
