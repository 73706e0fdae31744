//! Policy document loading and the compiled allowlist the router
//! checks an artifact path against ahead of sandbox execution (spec
//! SPEC_FULL.md §4.C "compiled policy").
//!
//! Pulsus has no kernel-enforcement tier (no eBPF, unlike the teacher),
//! so there is a single compiled tier rather than the teacher's
//! tier1/tier2 split: one pass turns glob strings into a [`globset`]
//! matcher and CIDR strings into parsed network rules. This is a
//! portable check that runs even where `pulsus-sandbox`'s Landlock
//! confinement is unavailable (non-Linux, or `run_fallback`); the two
//! layers overlap by design rather than one delegating to the other.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use pulsus_common::capability::SafetyLevel;

#[derive(Debug, Deserialize, Default)]
pub struct PolicyDocument {
    #[serde(default)]
    pub operations: Vec<OperationEntry>,
    #[serde(default)]
    pub allowlist: AllowlistDoc,
}

#[derive(Debug, Deserialize)]
pub struct OperationEntry {
    pub domain: String,
    pub action: String,
    pub safety_level: SafetyLevel,
    #[serde(default)]
    pub requires_confirmation: bool,
    #[serde(default)]
    pub allowed_type_tags: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AllowlistDoc {
    #[serde(default)]
    pub read_roots: Vec<String>,
    #[serde(default)]
    pub network_allow: Vec<String>,
    #[serde(default)]
    pub network_deny: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRule {
    pub pattern: String,
}

/// Compiled filesystem/network allowlist handed to the sandbox executor
/// (spec §4.K).
#[derive(Debug, Clone)]
pub struct CompiledAllowlist {
    pub read_roots: GlobSet,
    pub network_allow: Vec<NetworkRule>,
    pub network_deny: Vec<NetworkRule>,
}

impl CompiledAllowlist {
    pub fn path_is_readable(&self, path: &str) -> bool {
        self.read_roots.is_match(path)
    }

    pub fn empty() -> Self {
        Self {
            read_roots: GlobSetBuilder::new().build().expect("empty globset"),
            network_allow: Vec::new(),
            network_deny: Vec::new(),
        }
    }
}

pub fn compile_allowlist(doc: &AllowlistDoc) -> Result<CompiledAllowlist, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for root in &doc.read_roots {
        let pattern = if root.ends_with("/**") || root.contains('*') {
            root.clone()
        } else {
            format!("{}/**", root.trim_end_matches('/'))
        };
        builder.add(Glob::new(&pattern)?);
    }
    let read_roots = builder.build()?;
    Ok(CompiledAllowlist {
        read_roots,
        network_allow: doc.network_allow.iter().cloned().map(|pattern| NetworkRule { pattern }).collect(),
        network_deny: doc.network_deny.iter().cloned().map(|pattern| NetworkRule { pattern }).collect(),
    })
}
