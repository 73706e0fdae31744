//! Capability discovery and indexing (spec §4.D, component D).
//!
//! [`CapabilityRegistry`] holds the one other piece of shared mutable
//! state besides [`pulsus_policy::SafetyPolicy`] (spec §5). Reads never
//! block on a refresh and never see a half-built index: `refresh`
//! builds a brand new [`RegistryIndex`] off to the side and swaps it in
//! with a single pointer write.

mod index;
mod manifest;
mod mcp_domain;

pub use index::RegistryIndex;
pub use manifest::{ManifestError, ScriptManifest};
pub use mcp_domain::{built_in_domains, AnalysisDomain, CapabilityClass, ScriptOpsDomain};

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use pulsus_common::capability::{CapabilityDescriptor, SafetyLevel};
use pulsus_common::error::PulsusError;
use pulsus_policy::SafetyPolicy;

/// Discovers capabilities from compiled-in MCP domain classes and from
/// `manifest.json`-declared user scripts under each `framework_root`.
pub struct CapabilityRegistry {
    framework_roots: Vec<PathBuf>,
    domains: Vec<Box<dyn CapabilityClass>>,
    index: RwLock<Arc<RegistryIndex>>,
}

impl CapabilityRegistry {
    pub fn new(framework_roots: Vec<PathBuf>) -> Self {
        Self {
            framework_roots,
            domains: built_in_domains(),
            index: RwLock::new(Arc::new(RegistryIndex::default())),
        }
    }

    /// Wire in additional compiled-in domain classes beyond the default
    /// set (used by tests and by embedders that add their own).
    pub fn with_domains(mut self, domains: Vec<Box<dyn CapabilityClass>>) -> Self {
        self.domains.extend(domains);
        self
    }

    /// Cheap, lock-free-after-this-call read handle: clones the `Arc`,
    /// not the index (spec §5 "readers never block on a refresh").
    pub fn snapshot(&self) -> Arc<RegistryIndex> {
        self.index.read().expect("registry lock poisoned").clone()
    }

    /// Rebuild the index from scratch and swap it in atomically.
    /// Malformed manifests are skipped and reported back as
    /// [`PulsusError::RegistryError`] entries rather than aborting
    /// discovery (spec §4.D).
    pub fn refresh(&self) -> Vec<PulsusError> {
        let mut descriptors = Vec::new();
        let mut warnings = Vec::new();

        for domain in &self.domains {
            descriptors.extend(domain.descriptors());
        }

        for root in &self.framework_roots {
            for result in manifest::scan_framework_root(root) {
                match result {
                    Ok(descriptor) => descriptors.push(descriptor),
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping malformed capability manifest");
                        warnings.push(PulsusError::RegistryError {
                            locator: root.display().to_string(),
                            detail: e.to_string(),
                        });
                    }
                }
            }
        }

        let resolved = resolve_duplicates(descriptors);
        let new_index = Arc::new(RegistryIndex::build(resolved));
        *self.index.write().expect("registry lock poisoned") = new_index;
        warnings
    }

    /// Register every currently-indexed capability's declared safety
    /// level into `policy` (Design Note §9: "Safety level is data, not
    /// syntax" — registration is an explicit call over discovered data,
    /// never attribute/decorator magic attached at definition time).
    /// Call once after [`Self::refresh`], before the first `route()`.
    ///
    /// `requires_confirmation` defaults to `true` for every level above
    /// `read_only`/`cached`, matching the spec §4.C table's baseline
    /// row (every write-capable level requires confirmation in
    /// `execute` mode unless an embedder re-registers the operation
    /// with a more permissive policy of its own). `allowed_type_tags`
    /// defaults to the descriptor's own declared parameter type tags,
    /// since the spec leaves the concrete notion of a "platform type
    /// whitelist" up to the embedder.
    pub fn install_policies(&self, policy: &SafetyPolicy) {
        let snapshot = self.snapshot();
        for descriptor in snapshot.all() {
            let requires_confirmation = !matches!(
                descriptor.safety_level,
                SafetyLevel::ReadOnly | SafetyLevel::Cached
            );
            let allowed_type_tags = descriptor
                .parameters
                .iter()
                .map(|p| p.type_tag.clone())
                .collect();
            policy.register_operation(
                &descriptor.domain,
                &descriptor.action,
                descriptor.safety_level,
                requires_confirmation,
                allowed_type_tags,
            );
        }
    }

    /// Execute a built-in MCP capability in-process (spec §4.D item
    /// 2). `None` means no compiled-in domain class by that name is
    /// wired into this registry — the caller (the Validator Pipeline's
    /// dry-run stage) treats that as a failing stage, not a panic.
    pub fn invoke_mcp_method(
        &self,
        class: &str,
        method: &str,
        text: &str,
    ) -> Option<pulsus_common::envelope::Envelope> {
        self.domains
            .iter()
            .find(|d| d.class_name() == class)
            .map(|d| d.invoke(method, text))
    }
}

/// When two descriptors share `(domain, action)`, the one with the
/// better `Provider::preference_rank` wins; the loser is dropped with a
/// logged notice (spec §4.D "duplicate resolution").
fn resolve_duplicates(descriptors: Vec<CapabilityDescriptor>) -> Vec<CapabilityDescriptor> {
    use std::collections::HashMap;
    let mut winners: HashMap<(String, String), CapabilityDescriptor> = HashMap::new();
    for descriptor in descriptors {
        let key = (descriptor.domain.clone(), descriptor.action.clone());
        match winners.get(&key) {
            Some(existing) if existing.provider.preference_rank() <= descriptor.provider.preference_rank() => {
                tracing::info!(
                    domain = %descriptor.domain,
                    action = %descriptor.action,
                    dropped_provider = ?descriptor.provider,
                    kept_provider = ?existing.provider,
                    "dropping lower-precedence duplicate capability"
                );
            }
            _ => {
                winners.insert(key, descriptor);
            }
        }
    }
    winners.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsus_common::capability::{Locator, Provider, SafetyLevel};
    use tempfile::tempdir;

    fn script_descriptor(domain: &str, action: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            domain: domain.to_string(),
            action: action.to_string(),
            safety_level: SafetyLevel::ReadOnly,
            parameters: vec![],
            description: "a user script".to_string(),
            provider: Provider::UserScript,
            locator: Locator::ScriptModule {
                module_path: "x.py".into(),
                entry_fn: "handle".into(),
            },
        }
    }

    #[test]
    fn refresh_picks_up_built_in_domains() {
        let registry = CapabilityRegistry::new(vec![]);
        registry.refresh();
        let snapshot = registry.snapshot();
        assert!(snapshot.lookup_exact("analysis", "analyze_path").is_some());
        assert!(snapshot.lookup_exact("script", "write_docstring").is_some());
    }

    #[test]
    fn refresh_discovers_user_scripts_under_framework_root() {
        let dir = tempdir().unwrap();
        let tool_dir = dir.path().join("summarize");
        std::fs::create_dir_all(&tool_dir).unwrap();
        std::fs::write(tool_dir.join("summarize.py"), "# handle(text)\n").unwrap();
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

        let registry = CapabilityRegistry::new(vec![dir.path().to_path_buf()]);
        registry.refresh();
        let snapshot = registry.snapshot();
        assert!(snapshot.lookup_exact("data", "summarize").is_some());
    }

    #[test]
    fn mcp_class_method_wins_duplicate_resolution() {
        let mcp = CapabilityDescriptor {
            provider: Provider::McpClassMethod,
            locator: Locator::McpMethod {
                class: "ScriptOpsDomain".into(),
                method: "read_script".into(),
            },
            ..script_descriptor("script", "read_script")
        };
        let user = script_descriptor("script", "read_script");
        let resolved = resolve_duplicates(vec![user, mcp]);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].provider, Provider::McpClassMethod);
    }

    #[test]
    fn install_policies_wires_every_discovered_capability_into_safety_policy() {
        use pulsus_common::capability::ExecutionMode;
        use pulsus_policy::PolicyDecision;

        let registry = CapabilityRegistry::new(vec![]);
        registry.refresh();
        let policy = SafetyPolicy::new();
        registry.install_policies(&policy);

        assert!(matches!(
            policy.validate_operation("analysis", "analyze_path", ExecutionMode::Plan, None, None),
            PolicyDecision::Allow
        ));
        assert!(matches!(
            policy.validate_operation("script", "write_docstring", ExecutionMode::Plan, None, None),
            PolicyDecision::Deny(_)
        ));
        assert!(matches!(
            policy.validate_operation("script", "write_docstring", ExecutionMode::Execute, None, None),
            PolicyDecision::RequireConfirm
        ));
    }

    #[test]
    fn invoke_mcp_method_dispatches_to_the_matching_domain_class() {
        let registry = CapabilityRegistry::new(vec![]);
        let env = registry
            .invoke_mcp_method("AnalysisDomain", "analyze_path", env!("CARGO_MANIFEST_DIR"))
            .unwrap();
        assert!(env.success);
    }

    #[test]
    fn invoke_mcp_method_returns_none_for_an_unregistered_class() {
        let registry = CapabilityRegistry::new(vec![]);
        assert!(registry
            .invoke_mcp_method("NoSuchDomain", "analyze_path", "x")
            .is_none());
    }

    #[test]
    fn refresh_is_visible_only_after_the_swap_completes() {
        let registry = CapabilityRegistry::new(vec![]);
        let before = registry.snapshot();
        assert!(before.is_empty());
        registry.refresh();
        let after = registry.snapshot();
        assert!(!after.is_empty());
        assert!(before.is_empty());
    }
}
