//! Router (spec §4.L, component L).
//!
//! Orchestrates E→F→G→(H|I)→J→decision and emits an audit event at
//! every state-machine transition. The one public entry point of this
//! crate.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use pulsus_audit::AuditLogger;
use pulsus_common::capability::ExecutionMode;
use pulsus_common::decision::{Policy, RouteDecision, ValidationReport};
use pulsus_common::error::PulsusError;
use pulsus_common::score::ScoredCandidate;
use pulsus_policy::{CompiledAllowlist, PolicyDecision, SafetyPolicy};
use pulsus_registry::CapabilityRegistry;
use pulsus_sandbox::SandboxExecutor;

use crate::config::PulsusConfig;
use crate::generator::{self, CompletionClient, CompletionConstraints};
use crate::scorer::{self, InvocationHistory};
use crate::selector;
use crate::{composer, intent, validate};

/// How many "see also" candidates the Generator is shown (spec §4.I).
const NEARBY_COUNT: usize = 3;

#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub mode: ExecutionMode,
    pub caller_id: String,
    pub session_id: String,
    pub confirmation_token: Option<String>,
    pub dry_run: bool,
    pub deadline: Option<std::time::Duration>,
}

impl Default for RouteOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            caller_id: "unknown".to_string(),
            session_id: "unknown".to_string(),
            confirmation_token: None,
            dry_run: false,
            deadline: None,
        }
    }
}

/// The assembled pipeline: one instance is shared across routing
/// cycles (spec §5 "multiple routing cycles may proceed in parallel in
/// separate tasks").
pub struct Router {
    pub registry: CapabilityRegistry,
    pub policy: SafetyPolicy,
    pub audit: AuditLogger,
    pub sandbox: SandboxExecutor,
    pub completion_client: Arc<dyn CompletionClient>,
    pub config: PulsusConfig,
    /// Compiled `sandbox.allowlist` document (spec SPEC_FULL.md §4.C
    /// "compiled policy"), checked against every artifact path ahead
    /// of sandbox execution. `None` when the embedder loaded policy
    /// through [`SafetyPolicy::new`] rather than
    /// [`SafetyPolicy::from_yaml`] — every artifact is then let through
    /// to the sandbox, which still enforces its own `allowed_read_roots`.
    pub allowlist: Option<CompiledAllowlist>,
    history: Mutex<InvocationHistory>,
}

impl Router {
    pub fn new(
        registry: CapabilityRegistry,
        policy: SafetyPolicy,
        audit: AuditLogger,
        sandbox: SandboxExecutor,
        completion_client: Arc<dyn CompletionClient>,
        config: PulsusConfig,
    ) -> Self {
        Self {
            registry,
            policy,
            audit,
            sandbox,
            completion_client,
            config,
            allowlist: None,
            history: Mutex::new(InvocationHistory::default()),
        }
    }

    /// Attach a compiled allowlist (spec SPEC_FULL.md §4.C), e.g. the
    /// one returned alongside a [`SafetyPolicy`] by
    /// [`SafetyPolicy::from_yaml`].
    pub fn with_allowlist(mut self, allowlist: CompiledAllowlist) -> Self {
        self.allowlist = Some(allowlist);
        self
    }

    /// `route(utterance, options) → RouteDecision` (spec §4.L, §6).
    pub async fn route(&self, utterance: &str, options: RouteOptions) -> RouteDecision {
        let run_id = uuid::Uuid::new_v4().to_string();
        let route_id = format!("route-{run_id}");
        let mode_snapshot = self.policy.snapshot_mode();

        let cycle = self.route_inner(utterance, &options, &run_id, &route_id, mode_snapshot.mode());

        // honor an outer deadline (spec §5 "Cancellation & timeouts":
        // every stage accepts a deadline; the `route()` call honors an
        // outer cancellation signal by aborting at the next suspension
        // point — `tokio::time::timeout` races the whole cycle and
        // fires between awaits, i.e. at those suspension points).
        let outcome = match options.deadline {
            Some(deadline) => match tokio::time::timeout(deadline, cycle).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(run_id = %run_id, "routing cycle exceeded its deadline");
                    self.record(&run_id, "timed_out", &route_id, serde_json::json!({}));
                    self.audit.flush();
                    return RouteDecision::new(
                        Policy::Generate,
                        PathBuf::new(),
                        Vec::new(),
                        ValidationReport::default(),
                        run_id,
                        Some("routing cycle exceeded its deadline".to_string()),
                    );
                }
            },
            None => cycle.await,
        };

        match outcome {
            Ok(decision) => {
                self.audit.flush();
                decision
            }
            Err(e) => {
                tracing::error!(error = %e, run_id = %run_id, "routing cycle failed");
                self.record(&run_id, "failed", &route_id, serde_json::json!({"error": e.to_string()}));
                self.audit.flush();
                RouteDecision::new(
                    Policy::Generate,
                    PathBuf::new(),
                    Vec::new(),
                    ValidationReport::default(),
                    run_id,
                    Some(e.to_string()),
                )
            }
        }
    }

    async fn route_inner(
        &self,
        utterance: &str,
        options: &RouteOptions,
        run_id: &str,
        route_id: &str,
        mode: ExecutionMode,
    ) -> Result<RouteDecision, PulsusError> {
        // PARSING
        self.record(run_id, "parsing", route_id, serde_json::json!({"utterance": utterance}));
        let working_root = self.config.workflows_root.clone();
        let parsed = intent::parse(utterance, &working_root);

        // DISCOVERED
        let snapshot = self.registry.snapshot();
        let candidates: Vec<_> = snapshot.all().into_iter().cloned().collect();
        let history = self.history.lock().expect("history lock poisoned");
        let ranked = scorer::score_candidates(&parsed, &candidates, &history, &self.config.scorer.weights);
        drop(history);
        self.record(
            run_id,
            "discovered",
            route_id,
            serde_json::json!({"candidate_count": ranked.len()}),
        );

        // POLICY_CHOSEN
        let effective_mode = if options.dry_run { ExecutionMode::Plan } else { mode };
        let policy = selector::select_policy(&parsed, &ranked, self.config.scorer.threshold, self.config.scorer.epsilon);
        self.record(
            run_id,
            "policy_chosen",
            route_id,
            serde_json::json!({"policy": format!("{policy:?}")}),
        );

        // Safety check ahead of materialization/validation (spec §4.C):
        // a SELECT of an existing write-capable tool is gated the same
        // way a generated/composed one would be once invoked for real.
        //
        // A gate failure here is a real routing outcome, not an
        // internal error: it must come back as a BLOCKED `RouteDecision`
        // with `policy=Select` and a `ValidationReport` whose `dryrun`
        // diagnostic names the block (spec §8 scenario 4), the same
        // shape every other validation failure takes — never as an
        // `Err` threaded up to `route()`'s generic failure arm, which
        // spec §7's propagation policy reserves for `InternalError`.
        if let Policy::Select = policy {
            if let Some(top) = ranked.first() {
                let value_type_tag = top.descriptor.parameters.first().map(|p| p.type_tag.as_str());
                let decision = self.policy.validate_operation(
                    &top.descriptor.domain,
                    &top.descriptor.action,
                    effective_mode,
                    options.confirmation_token.as_ref(),
                    value_type_tag,
                );
                let blocked_reason = match decision {
                    PolicyDecision::Allow => None,
                    PolicyDecision::Deny(reason) => Some(reason),
                    PolicyDecision::RequireConfirm => {
                        Some("write-safe operation requires a confirmation token".to_string())
                    }
                };
                if let Some(reason) = blocked_reason {
                    // `finish_cycle` itself records the "blocked" phase
                    // (with the same reason, via `failing_diagnostics`)
                    // once the `ValidationReport` below is in hand.
                    let artifact_path = self.locator_path(&top.descriptor.locator);
                    let validation = policy_blocked_report(&reason);
                    return self.finish_cycle(policy, artifact_path, ranked, validation, run_id, route_id);
                }
            }
        }

        // A SELECTed built-in MCP capability has no module file at all,
        // so it never goes through the Python-subprocess-based stages
        // built for script artifacts (composed/generated modules, and
        // SELECTed user scripts): it gets its own in-process validation
        // path instead (spec §4.D item 2, §4.J).
        if let Policy::Select = policy {
            if let Some(top) = ranked.first() {
                if let pulsus_common::capability::Locator::McpMethod { class, method } = &top.descriptor.locator {
                    let artifact_path = self.locator_path(&top.descriptor.locator);
                    self.record(
                        run_id,
                        "validating",
                        route_id,
                        serde_json::json!({
                            "artifact": artifact_path.display().to_string(),
                            "provider": "mcp_class_method",
                        }),
                    );
                    let validation = self.validate_mcp_method(class, method, utterance, run_id, route_id);
                    return self.finish_cycle(policy, artifact_path, ranked, validation, run_id, route_id);
                }
            }
        }

        // MATERIALIZING (COMPOSE | GENERATE) | straight to VALIDATING (SELECT of a script)
        let scratch_dir = self.config.workflows_root.join("route_tmp");
        let artifact_path = match policy {
            Policy::Select => {
                let Some(top) = ranked.first() else {
                    return Err(PulsusError::NoCandidates);
                };
                self.locator_path(&top.descriptor.locator)
            }
            Policy::Compose => {
                self.record(run_id, "materializing", route_id, serde_json::json!({"policy": "compose"}));
                let within_band = composable_pair(&ranked, self.config.scorer.epsilon)
                    .ok_or(PulsusError::NoCandidates)?;
                let steps = vec![within_band.0.descriptor.clone(), within_band.1.descriptor.clone()];
                let module = composer::compose(&steps, utterance, &scratch_dir, run_id)
                    .map_err(|e| PulsusError::InternalError { detail: e.to_string() })?;
                module.path
            }
            Policy::Generate => {
                self.record(run_id, "materializing", route_id, serde_json::json!({"policy": "generate"}));
                let nearby: Vec<_> = ranked.iter().take(NEARBY_COUNT).map(|c| c.descriptor.clone()).collect();
                let constraints = CompletionConstraints {
                    temperature: self.config.model.temperature,
                    max_tokens: self.config.model.max_tokens,
                    stop: Vec::new(),
                };
                let generated = generator::generate(self.completion_client.as_ref(), utterance, &parsed, &nearby, &constraints)
                    .await
                    .map_err(|e| PulsusError::GeneratorFailure { detail: e.to_string() })?;
                let run_dir = scratch_dir.join(run_id);
                std::fs::create_dir_all(&run_dir)
                    .map_err(|e| PulsusError::InternalError { detail: e.to_string() })?;
                let path = run_dir.join("generated.py");
                std::fs::write(&path, &generated.source)
                    .map_err(|e| PulsusError::InternalError { detail: e.to_string() })?;
                path
            }
        };

        // VALIDATING (script-backed artifact: SELECTed user script, COMPOSE, or GENERATE)
        self.record(run_id, "validating", route_id, serde_json::json!({"artifact": artifact_path.display().to_string()}));

        if let Some(allowlist) = &self.allowlist {
            let path_str = artifact_path.display().to_string();
            if !allowlist.path_is_readable(&path_str) {
                let validation = ValidationReport {
                    lint: pulsus_common::decision::StageResult::fail(
                        0,
                        vec![format!("artifact path `{path_str}` is outside the compiled sandbox allowlist")],
                    ),
                    ..ValidationReport::default()
                };
                return self.finish_cycle(policy, artifact_path, ranked, validation, run_id, route_id);
            }
        }

        let tooling = self.config.validator.clone();
        let sandbox_config = self.config.sandbox.clone();
        let validation = validate::validate(&artifact_path, utterance, &tooling, &sandbox_config, &self.sandbox);

        for (stage_name, stage) in [
            ("lint", &validation.lint),
            ("typecheck", &validation.typecheck),
            ("import", &validation.import),
            ("dryrun", &validation.dryrun),
        ] {
            self.audit.record_validation(
                run_id,
                route_id,
                &artifact_path.display().to_string(),
                stage_name,
                serde_json::json!({"passed": stage.passed, "duration_ms": stage.duration_ms}),
            );
        }

        self.finish_cycle(policy, artifact_path, ranked, validation, run_id, route_id)
    }

    /// Shared tail of a routing cycle once a `ValidationReport` exists,
    /// regardless of which validation path produced it (script-based
    /// subprocess stages, or the in-process MCP-method path): records
    /// invocation history, then either BLOCKED or AWAITING_APPROVAL.
    fn finish_cycle(
        &self,
        policy: Policy,
        artifact_path: PathBuf,
        ranked: Vec<ScoredCandidate>,
        validation: ValidationReport,
        run_id: &str,
        route_id: &str,
    ) -> Result<RouteDecision, PulsusError> {
        if let Some(top) = ranked.first() {
            let mut history = self.history.lock().expect("history lock poisoned");
            history.record(&top.descriptor.domain, &top.descriptor.action, validation.all_passed(), self.config.scorer.history_window);
        }

        if !validation.all_passed() {
            self.record(run_id, "blocked", route_id, serde_json::json!({"diagnostics": validation.failing_diagnostics()}));
            let error = Some(validation.failing_diagnostics().join("; "));
            return Ok(RouteDecision::new(policy, artifact_path, ranked, validation, run_id.to_string(), error));
        }

        // AWAITING_APPROVAL — approval itself happens out of band; a
        // caller accepts this RouteDecision and invokes the artifact,
        // or rejects it (spec §4.L terminal states).
        self.record(run_id, "awaiting_approval", route_id, serde_json::json!({}));
        Ok(RouteDecision::new(policy, artifact_path, ranked, validation, run_id.to_string(), None))
    }

    /// Validate a SELECTed built-in MCP capability (spec §4.D item 2):
    /// lint/type-check/import-load have nothing to check (there is no
    /// module file, just a method already compiled into this binary),
    /// so they pass trivially; only the dry-run stage does real work,
    /// invoking the method in-process instead of spawning the
    /// Python-subprocess driver the script-artifact stages use.
    fn validate_mcp_method(
        &self,
        class: &str,
        method: &str,
        utterance: &str,
        run_id: &str,
        route_id: &str,
    ) -> ValidationReport {
        use pulsus_common::decision::StageResult;

        let mut report = ValidationReport {
            lint: StageResult::pass(0),
            typecheck: StageResult::pass(0),
            import: StageResult::pass(0),
            ..ValidationReport::default()
        };

        let started = std::time::Instant::now();
        let envelope = self.registry.invoke_mcp_method(class, method, utterance);
        let duration_ms = started.elapsed().as_millis() as u64;
        report.dryrun = match envelope {
            Some(_) => StageResult::pass(duration_ms),
            None => StageResult::fail(
                duration_ms,
                vec![format!("no registered MCP domain class `{class}`")],
            ),
        };

        let module = format!("{class}::{method}");
        for (stage_name, stage) in [
            ("lint", &report.lint),
            ("typecheck", &report.typecheck),
            ("import", &report.import),
            ("dryrun", &report.dryrun),
        ] {
            self.audit.record_validation(
                run_id,
                route_id,
                &module,
                stage_name,
                serde_json::json!({"passed": stage.passed, "duration_ms": stage.duration_ms}),
            );
        }

        report
    }

    fn locator_path(&self, locator: &pulsus_common::capability::Locator) -> PathBuf {
        match locator {
            pulsus_common::capability::Locator::ScriptModule { module_path, .. } => {
                PathBuf::from(module_path)
            }
            pulsus_common::capability::Locator::McpMethod { class, method } => {
                PathBuf::from(format!("<builtin:{class}::{method}>"))
            }
        }
    }

    fn record(&self, run_id: &str, phase: &str, route_id: &str, payload: serde_json::Value) {
        self.audit.record(run_id, phase, route_id, payload);
    }
}

/// A `ValidationReport` for a SELECT blocked by [`SafetyPolicy`] before
/// any stage ran (spec §8 scenario 4). There is nothing to lint,
/// type-check, or import-load — the artifact was never touched — so
/// those three stages pass trivially, the same convention
/// [`Router::validate_mcp_method`] uses for an in-process capability;
/// only `dryrun` carries the failure, with `reason` as its diagnostic.
fn policy_blocked_report(reason: &str) -> ValidationReport {
    use pulsus_common::decision::StageResult;
    ValidationReport {
        lint: StageResult::pass(0),
        typecheck: StageResult::pass(0),
        import: StageResult::pass(0),
        dryrun: StageResult::fail(0, vec![reason.to_string()]),
    }
}

/// Find the first composable pair within the ε-band near the top score
/// (mirrors the check [`selector::select_policy`] used to choose
/// COMPOSE, so materialization picks the same pair).
fn composable_pair<'a>(
    ranked: &'a [ScoredCandidate],
    epsilon: f64,
) -> Option<(&'a ScoredCandidate, &'a ScoredCandidate)> {
    let top_score = ranked.first()?.score;
    let within_band: Vec<&ScoredCandidate> = ranked.iter().filter(|c| top_score - c.score <= epsilon).collect();
    for i in 0..within_band.len() {
        for j in (i + 1)..within_band.len() {
            if selector::are_composable(&within_band[i].descriptor, &within_band[j].descriptor) {
                return Some((within_band[i], within_band[j]));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulsus_common::capability::SafetyLevel;
    use tempfile::tempdir;

    struct StubClient;

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _constraints: &CompletionConstraints,
        ) -> Result<String, generator::GeneratorError> {
            Ok("domain = \"generated\"\naction = \"handle_request\"\n\ndef handle(text):\n    return {\"success\": True, \"data\": {}, \"error\": None, \"status\": \"success\", \"context\": {}, \"trace\": [], \"metadata\": {}}\n".to_string())
        }
    }

    fn test_router(workflows_root: PathBuf) -> Router {
        let mut config = PulsusConfig::default();
        config.workflows_root = workflows_root;
        config.validator.lint_command = Vec::new();
        config.validator.typecheck_command = Vec::new();

        let registry = CapabilityRegistry::new(vec![]);
        registry.refresh();
        let policy = SafetyPolicy::new();
        registry.install_policies(&policy);
        policy.register_operation("generated", "handle_request", SafetyLevel::ReadOnly, false, vec![]);
        let audit = AuditLogger::new(config.workflows_root.join("logs"));
        let mut read_roots = vec![config.workflows_root.clone()];
        read_roots.extend(config.sandbox.allowed_read_roots.clone());
        let sandbox = SandboxExecutor::new(read_roots);

        Router::new(registry, policy, audit, sandbox, Arc::new(StubClient), config)
    }

    #[tokio::test]
    async fn selecting_an_existing_read_only_capability_reaches_awaiting_approval() {
        let dir = tempdir().unwrap();
        let router = test_router(dir.path().to_path_buf());
        let decision = router
            .route("analyze the repository", RouteOptions::default())
            .await;
        assert_eq!(decision.policy, Policy::Select);
        assert!(decision.error.is_none());
    }

    #[tokio::test]
    async fn plan_mode_blocks_a_write_safe_select() {
        let dir = tempdir().unwrap();
        let router = test_router(dir.path().to_path_buf());

        // Force a SELECT of a write-capable capability by registering
        // one as an additional domain under a dedicated root.
        let tool_dir = dir.path().join("tools").join("write_docstring");
        std::fs::create_dir_all(&tool_dir).unwrap();
        std::fs::write(tool_dir.join("write_docstring.py"), "def handle(text):\n    pass\n").unwrap();
        std::fs::write(
            tool_dir.join("manifest.json"),
            serde_json::json!({
                "domain": "script",
                "action": "write_docstring",
                "description": "Write a docstring for the given script.",
                "module": "write_docstring.py"
            })
            .to_string(),
        )
        .unwrap();
        router.registry.refresh();

        let options = RouteOptions {
            mode: ExecutionMode::Plan,
            ..RouteOptions::default()
        };
        let decision = router.route("write a docstring for this script", options).await;
        assert_eq!(decision.policy, Policy::Select);
        assert!(decision.error.is_some());
        assert!(!decision.is_approved());
        assert!(!decision.validation.dryrun.passed);
        assert!(decision
            .validation
            .dryrun
            .diagnostics
            .iter()
            .any(|d| d.contains("plan mode blocks writes")));

        // No file-write side effect under the scratch directory (spec
        // §8 "no side effect is observable" for a plan-mode block).
        let scratch = dir.path().join("route_tmp");
        assert!(!scratch.exists() || std::fs::read_dir(&scratch).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn an_artifact_outside_the_compiled_allowlist_is_blocked_before_sandboxing() {
        let dir = tempdir().unwrap();
        let router = test_router(dir.path().to_path_buf()).with_allowlist(CompiledAllowlist::empty());
        let decision = router
            .route("frobnicate the zorblax quantum widget", RouteOptions::default())
            .await;
        assert!(decision.error.is_some());
        assert!(!decision.validation.lint.passed);
        assert!(decision.validation.lint.diagnostics[0].contains("allowlist"));
    }

    #[tokio::test]
    async fn no_existing_match_falls_through_to_generate() {
        let dir = tempdir().unwrap();
        let router = test_router(dir.path().to_path_buf());
        let decision = router
            .route("frobnicate the zorblax quantum widget", RouteOptions::default())
            .await;
        assert_eq!(decision.policy, Policy::Generate);
        assert!(decision.error.is_none());
        assert!(decision.artifact_path.exists());
    }

    struct SlowClient;

    #[async_trait]
    impl CompletionClient for SlowClient {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _constraints: &CompletionConstraints,
        ) -> Result<String, generator::GeneratorError> {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            Ok("def handle(text):\n    pass\n".to_string())
        }
    }

    #[tokio::test]
    async fn an_outer_deadline_aborts_a_still_running_cycle() {
        let dir = tempdir().unwrap();
        let mut config = PulsusConfig::default();
        config.workflows_root = dir.path().to_path_buf();
        let registry = CapabilityRegistry::new(vec![]);
        registry.refresh();
        let policy = SafetyPolicy::new();
        let audit = AuditLogger::new(config.workflows_root.join("logs"));
        let sandbox = SandboxExecutor::new(vec![config.workflows_root.clone()]);
        let router = Router::new(registry, policy, audit, sandbox, Arc::new(SlowClient), config);

        let options = RouteOptions {
            deadline: Some(std::time::Duration::from_millis(20)),
            ..RouteOptions::default()
        };
        let decision = router.route("frobnicate the zorblax quantum widget", options).await;
        assert!(!decision.is_approved());
        assert!(decision.error.as_deref().unwrap_or_default().contains("deadline"));
    }
}
