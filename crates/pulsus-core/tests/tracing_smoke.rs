//! Confirms `route()` emits operator-facing `tracing` diagnostics
//! distinct from the audit trail (SPEC_FULL.md §AMBIENT STACK: "Audit
//! events are *data*; `tracing` events are *operational* logs").
//!
//! Grounded on the teacher's own tracing-capture tests
//! (`assay-core/tests/otel_contract.rs`), scaled down to a single
//! assertion: a routing cycle that blows its deadline logs a `WARN`
//! event, independent of whatever the audit logger records.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pulsus_audit::AuditLogger;
use pulsus_common::capability::ExecutionMode;
use pulsus_core::{generator, CompletionConstraints, CompletionClient, PulsusConfig, RouteOptions, Router};
use pulsus_policy::SafetyPolicy;
use pulsus_registry::CapabilityRegistry;
use pulsus_sandbox::SandboxExecutor;
use serial_test::serial;
use tempfile::tempdir;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct CapturingWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl std::io::Write for CapturingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturingWriter {
    type Writer = CapturingWriter;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
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
#[serial]
async fn a_blown_deadline_logs_an_operator_facing_warn_event() {
    let writer = CapturingWriter::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .json()
        .with_max_level(tracing::Level::WARN)
        .finish();

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
        mode: ExecutionMode::Execute,
        ..RouteOptions::default()
    };

    let _guard = tracing::subscriber::set_default(subscriber);
    let _ = router.route("frobnicate the zorblax quantum widget", options).await;
    drop(_guard);

    let output = String::from_utf8(writer.buf.lock().unwrap().clone()).unwrap();
    assert!(
        output.contains("exceeded its deadline"),
        "expected a WARN tracing event about the blown deadline, got: {output}"
    );
}
