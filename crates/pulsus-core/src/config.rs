//! Recognized configuration keys (spec §6 "Configuration").
//!
//! One `serde(default)` struct per group, the way the teacher keys its
//! own subsystem configs (`config::otel::OtelConfig`) rather than a
//! single flat bag — each stage owns the slice of config it reads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub endpoint: String,
    pub name: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1/completions".to_string(),
            name: "local-default".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScorerWeights {
    pub name: f64,
    pub doc: f64,
    pub history: f64,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            name: 0.40,
            doc: 0.40,
            history: 0.20,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ScorerConfig {
    pub weights: ScorerWeights,
    pub threshold: f64,
    /// ε band used by the Policy Selector (spec §4.G), kept alongside
    /// the Scorer's own config since both read the same ranked list.
    pub epsilon: f64,
    pub history_window: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weights: ScorerWeights::default(),
            threshold: 0.60,
            epsilon: 0.05,
            history_window: 50,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    pub wall_ms: u64,
    pub mem_bytes: u64,
    pub network_on: bool,
    pub allowed_read_roots: Vec<PathBuf>,
    pub stdout_cap_bytes: usize,
    pub stderr_cap_bytes: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            wall_ms: 30_000,
            mem_bytes: 512 * 1024 * 1024,
            network_on: false,
            allowed_read_roots: Vec::new(),
            stdout_cap_bytes: 64 * 1024,
            stderr_cap_bytes: 64 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetentionConfig {
    pub scratch_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { scratch_days: 7 }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ValidatorToolingConfig {
    /// Command-line invoked for the lint stage: `{binary} {artifact_path}`.
    pub lint_command: Vec<String>,
    /// Command-line invoked for the type-check stage.
    pub typecheck_command: Vec<String>,
}

impl Default for ValidatorToolingConfig {
    fn default() -> Self {
        Self {
            lint_command: Vec::new(),
            typecheck_command: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Default)]
#[serde(default)]
pub struct PulsusConfig {
    pub framework_root: PathBuf,
    pub workflows_root: PathBuf,
    pub log_root: PathBuf,
    pub model: ModelConfig,
    pub scorer: ScorerConfig,
    pub sandbox: SandboxConfig,
    pub retention: RetentionConfig,
    pub validator: ValidatorToolingConfig,
}
