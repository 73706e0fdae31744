//! Router output (spec §3 "RouteDecision", "ValidationReport", §4.L).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::score::ScoredCandidate;

/// The three routing strategies (spec §1, §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    Select,
    Compose,
    Generate,
}

/// Pass/fail result of one validator stage (spec §3 "StageResult").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageResult {
    pub passed: bool,
    pub duration_ms: u64,
    #[serde(default)]
    pub diagnostics: Vec<String>,
}

impl StageResult {
    pub fn pass(duration_ms: u64) -> Self {
        Self {
            passed: true,
            duration_ms,
            diagnostics: Vec::new(),
        }
    }

    pub fn fail(duration_ms: u64, diagnostics: Vec<String>) -> Self {
        Self {
            passed: false,
            duration_ms,
            diagnostics,
        }
    }
}

/// Four-stage validation outcome (spec §3 "ValidationReport", §4.J).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    pub lint: StageResult,
    pub typecheck: StageResult,
    pub import: StageResult,
    pub dryrun: StageResult,
}

impl ValidationReport {
    pub fn all_passed(&self) -> bool {
        self.lint.passed && self.typecheck.passed && self.import.passed && self.dryrun.passed
    }

    /// Diagnostics of the first stage (in pipeline order) that failed,
    /// or an empty slice if every stage passed.
    pub fn failing_diagnostics(&self) -> &[String] {
        for stage in [&self.lint, &self.typecheck, &self.import, &self.dryrun] {
            if !stage.passed {
                return &stage.diagnostics;
            }
        }
        &[]
    }
}

/// Returned by [`RouteDecision::approve`] when the validation report did
/// not fully pass (spec §8 universal invariant: "approved=true implies
/// validation.{lint,typecheck,import,dryrun}.passed=true").
#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot approve a route decision whose validation did not fully pass")]
pub struct NotValidatedError;

/// Router output (spec §3 "RouteDecision").
///
/// `approved` is private: the only way to flip it is [`Self::approve`],
/// which checks the §8 invariant structurally, the same way
/// [`crate::envelope::Envelope`] enforces `success <-> error=None`
/// through its own private-constructor pattern rather than trusting
/// callers to keep the fields in sync by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub policy: Policy,
    pub artifact_path: PathBuf,
    pub candidates: Vec<ScoredCandidate>,
    pub validation: ValidationReport,
    approved: bool,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteDecision {
    /// Build a not-yet-approved decision (spec §3: "approved: bool
    /// (populated after user decision; initially false)").
    pub fn new(
        policy: Policy,
        artifact_path: PathBuf,
        candidates: Vec<ScoredCandidate>,
        validation: ValidationReport,
        run_id: String,
        error: Option<String>,
    ) -> Self {
        Self {
            policy,
            artifact_path,
            candidates,
            validation,
            approved: false,
            run_id,
            error,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approved
    }

    /// Guarded transition into the APPROVED terminal state (spec §4.L).
    /// Refuses to set `approved=true` unless every validation stage
    /// passed, so the invariant cannot be violated by a caller setting
    /// a bare field.
    pub fn approve(mut self) -> Result<Self, NotValidatedError> {
        if !self.validation.all_passed() {
            return Err(NotValidatedError);
        }
        self.approved = true;
        Ok(self)
    }

    /// Canonical JSON-safe representation for a terminal to render
    /// (spec §6 "RouteDecision.to_dict()").
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_requires_all_stages_passed() {
        // Spec §8 invariant: approved=true implies every stage passed.
        let mut report = ValidationReport::default();
        report.lint = StageResult::pass(1);
        report.typecheck = StageResult::pass(1);
        report.import = StageResult::pass(1);
        report.dryrun = StageResult::fail(1, vec!["boom".into()]);
        assert!(!report.all_passed());

        let decision = RouteDecision::new(Policy::Select, PathBuf::new(), Vec::new(), report, "run-1".into(), None);
        let err = decision.approve().unwrap_err();
        assert_eq!(err.to_string(), "cannot approve a route decision whose validation did not fully pass");
    }

    #[test]
    fn a_fully_passed_validation_report_can_be_approved() {
        let mut report = ValidationReport::default();
        report.lint = StageResult::pass(1);
        report.typecheck = StageResult::pass(1);
        report.import = StageResult::pass(1);
        report.dryrun = StageResult::pass(1);

        let decision = RouteDecision::new(Policy::Select, PathBuf::new(), Vec::new(), report, "run-1".into(), None);
        let decision = decision.approve().expect("fully passed report should approve");
        assert!(decision.is_approved());
    }
}
