//! Scorer (spec §4.F, component F).
//!
//! Deterministic given fixed weights, fixed history, and a fixed
//! descriptor set (spec §8 round-trip law) — no randomness, no clock
//! reads, no I/O.

use std::collections::HashMap;

use pulsus_common::capability::{tokenize, CapabilityDescriptor};
use pulsus_common::intent::ParsedIntent;
use pulsus_common::score::{ScoreBreakdown, ScoredCandidate};

use crate::config::ScorerWeights;

/// Per-descriptor invocation history the `history` component reads
/// (spec §4.F: "success rate over the most recent N invocations; 0.5
/// prior if no history").
#[derive(Debug, Clone, Default)]
pub struct InvocationHistory {
    outcomes: HashMap<(String, String), Vec<bool>>,
}

impl InvocationHistory {
    pub fn record(&mut self, domain: &str, action: &str, succeeded: bool, window: usize) {
        let entry = self
            .outcomes
            .entry((domain.to_string(), action.to_string()))
            .or_default();
        entry.push(succeeded);
        if entry.len() > window {
            let overflow = entry.len() - window;
            entry.drain(0..overflow);
        }
    }

    fn success_rate(&self, domain: &str, action: &str) -> f64 {
        match self.outcomes.get(&(domain.to_string(), action.to_string())) {
            Some(outcomes) if !outcomes.is_empty() => {
                let successes = outcomes.iter().filter(|o| **o).count();
                successes as f64 / outcomes.len() as f64
            }
            _ => 0.5,
        }
    }
}

/// Score and rank every candidate against `intent` (spec §4.F).
pub fn score_candidates(
    intent: &ParsedIntent,
    candidates: &[CapabilityDescriptor],
    history: &InvocationHistory,
    weights: &ScorerWeights,
) -> Vec<ScoredCandidate> {
    let intent_tokens: Vec<String> = tokenize(
        &[
            intent.domain.clone().unwrap_or_default(),
            intent.action.clone().unwrap_or_default(),
            intent.raw_tokens.join(" "),
        ]
        .join(" "),
    );

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .map(|descriptor| {
            let name = name_similarity(intent, descriptor);
            let doc = doc_overlap(&intent_tokens, descriptor);
            let history = history.success_rate(&descriptor.domain, &descriptor.action);
            let breakdown = ScoreBreakdown { name, doc, history };
            let score =
                weights.name * name + weights.doc * doc + weights.history * history;
            ScoredCandidate {
                descriptor: descriptor.clone(),
                score,
                score_breakdown: breakdown,
            }
        })
        .collect();

    scored.sort_by(ScoredCandidate::cmp_rank);
    scored
}

/// Token-set similarity between the parsed `(domain, action)` and the
/// descriptor's, tolerant to the action-synonym map. Both sides are
/// already canonicalized by the Intent Parser, so an exact match is
/// the common case and scores full marks; a near-miss (a synonym the
/// maps table doesn't yet cover, or a typo in a user-script manifest's
/// `action` field) still earns partial credit via string similarity
/// rather than dropping straight to zero.
fn name_similarity(intent: &ParsedIntent, descriptor: &CapabilityDescriptor) -> f64 {
    let domain_sim = component_similarity(intent.domain.as_deref(), &descriptor.domain);
    let action_sim = component_similarity(intent.action.as_deref(), &descriptor.action);
    (domain_sim + action_sim) / 2.0
}

fn component_similarity(parsed: Option<&str>, descriptor_value: &str) -> f64 {
    match parsed {
        Some(value) if value == descriptor_value => 1.0,
        Some(value) => strsim::jaro_winkler(value, descriptor_value),
        None => 0.0,
    }
}

fn doc_overlap(intent_tokens: &[String], descriptor: &CapabilityDescriptor) -> f64 {
    if intent_tokens.is_empty() {
        return 0.0;
    }
    let descriptor_tokens = descriptor.tokens();
    let hits = intent_tokens
        .iter()
        .filter(|t| descriptor_tokens.contains(t))
        .count();
    hits as f64 / intent_tokens.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsus_common::capability::{Locator, Provider, SafetyLevel};

    fn descriptor(domain: &str, action: &str, description: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            domain: domain.to_string(),
            action: action.to_string(),
            safety_level: SafetyLevel::ReadOnly,
            parameters: vec![],
            description: description.to_string(),
            provider: Provider::UserScript,
            locator: Locator::ScriptModule {
                module_path: "x.py".into(),
                entry_fn: "handle".into(),
            },
        }
    }

    #[test]
    fn exact_domain_action_match_scores_highest() {
        let intent = ParsedIntent {
            domain: Some("data".into()),
            action: Some("summarize".into()),
            raw_tokens: vec!["summarize".into(), "matrix".into()],
            confidence: 0.9,
            ..Default::default()
        };
        let candidates = vec![
            descriptor("data", "summarize", "Summarize the input data matrix."),
            descriptor("io", "load_csv", "Load rows from a CSV file."),
        ];
        let history = InvocationHistory::default();
        let ranked = score_candidates(&intent, &candidates, &history, &ScorerWeights::default());
        assert_eq!(ranked[0].descriptor.action, "summarize");
        assert!(ranked[0].score > ranked[1].score);
    }

    #[test]
    fn scoring_is_deterministic_given_fixed_inputs() {
        let intent = ParsedIntent {
            domain: Some("data".into()),
            action: Some("summarize".into()),
            raw_tokens: vec!["summarize".into()],
            confidence: 0.9,
            ..Default::default()
        };
        let candidates = vec![descriptor("data", "summarize", "Summarize data.")];
        let history = InvocationHistory::default();
        let weights = ScorerWeights::default();
        let first = score_candidates(&intent, &candidates, &history, &weights);
        let second = score_candidates(&intent, &candidates, &history, &weights);
        assert_eq!(first[0].score, second[0].score);
    }

    #[test]
    fn history_defaults_to_a_half_prior_with_no_track_record() {
        let history = InvocationHistory::default();
        assert_eq!(history.success_rate("data", "summarize"), 0.5);
    }

    #[test]
    fn history_window_drops_the_oldest_outcomes() {
        let mut history = InvocationHistory::default();
        for _ in 0..3 {
            history.record("data", "summarize", false, 2);
        }
        history.record("data", "summarize", true, 2);
        // Window of 2 keeps only the last two outcomes: [false, true].
        assert_eq!(history.success_rate("data", "summarize"), 0.5);
    }
}
