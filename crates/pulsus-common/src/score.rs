//! Scorer output (spec §3 "ScoredCandidate", §4.F).

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityDescriptor;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub name: f64,
    pub doc: f64,
    pub history: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub descriptor: CapabilityDescriptor,
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
}

impl ScoredCandidate {
    /// Deterministic tie-break order (spec §4.F): higher `score`, then
    /// higher `name` component, then higher `doc` component, then
    /// alphabetical `(domain, action)`.
    pub fn cmp_rank(&self, other: &Self) -> std::cmp::Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                other
                    .score_breakdown
                    .name
                    .partial_cmp(&self.score_breakdown.name)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| {
                other
                    .score_breakdown
                    .doc
                    .partial_cmp(&self.score_breakdown.doc)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| self.descriptor.key().cmp(&other.descriptor.key()))
    }
}
