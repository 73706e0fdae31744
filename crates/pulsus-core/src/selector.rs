//! Policy Selector (spec §4.G, component G).

use pulsus_common::decision::Policy;
use pulsus_common::intent::ParsedIntent;
use pulsus_common::score::ScoredCandidate;

pub const CANONICAL_PATH_CAPABILITY: (&str, &str) = ("analysis", "analyze_path");

/// Decide SELECT vs COMPOSE vs GENERATE from the ranked candidate list
/// (spec §4.G).
///
/// `composable` type-tag matching is left to the caller to keep this
/// function pure and testable: the spec only says parameter shapes
/// must be "inferred from type tags" without specifying a concrete
/// notion of a capability's output type, so the compatibility check
/// lives in [`are_composable`] as an explicit, documented choice
/// (two descriptors are composable when they share at least one
/// parameter type tag) rather than being invented inline here.
pub fn select_policy(intent: &ParsedIntent, ranked: &[ScoredCandidate], threshold: f64, epsilon: f64) -> Policy {
    if !intent.explicit_paths.is_empty() {
        return if ranked
            .iter()
            .any(|c| c.descriptor.key() == CANONICAL_PATH_CAPABILITY)
        {
            Policy::Select
        } else {
            Policy::Generate
        };
    }

    let Some(top) = ranked.first() else {
        return Policy::Generate;
    };

    let within_band: Vec<&ScoredCandidate> = ranked
        .iter()
        .filter(|c| top.score - c.score <= epsilon)
        .collect();

    if top.score >= threshold && within_band.len() == 1 {
        return Policy::Select;
    }

    if within_band.len() >= 2 {
        for i in 0..within_band.len() {
            for j in (i + 1)..within_band.len() {
                if are_composable(&within_band[i].descriptor, &within_band[j].descriptor) {
                    return Policy::Compose;
                }
            }
        }
    }

    Policy::Generate
}

pub fn are_composable(
    a: &pulsus_common::capability::CapabilityDescriptor,
    b: &pulsus_common::capability::CapabilityDescriptor,
) -> bool {
    use pulsus_common::capability::Locator;
    // Only script-backed steps have a module file the Composer can
    // inline (component H has no bridge to a built-in MCP method).
    if !matches!(a.locator, Locator::ScriptModule { .. })
        || !matches!(b.locator, Locator::ScriptModule { .. })
    {
        return false;
    }
    a.parameters
        .iter()
        .any(|pa| b.parameters.iter().any(|pb| pa.type_tag == pb.type_tag))
}
