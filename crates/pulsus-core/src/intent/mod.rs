//! Intent Parser (spec §4.E, component E).
//!
//! A pure function of `(utterance, working_root, filesystem snapshot)`
//! per spec §8's idempotence law — it never calls the Generator's
//! `CompletionClient` and never mutates anything.

mod maps;

use std::path::{Path, PathBuf};

use pulsus_common::intent::ParsedIntent;

/// Marks a whitespace-separated token as an explicit path reference.
/// The spec leaves the sigil unspecified; `@` is chosen to match the
/// "reference a file" convention used by the argument-file and mention
/// syntaxes common in the rest of this ecosystem.
pub const EXPLICIT_PATH_SIGIL: char = '@';

const VERBS: &[&str] = &["analyze", "analyse", "check", "inspect", "review"];

pub fn parse(utterance: &str, working_root: &Path) -> ParsedIntent {
    let raw_tokens: Vec<String> = utterance.split_whitespace().map(str::to_string).collect();
    if raw_tokens.is_empty() {
        return ParsedIntent::empty();
    }

    let mut explicit_paths = Vec::new();
    let mut remaining = Vec::new();
    for token in &raw_tokens {
        if let Some(stripped) = token.strip_prefix(EXPLICIT_PATH_SIGIL) {
            if !stripped.is_empty() {
                explicit_paths.push(PathBuf::from(stripped));
                continue;
            }
        }
        remaining.push(token.clone());
    }

    if explicit_paths.is_empty() {
        if let Some(synthesized) = detect_implicit_path(&remaining, working_root) {
            return ParsedIntent {
                raw_tokens,
                ..synthesized
            };
        }
    }

    let action = guess_action(&remaining);
    let domain = guess_domain(&remaining);
    let mut confidence: f64 = 0.50;
    if action.is_some() {
        confidence += 0.20;
    }
    if domain.is_some() {
        confidence += 0.20;
    }
    if action.is_some() && domain.is_some() {
        confidence += 0.10;
    }

    ParsedIntent {
        domain,
        action,
        raw_tokens,
        explicit_paths,
        implicit_paths: Vec::new(),
        confidence: confidence.min(0.95),
    }
}

/// Verb-pattern implicit-path detection (spec §4.E item 2). Returns
/// `None` when no verb from [`VERBS`] is present — the caller then
/// falls through to the general action/domain-hint algorithm.
fn detect_implicit_path(remaining: &[String], working_root: &Path) -> Option<ParsedIntent> {
    let verb_index = remaining
        .iter()
        .position(|t| VERBS.contains(&t.to_lowercase().as_str()))?;

    let mut cursor = verb_index + 1;
    if remaining
        .get(cursor)
        .map(|t| t.eq_ignore_ascii_case("repository"))
        == Some(true)
    {
        cursor += 1;
    }
    let name_token = remaining.get(cursor)?;

    let candidate = working_root.join(name_token);
    if candidate.exists() {
        Some(ParsedIntent {
            domain: Some("analysis".to_string()),
            action: Some("analyze_path".to_string()),
            raw_tokens: Vec::new(),
            explicit_paths: Vec::new(),
            implicit_paths: vec![candidate],
            confidence: 0.90,
        })
    } else {
        Some(ParsedIntent {
            domain: Some("analysis".to_string()),
            action: Some("analyze_repository".to_string()),
            raw_tokens: Vec::new(),
            explicit_paths: Vec::new(),
            implicit_paths: Vec::new(),
            confidence: 0.75,
        })
    }
}

fn guess_action(tokens: &[String]) -> Option<String> {
    for token in tokens {
        let lower = token.to_lowercase();
        if let Some(canonical) = maps::canonical_action(&lower) {
            return Some(canonical.to_string());
        }
    }
    None
}

fn guess_domain(tokens: &[String]) -> Option<String> {
    for token in tokens {
        let lower = token.to_lowercase();
        if let Some(domain) = maps::domain_hint(&lower) {
            return Some(domain.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_utterance_has_zero_confidence() {
        let parsed = parse("", Path::new("."));
        assert_eq!(parsed.confidence, 0.0);
    }

    #[test]
    fn explicit_path_is_stripped_of_its_sigil() {
        let parsed = parse("summarize @data/matrix.csv", Path::new("."));
        assert_eq!(parsed.explicit_paths, vec![PathBuf::from("data/matrix.csv")]);
    }

    #[test]
    fn explicit_path_takes_precedence_over_implicit_detection() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("framework")).unwrap();
        let parsed = parse("analyse framework @other.py", dir.path());
        assert!(parsed.implicit_paths.is_empty());
        assert_eq!(parsed.explicit_paths, vec![PathBuf::from("other.py")]);
    }

    #[test]
    fn implicit_path_resolves_to_analyze_path_when_it_exists() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("framework")).unwrap();
        let parsed = parse("analyse framework", dir.path());
        assert_eq!(parsed.domain.as_deref(), Some("analysis"));
        assert_eq!(parsed.action.as_deref(), Some("analyze_path"));
        assert_eq!(parsed.confidence, 0.90);
        assert_eq!(parsed.implicit_paths, vec![dir.path().join("framework")]);
    }

    #[test]
    fn implicit_path_falls_back_to_analyze_repository_when_missing() {
        let dir = tempdir().unwrap();
        let parsed = parse("inspect nonexistent_thing", dir.path());
        assert_eq!(parsed.action.as_deref(), Some("analyze_repository"));
        assert_eq!(parsed.confidence, 0.75);
        assert!(parsed.implicit_paths.is_empty());
    }

    #[test]
    fn confidence_formula_rewards_action_and_domain_hits() {
        let parsed = parse("please summarize the data matrix", Path::new("."));
        assert_eq!(parsed.action.as_deref(), Some("summarize"));
        assert_eq!(parsed.domain.as_deref(), Some("data"));
        assert_eq!(parsed.confidence, 0.95);
    }

    #[test]
    fn british_spelling_normalizes_to_canonical_action() {
        let parsed = parse("summarise this", Path::new("."));
        assert_eq!(parsed.action.as_deref(), Some("summarize"));
    }
}
