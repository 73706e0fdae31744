//! Capability descriptors and the safety/execution enums that gate them
//! (spec §3 "Capability descriptor", §2 component A).

use serde::{Deserialize, Serialize};

/// Declared safety level of an operation. Closed set — see
/// [`crate::error::PulsusError`] for how an unknown value on the wire is
/// handled (rejected, never defaulted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    ReadOnly,
    WriteSafe,
    RestrictedWrite,
    Transactional,
    Cached,
}

/// Process-global execution mode dial (spec §3 "ExecutionMode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Only `read_only` and `cached` capabilities may run.
    Plan,
    /// Writes allowed; `write_safe` requires a confirmation token.
    Execute,
    /// All operations permitted without confirmation. Tests only.
    Unsafe,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Execute
    }
}

/// Who provided a capability: a built-in MCP domain class, or a
/// discovered user script (spec §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    McpClassMethod,
    UserScript,
}

impl Provider {
    /// Duplicate `(domain, action)` resolution order: MCP class methods
    /// win over user scripts (spec §4.D).
    pub fn preference_rank(self) -> u8 {
        match self {
            Provider::McpClassMethod => 0,
            Provider::UserScript => 1,
        }
    }
}

/// One declared parameter of a capability's `handle`/method signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub type_tag: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Opaque reference to where a capability actually lives: a compiled-in
/// class+method id, or a scratch/framework module path plus its entry
/// function name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    McpMethod { class: String, method: String },
    ScriptModule { module_path: String, entry_fn: String },
}

/// One operation exposed to routing (spec §3 "Capability descriptor").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub domain: String,
    pub action: String,
    pub safety_level: SafetyLevel,
    pub parameters: Vec<Parameter>,
    pub description: String,
    pub provider: Provider,
    pub locator: Locator,
}

impl CapabilityDescriptor {
    pub fn key(&self) -> (&str, &str) {
        (self.domain.as_str(), self.action.as_str())
    }

    /// Lowercased, stopword-free tokens of the domain, action and
    /// description — the index the Scorer's `doc` component reads
    /// (spec §4.F).
    pub fn tokens(&self) -> Vec<String> {
        tokenize(&format!("{} {} {}", self.domain, self.action, self.description))
    }
}

/// Shared lowercased, stopword-free tokenizer used for both capability
/// descriptions and parsed utterances, so the Scorer's `doc` component
/// (spec §4.F) compares like with like.
pub fn tokenize(text: &str) -> Vec<String> {
    const STOPWORDS: &[&str] = &[
        "a", "an", "the", "of", "to", "and", "or", "in", "on", "for", "with", "is", "this",
        "that", "into",
    ];
    let mut out = Vec::new();
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let lower = word.to_lowercase();
        if !STOPWORDS.contains(&lower.as_str()) {
            out.push(lower);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mcp_class_method_outranks_user_script() {
        assert!(Provider::McpClassMethod.preference_rank() < Provider::UserScript.preference_rank());
    }

    #[test]
    fn tokens_strip_stopwords_and_lowercase() {
        let d = CapabilityDescriptor {
            domain: "data".into(),
            action: "summarize".into(),
            safety_level: SafetyLevel::ReadOnly,
            parameters: vec![],
            description: "Summarize the input data matrix.".into(),
            provider: Provider::UserScript,
            locator: Locator::ScriptModule {
                module_path: "summarize.py".into(),
                entry_fn: "handle".into(),
            },
        };
        let tokens = d.tokens();
        assert!(tokens.contains(&"summarize".to_string()));
        assert!(tokens.contains(&"matrix".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
    }

    #[test]
    fn unknown_safety_level_rejected_on_deserialize() {
        let raw = serde_json::json!("not_a_real_level");
        let result: Result<SafetyLevel, _> = serde_json::from_value(raw);
        assert!(result.is_err());
    }
}
