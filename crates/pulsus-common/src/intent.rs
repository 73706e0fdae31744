//! Intent Parser output (spec §3 "ParsedIntent", §4.E).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedIntent {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub raw_tokens: Vec<String>,
    /// Tokens that carried the explicit-path sigil.
    #[serde(default)]
    pub explicit_paths: Vec<PathBuf>,
    /// Natural-language paths that resolved to an existing filesystem
    /// entry relative to the working root.
    #[serde(default)]
    pub implicit_paths: Vec<PathBuf>,
    pub confidence: f64,
}

impl ParsedIntent {
    pub fn empty() -> Self {
        Self {
            confidence: 0.0,
            ..Default::default()
        }
    }

    pub fn has_path_hint(&self) -> bool {
        !self.explicit_paths.is_empty() || !self.implicit_paths.is_empty()
    }
}
