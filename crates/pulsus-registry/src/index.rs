//! The immutable snapshot swapped in wholesale on every refresh (spec
//! §5: "a routing cycle observes either the pre-refresh or post-refresh
//! registry, never a partial view").

use std::collections::HashMap;

use pulsus_common::capability::CapabilityDescriptor;

#[derive(Debug, Default)]
pub struct RegistryIndex {
    by_key: HashMap<(String, String), CapabilityDescriptor>,
    by_token: HashMap<String, Vec<(String, String)>>,
}

impl RegistryIndex {
    pub fn build(descriptors: Vec<CapabilityDescriptor>) -> Self {
        let mut by_key = HashMap::new();
        let mut by_token: HashMap<String, Vec<(String, String)>> = HashMap::new();

        for descriptor in descriptors {
            let key = (descriptor.domain.clone(), descriptor.action.clone());
            for token in descriptor.tokens() {
                let bucket = by_token.entry(token).or_default();
                if !bucket.contains(&key) {
                    bucket.push(key.clone());
                }
            }
            by_key.insert(key, descriptor);
        }

        Self { by_key, by_token }
    }

    pub fn lookup_exact(&self, domain: &str, action: &str) -> Option<&CapabilityDescriptor> {
        self.by_key.get(&(domain.to_string(), action.to_string()))
    }

    /// Fuzzy lookup the Scorer consults for its `doc` component (spec
    /// §4.F): every descriptor with at least one token in common.
    pub fn lookup_by_tokens(&self, tokens: &[String]) -> Vec<&CapabilityDescriptor> {
        let mut seen = std::collections::HashSet::new();
        let mut hits = Vec::new();
        for token in tokens {
            let Some(keys) = self.by_token.get(token) else {
                continue;
            };
            for key in keys {
                if seen.insert(key.clone()) {
                    if let Some(descriptor) = self.by_key.get(key) {
                        hits.push(descriptor);
                    }
                }
            }
        }
        hits
    }

    pub fn all(&self) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.by_key.values()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}
