use std::collections::HashMap;

/// Portable, read-only form of every compiled ruleset (§3, §4.1). Keyed by
/// ruleset identifier (the source file's stem — §11 supplemented feature).
///
/// Workers never share a `yara_x::Rules` handle directly: each deserializes
/// its own scannable copy on first use (§4.1: "avoiding shared-mutable
/// handles"). Once construction finishes the store is immutable; nothing
/// in this type offers interior mutability.
#[derive(Debug, Default)]
pub struct CompiledRuleStore {
    artifacts: HashMap<String, Vec<u8>>,
}

impl CompiledRuleStore {
    pub fn new() -> Self {
        CompiledRuleStore {
            artifacts: HashMap::new(),
        }
    }

    pub fn insert(&mut self, ruleset_id: String, serialized: Vec<u8>) {
        self.artifacts.insert(ruleset_id, serialized);
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.artifacts.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
