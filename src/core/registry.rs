//! Name↔id registry.
//!
//! A per-document-type, per-pack mapping between human-readable document
//! names and their generated storage identifiers. Constructed once per
//! invocation and passed by reference into every component that needs it:
//! populated in a pre-pass (as packs load during a build, or by walking the
//! already-extracted source tree before an extraction), then read-only.
//!
//! Lookups in the id direction fail hard: shipped content must be
//! link-complete, so a broken reference is never silently dropped. The name
//! direction is optional; extraction runs against transiently incomplete
//! source trees and downgrades misses to warnings at the call site.

use std::collections::HashMap;

use crate::error::{PackError, PackResult};

/// Key: document type tag, then pack name.
type PackKey = (String, String);

/// In-process index with process lifetime of one build or extract run.
#[derive(Debug, Default)]
pub struct LinkRegistry {
    name_to_id: HashMap<PackKey, HashMap<String, String>>,
    id_to_name: HashMap<PackKey, HashMap<String, String>>,
}

impl LinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one document under its type and pack.
    pub fn insert(&mut self, doc_type: &str, pack: &str, name: &str, id: &str) {
        let key = (doc_type.to_string(), pack.to_string());
        self.name_to_id
            .entry(key.clone())
            .or_default()
            .insert(name.to_string(), id.to_string());
        self.id_to_name
            .entry(key)
            .or_default()
            .insert(id.to_string(), name.to_string());
    }

    /// Resolve a document name to its id. A pack with no registered map, or
    /// a name with no entry, is a hard failure.
    pub fn id_for(&self, doc_type: &str, pack: &str, name: &str) -> PackResult<&str> {
        let map = self
            .name_to_id
            .get(&(doc_type.to_string(), pack.to_string()))
            .ok_or_else(|| {
                PackError::unresolved(format!("no registered {doc_type} names for pack '{pack}'"))
            })?;
        map.get(name).map(String::as_str).ok_or_else(|| {
            PackError::unresolved(format!("no {doc_type} named '{name}' in pack '{pack}'"))
        })
    }

    /// Resolve a document id back to its name, when known.
    pub fn name_for(&self, doc_type: &str, pack: &str, id: &str) -> Option<&str> {
        self.id_to_name
            .get(&(doc_type.to_string(), pack.to_string()))?
            .get(id)
            .map(String::as_str)
    }

    /// Number of registered documents across all packs.
    pub fn len(&self) -> usize {
        self.name_to_id.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.name_to_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> LinkRegistry {
        let mut registry = LinkRegistry::new();
        registry.insert("Item", "gear", "Longsword", "a1b2c3d4e5f6a7b8");
        registry.insert("Item", "gear", "Dagger", "b1b2c3d4e5f6a7b8");
        registry.insert("Actor", "bestiary", "Goblin", "c1b2c3d4e5f6a7b8");
        registry
    }

    #[test]
    fn test_id_lookup() {
        let registry = registry();
        assert_eq!(registry.id_for("Item", "gear", "Longsword").unwrap(), "a1b2c3d4e5f6a7b8");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_name_lookup() {
        let registry = registry();
        assert_eq!(registry.name_for("Actor", "bestiary", "c1b2c3d4e5f6a7b8"), Some("Goblin"));
        assert_eq!(registry.name_for("Actor", "bestiary", "ffffffffffffffff"), None);
    }

    #[test]
    fn test_unknown_pack_is_hard_failure() {
        let err = registry().id_for("Item", "missing-pack", "Longsword").unwrap_err();
        assert!(matches!(err, PackError::UnresolvedReference(_)));
        assert!(err.to_string().contains("missing-pack"));
    }

    #[test]
    fn test_unknown_name_is_hard_failure() {
        let err = registry().id_for("Item", "gear", "Halberd").unwrap_err();
        assert!(matches!(err, PackError::UnresolvedReference(_)));
        assert!(err.to_string().contains("Halberd"));
    }

    #[test]
    fn test_types_are_separate_namespaces() {
        let registry = registry();
        assert!(registry.id_for("Actor", "gear", "Longsword").is_err());
    }
}
