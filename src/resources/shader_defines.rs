//! Shader Macro Definition System
//!
//! Compile-time constants baked into a program when its template is expanded.
//! Changing a define requires recompiling the program, which is why the
//! composite pass carries its bloom level count here rather than as a uniform.
//!
//! # Usage
//!
//! ```rust,ignore
//! use afterglow::resources::ShaderDefines;
//!
//! let mut defines = ShaderDefines::new();
//! defines.set("RENDER_COUNT", "5");
//! defines.set("SMAA_THRESHOLD", "0.1");
//!
//! // Stable hash for program cache lookup
//! let hash = defines.compute_hash();
//! ```

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

/// A collection of shader macro definitions.
///
/// Internally uses an ordered `Vec<(String, String)>` sorted by key, ensuring
/// that identical macro sets produce identical hash values regardless of
/// insertion order.
///
/// # Performance
///
/// - Insertion/lookup: O(log n) due to binary search
/// - Hash computation: O(n)
#[derive(Debug, Clone, Default)]
pub struct ShaderDefines {
    defines: Vec<(String, String)>,
}

impl ShaderDefines {
    /// Create empty shader defines collection
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            defines: Vec::new(),
        }
    }

    /// Create shader defines collection with pre-allocated capacity
    #[inline]
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            defines: Vec::with_capacity(capacity),
        }
    }

    /// Set shader define (maintains sorted order)
    ///
    /// If key exists, updates its value; otherwise inserts new entry.
    pub fn set(&mut self, key: &str, value: &str) {
        match self
            .defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
        {
            Ok(idx) => {
                self.defines[idx].1 = value.to_string();
            }
            Err(idx) => {
                self.defines.insert(idx, (key.to_string(), value.to_string()));
            }
        }
    }

    /// Remove shader define
    pub fn remove(&mut self, key: &str) -> bool {
        if let Ok(idx) = self
            .defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
        {
            self.defines.remove(idx);
            true
        } else {
            false
        }
    }

    /// Check if contains a shader define
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Get shader define value
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.defines
            .binary_search_by(|(k, _)| k.as_str().cmp(key))
            .ok()
            .map(|idx| self.defines[idx].1.as_str())
    }

    /// Parse a define as an unsigned integer (e.g. `RENDER_COUNT`).
    #[must_use]
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// Get shader defines count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.defines.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defines.is_empty()
    }

    /// Iterate all shader defines in key order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.defines.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Convert to `BTreeMap` (for template rendering)
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.defines.iter().cloned().collect()
    }

    /// Merge shader defines from another `ShaderDefines`
    ///
    /// If there are conflicts, values from other will override values in self.
    pub fn merge(&mut self, other: &ShaderDefines) {
        for (key, value) in &other.defines {
            self.set(key, value);
        }
    }

    /// Compute content hash (for caching)
    #[must_use]
    pub fn compute_hash(&self) -> u64 {
        use std::hash::BuildHasher;

        rustc_hash::FxBuildHasher.hash_one(self)
    }
}

impl Hash for ShaderDefines {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.defines.hash(state);
    }
}

impl PartialEq for ShaderDefines {
    fn eq(&self, other: &Self) -> bool {
        self.defines == other.defines
    }
}

impl Eq for ShaderDefines {}

/// Create `ShaderDefines` from list of macro definitions
impl From<&[(&str, &str)]> for ShaderDefines {
    fn from(defines: &[(&str, &str)]) -> Self {
        let mut result = Self::with_capacity(defines.len());
        for (k, v) in defines {
            result.set(k, v);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut defines = ShaderDefines::new();
        defines.set("RENDER_COUNT", "5");
        defines.set("SMAA_THRESHOLD", "0.1");

        assert!(defines.contains("RENDER_COUNT"));
        assert!(!defines.contains("SMAA_MAX_SEARCH_STEPS"));
        assert_eq!(defines.get("SMAA_THRESHOLD"), Some("0.1"));
        assert_eq!(defines.get_usize("RENDER_COUNT"), Some(5));
    }

    #[test]
    fn test_ordering_is_insertion_independent() {
        let mut a = ShaderDefines::new();
        a.set("B", "1");
        a.set("A", "2");

        let mut b = ShaderDefines::new();
        b.set("A", "2");
        b.set("B", "1");

        assert_eq!(a, b);
        assert_eq!(a.compute_hash(), b.compute_hash());
        let keys: Vec<_> = a.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let mut defines = ShaderDefines::new();
        defines.set("RENDER_COUNT", "5");
        defines.set("RENDER_COUNT", "3");
        assert_eq!(defines.len(), 1);
        assert_eq!(defines.get_usize("RENDER_COUNT"), Some(3));

        assert!(defines.remove("RENDER_COUNT"));
        assert!(!defines.remove("RENDER_COUNT"));
        assert!(defines.is_empty());
    }

    #[test]
    fn test_merge_prefers_other() {
        let mut base = ShaderDefines::from(&[("A", "1"), ("B", "1")][..]);
        let other = ShaderDefines::from(&[("B", "2"), ("C", "3")][..]);
        base.merge(&other);

        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(base.get("B"), Some("2"));
        assert_eq!(base.get("C"), Some("3"));
    }
}
