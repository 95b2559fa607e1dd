//! GC root tracking
//!
//! Roots are the starting points for marking:
//! - Zone handles (values created during a generation or an invocation)
//! - Runtime frames (result slot and arguments of an in-flight Full call)
//! - Object pools of code attached to registered functions

use crate::vm::value::Value;

/// Where a root was found, for diagnostics and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootSource {
    /// Handle in a zone (by zone depth)
    Zone(usize),
    /// Slot of an active runtime frame (by frame depth)
    RuntimeFrame(usize),
    /// Object pool of a registered function's code
    CodePool,
}

/// Root set for garbage collection
///
/// Only collectable values are recorded; Smis and `null` are skipped.
#[derive(Debug, Default)]
pub struct RootSet {
    roots: Vec<(RootSource, Value)>,
}

impl RootSet {
    /// Create a new root set
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    /// Add a root
    pub fn add(&mut self, source: RootSource, value: Value) {
        if value.is_collectable() {
            self.roots.push((source, value));
        }
    }

    /// Iterate over all root values
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        self.roots.iter().map(|(_, v)| *v)
    }

    /// Iterate over roots found in `source`
    pub fn from_source(&self, source: RootSource) -> impl Iterator<Item = Value> + '_ {
        self.roots
            .iter()
            .filter(move |(s, _)| *s == source)
            .map(|(_, v)| *v)
    }

    /// Get total number of roots
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_set_creation() {
        let roots = RootSet::new();
        assert_eq!(roots.len(), 0);
        assert!(roots.is_empty());
    }

    #[test]
    fn test_root_set_skips_immediates() {
        let mut roots = RootSet::new();

        // Non-heap values should be ignored
        roots.add(RootSource::Zone(0), Value::smi(42));
        roots.add(RootSource::Zone(0), Value::null());

        assert!(roots.is_empty());
    }

    #[test]
    fn test_root_set_by_source() {
        let mut roots = RootSet::new();
        roots.add(RootSource::Zone(0), Value::heap(3));
        roots.add(RootSource::RuntimeFrame(0), Value::heap(4));
        roots.add(RootSource::RuntimeFrame(0), Value::heap(5));

        assert_eq!(roots.len(), 3);
        let frame: Vec<_> = roots.from_source(RootSource::RuntimeFrame(0)).collect();
        assert_eq!(frame, vec![Value::heap(4), Value::heap(5)]);
    }
}
