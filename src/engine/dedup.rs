//! Per-run record deduplication.

use std::collections::HashSet;

/// Tracks record ids seen within one run.
#[derive(Debug, Default)]
pub struct IdSet {
    seen: HashSet<String>,
}

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an id. Returns true if it was already present.
    pub fn add(&mut self, id: &str) -> bool {
        !self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_ids_detected() {
        let mut ids = IdSet::new();
        assert!(!ids.add("a"));
        assert!(!ids.add("b"));
        assert!(ids.add("a"));
        assert_eq!(ids.len(), 2);
    }
}
