use serde::{Deserialize, Serialize};

/// Unique identifier for tree nodes within one compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic node id source owned by a single compilation unit.
///
/// Every operation that creates nodes takes the generator explicitly; there is
/// no process-wide counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdGenerator {
    next_id: u32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start allocating at `first`. Used when a tree is deserialized with ids
    /// already assigned.
    pub fn starting_at(first: u32) -> Self {
        Self { next_id: first }
    }

    pub fn gen_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// The id the next call to `gen_id` will return.
    pub fn peek(&self) -> NodeId {
        NodeId(self.next_id)
    }
}

/// Per-template counter for synthetic attribute and variable names.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticCounter {
    value: u32,
}

impl SyntheticCounter {
    pub fn reset(&mut self) {
        self.value = 0;
    }

    /// Returns the current value, then increments.
    pub fn post_increment(&mut self) -> u32 {
        let current = self.value;
        self.value += 1;
        current
    }

    pub fn current(&self) -> u32 {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_is_monotonic() {
        let mut gen = IdGenerator::new();
        assert_eq!(gen.gen_id(), NodeId(0));
        assert_eq!(gen.gen_id(), NodeId(1));
        assert_eq!(gen.peek(), NodeId(2));
        assert_eq!(gen.gen_id(), NodeId(2));
    }

    #[test]
    fn test_counter_post_increment_and_reset() {
        let mut counter = SyntheticCounter::default();
        assert_eq!(counter.post_increment(), 0);
        assert_eq!(counter.post_increment(), 1);
        assert_eq!(counter.current(), 2);
        counter.reset();
        assert_eq!(counter.post_increment(), 0);
    }
}
