//! Bounded set of already-processed change keys.

use std::collections::{HashSet, VecDeque};

/// Extra keys kept beyond the size of the latest poll.
pub const DEFAULT_MARGIN: usize = 500;

/// Insertion-ordered set that forgets its oldest keys.
///
/// The feed returns a sliding window of recent changes, so keys older than
/// the window can be dropped; `margin` keeps a cushion for keys that slide
/// out and back while the window shrinks.
#[derive(Debug, Clone)]
pub struct SeenKeys {
    order: VecDeque<String>,
    keys: HashSet<String>,
    margin: usize,
}

impl SeenKeys {
    #[must_use]
    pub fn new(margin: usize) -> Self {
        Self {
            order: VecDeque::new(),
            keys: HashSet::new(),
            margin,
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Add a key. Returns false if it was already present.
    pub fn insert(&mut self, key: String) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
        true
    }

    /// Evict oldest keys until at most `observed + margin` remain.
    ///
    /// Returns the number evicted.
    pub fn evict_for(&mut self, observed: usize) -> usize {
        let cap = observed + self.margin;
        let mut evicted = 0;
        while self.order.len() > cap {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
                evicted += 1;
            }
        }
        evicted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for SeenKeys {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN)
    }
}
