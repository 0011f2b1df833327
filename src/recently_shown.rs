//! Bounded history of albums returned by the sampler.

use std::collections::{HashSet, VecDeque};

pub const RECENTLY_SHOWN_CAPACITY: usize = 50;

/// Insertion-ordered set of album ids that evicts its oldest entry when full.
#[derive(Debug, Clone)]
pub struct RecentlyShown {
    order: VecDeque<String>,
    members: HashSet<String>,
    capacity: usize,
}

impl Default for RecentlyShown {
    fn default() -> Self {
        Self::with_capacity(RECENTLY_SHOWN_CAPACITY)
    }
}

impl RecentlyShown {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity + 1),
            members: HashSet::with_capacity(capacity + 1),
            capacity,
        }
    }

    pub fn contains(&self, album_id: &str) -> bool {
        self.members.contains(album_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Records an album. Re-recording a present id keeps its original position.
    /// Returns the evicted id, if any.
    pub fn record(&mut self, album_id: &str) -> Option<String> {
        if !self.members.insert(album_id.to_string()) {
            return None;
        }
        self.order.push_back(album_id.to_string());
        if self.order.len() <= self.capacity {
            return None;
        }
        let evicted = self.order.pop_front()?;
        self.members.remove(&evicted);
        Some(evicted)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    /// Ids from oldest to newest.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}
