use knotwork_graph::{LinkKey, PinLink};
use rustc_hash::FxBuildHasher;

type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

/// Visited set for one recursive pass. A link and its opposite count as the same link.
#[derive(Debug, Default, Clone)]
pub struct TraversalGuard {
    visited: HashSet<LinkKey>,
}

impl TraversalGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, link: &PinLink) -> bool {
        self.visited.contains(&link.key())
    }

    /// Marks `link` visited; returns `false` when it already was.
    pub fn visit(&mut self, link: &PinLink) -> bool {
        self.visited.insert(link.key())
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
