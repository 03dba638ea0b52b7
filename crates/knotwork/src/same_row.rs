//! Pin pairs whose wire must stay horizontal.

use knotwork_graph::{LinkKey, PinId, PinLink};
use rustc_hash::FxBuildHasher;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// Symmetric relation over links. Each pin has at most one same-row partner.
#[derive(Debug, Clone, Default)]
pub struct SameRowMapping {
    links: HashMap<LinkKey, PinLink>,
    partners: HashMap<PinId, PinId>,
}

impl SameRowMapping {
    pub fn insert(&mut self, link: PinLink) {
        self.links.insert(link.key(), link);
        self.partners.insert(link.from, link.to);
        self.partners.insert(link.to, link.from);
    }

    pub fn remove(&mut self, link: &PinLink) {
        if self.links.remove(&link.key()).is_none() {
            return;
        }
        for (pin, other) in [(link.from, link.to), (link.to, link.from)] {
            if self.partners.get(&pin) == Some(&other) {
                self.partners.remove(&pin);
            }
        }
    }

    pub fn contains(&self, link: &PinLink) -> bool {
        self.links.contains_key(&link.key())
    }

    pub fn partner(&self, pin: PinId) -> Option<PinId> {
        self.partners.get(&pin).copied()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.partners.clear();
    }

    /// Links in parent-to-child orientation, sorted for stable output.
    pub fn links(&self) -> Vec<PinLink> {
        let mut out: Vec<PinLink> = self.links.values().copied().collect();
        out.sort_by_key(|l| l.key());
        out
    }
}
