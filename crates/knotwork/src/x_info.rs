//! Parent/child records built by the X pass.

use knotwork_graph::{NodeId, PinDirection, PinLink};
use rustc_hash::FxBuildHasher;
use std::collections::VecDeque;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

#[derive(Debug, Clone, Default)]
pub(crate) struct XInfo {
    /// Link from the chosen parent to this node. `None` for the root.
    pub link: Option<PinLink>,
    pub assigned: bool,
    pub children: Vec<NodeId>,
}

impl XInfo {
    pub fn parent(&self) -> Option<NodeId> {
        self.link.map(|l| l.from_node())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct XInfoMap {
    infos: HashMap<NodeId, XInfo>,
}

impl XInfoMap {
    pub fn clear(&mut self) {
        self.infos.clear();
    }

    pub fn get(&self, node: NodeId) -> Option<&XInfo> {
        self.infos.get(&node)
    }

    pub fn is_assigned(&self, node: NodeId) -> bool {
        self.get(node).is_some_and(|i| i.assigned)
    }

    pub fn parent_link(&self, node: NodeId) -> Option<PinLink> {
        self.get(node).and_then(|i| i.link)
    }

    /// Records `link` as the parent link of `node`, moving it out of its previous parent.
    pub fn set_parent(&mut self, node: NodeId, link: Option<PinLink>) {
        let old_parent = self.get(node).and_then(XInfo::parent);
        if let Some(info) = old_parent.and_then(|old| self.infos.get_mut(&old)) {
            info.children.retain(|c| *c != node);
        }
        let info = self.infos.entry(node).or_default();
        info.link = link;
        info.assigned = true;
        if let Some(link) = link {
            let parent = self.infos.entry(link.from_node()).or_default();
            if !parent.children.contains(&node) {
                parent.children.push(node);
            }
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map_or(&[], |i| i.children.as_slice())
    }

    pub fn is_immediate_child(&self, parent: NodeId, child: NodeId) -> bool {
        self.children(parent).contains(&child)
    }

    /// Parent links of the immediate children of `node`, filtered by link direction.
    pub fn child_links(&self, node: NodeId, direction: Option<PinDirection>) -> Vec<PinLink> {
        self.children(node)
            .iter()
            .filter_map(|c| self.parent_link(*c))
            .filter(|l| direction.is_none_or(|d| l.direction == d))
            .collect()
    }

    /// Every descendant of `node` (excluding `node`), breadth first.
    pub fn all_children(&self, node: NodeId) -> Vec<NodeId> {
        self.all_children_except(node, None)
    }

    /// Every descendant of `node`, without descending into `avoid`.
    pub fn all_children_except(&self, node: NodeId, avoid: Option<NodeId>) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut seen: HashSet<NodeId> = HashSet::default();
        seen.insert(node);
        let mut queue: VecDeque<NodeId> = self.children(node).iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            if Some(current) == avoid || !seen.insert(current) {
                continue;
            }
            out.push(current);
            queue.extend(self.children(current).iter().copied());
        }
        out
    }

    pub fn is_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.all_children(ancestor).contains(&node)
    }
}
