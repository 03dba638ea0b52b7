//! Comment containment and comment padding.
//!
//! The host only tells us which nodes each comment lists as members. Nesting is derived from
//! those lists: a comment sits inside the smallest comment whose member set contains its own.
//! Comments whose members disagree with the current format call are ignored for the whole call.

use crate::context::{HashSet, LayoutContext};
use crate::parameter::ParameterSet;
use crate::tree::node_tree;
use indexmap::IndexSet;
use knotwork_graph::{
    ALIGN_GRID, Graph, Margin, NodeId, PinDirection, PinLink, Rect, RoundingMethod, Vec2,
    grouped_bounds, snap_to_grid,
};
use serde::Serialize;

/// Refitted bounds of a comment, reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentBounds {
    pub comment: NodeId,
    pub bounds: Rect,
}

#[derive(Debug, Clone)]
pub(crate) struct CommentEntry {
    pub comment: NodeId,
    /// Every non-comment member, including those of nested comments.
    pub members: IndexSet<NodeId>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct CommentTree {
    entries: Vec<CommentEntry>,
    roots: Vec<usize>,
    ignored: Vec<NodeId>,
}

impl CommentTree {
    pub fn build(graph: &Graph, formatted: &IndexSet<NodeId>, parameters: &ParameterSet) -> Self {
        let mut tree = CommentTree::default();
        for comment in graph.comments() {
            let members = flatten_members(graph, comment);
            if !members.iter().any(|m| formatted.contains(m)) {
                continue;
            }
            if let Some(reason) = ignore_reason(graph, &members, formatted, parameters) {
                tracing::warn!(comment = %comment, reason, "ignoring comment");
                tree.ignored.push(comment);
                continue;
            }
            tree.entries.push(CommentEntry {
                comment,
                members,
                parent: None,
                children: Vec::new(),
            });
        }

        for i in 0..tree.entries.len() {
            let mut best: Option<usize> = None;
            for j in 0..tree.entries.len() {
                if i == j || !tree.nested_in(i, j) {
                    continue;
                }
                best = match best {
                    Some(b) if !tree.tighter(j, b) => Some(b),
                    _ => Some(j),
                };
            }
            tree.entries[i].parent = best;
        }
        for i in 0..tree.entries.len() {
            match tree.entries[i].parent {
                Some(p) => tree.entries[p].children.push(i),
                None => tree.roots.push(i),
            }
        }
        tracing::debug!(
            comments = tree.entries.len(),
            ignored = tree.ignored.len(),
            "built comment tree"
        );
        tree
    }

    /// Whether comment `i` sits inside comment `j`. Equal member sets nest by id.
    fn nested_in(&self, i: usize, j: usize) -> bool {
        let (a, b) = (&self.entries[i], &self.entries[j]);
        if !a.members.iter().all(|m| b.members.contains(m)) {
            return false;
        }
        a.members.len() < b.members.len() || a.comment > b.comment
    }

    /// Whether `j` is a closer enclosing comment than `k`.
    fn tighter(&self, j: usize, k: usize) -> bool {
        let (a, b) = (&self.entries[j], &self.entries[k]);
        a.members.len() < b.members.len()
            || (a.members.len() == b.members.len() && a.comment > b.comment)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn ignored(&self) -> &[NodeId] {
        &self.ignored
    }

    pub fn entry(&self, index: usize) -> &CommentEntry {
        &self.entries[index]
    }

    pub fn contains(&self, index: usize, node: NodeId) -> bool {
        self.entries[index].members.contains(&node)
    }

    /// Overlapping member sets where neither comment contains the other.
    pub fn intersecting(&self, a: usize, b: usize) -> bool {
        let (ea, eb) = (&self.entries[a], &self.entries[b]);
        let a_in_b = ea.members.iter().all(|m| eb.members.contains(m));
        let b_in_a = eb.members.iter().all(|m| ea.members.contains(m));
        !a_in_b && !b_in_a && ea.members.iter().any(|m| eb.members.contains(m))
    }

    /// Children first, so a parent can enclose the refitted boxes of its children.
    fn bottom_up(&self) -> Vec<usize> {
        let mut order: Vec<usize> = Vec::new();
        let mut stack: Vec<(usize, bool)> = self.roots.iter().rev().map(|r| (*r, false)).collect();
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
                continue;
            }
            stack.push((index, true));
            for child in self.entries[index].children.iter().rev() {
                stack.push((*child, false));
            }
        }
        order
    }
}

fn flatten_members(graph: &Graph, comment: NodeId) -> IndexSet<NodeId> {
    let mut out: IndexSet<NodeId> = IndexSet::new();
    let mut seen: HashSet<NodeId> = HashSet::default();
    let mut stack: Vec<NodeId> = vec![comment];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        for &member in graph.comment_members(current) {
            match graph.kind(member) {
                Some(kind) if kind.is_comment() => stack.push(member),
                Some(_) => {
                    out.insert(member);
                }
                None => {}
            }
        }
    }
    out
}

fn ignore_reason(
    graph: &Graph,
    members: &IndexSet<NodeId>,
    formatted: &IndexSet<NodeId>,
    parameters: &ParameterSet,
) -> Option<&'static str> {
    let Some(first) = members.first().copied() else {
        return Some("empty");
    };
    if members.iter().any(|m| !formatted.contains(m)) {
        return Some("contains nodes outside the formatted set");
    }
    let orphan_parameter = members.iter().any(|m| {
        parameters
            .owner(*m)
            .is_some_and(|owner| !members.contains(&owner))
    });
    if orphan_parameter {
        return Some("contains a parameter node without its consumer");
    }
    let connected = node_tree(graph, first, |l| members.contains(&l.to_node()));
    if connected.len() != members.len() {
        return Some("members are not connected");
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Item {
    Node(NodeId),
    Comment(usize),
}

impl LayoutContext<'_> {
    /// Comment box around its members and nested comments.
    fn comment_rect(&self, index: usize) -> Option<Rect> {
        let entry = self.comments.entry(index);
        let members = grouped_bounds(entry.members.iter().filter_map(|m| self.graph.bounds(*m)));
        let children = grouped_bounds(entry.children.iter().filter_map(|c| self.comment_rect(*c)));
        let padding = self.config.comment_padding;
        let inner = match (members, children) {
            (Some(m), Some(c)) => Some(m.union(&c)),
            (m, c) => m.or(c),
        }?;
        Some(inner.extend_by(Margin::symmetric(padding.x, padding.y)))
    }

    fn item_bounds(&self, item: Item) -> Option<Rect> {
        match item {
            Item::Node(node) => Some(self.cluster_bounds(node)),
            Item::Comment(index) => self.comment_rect(index),
        }
    }

    /// Pool nodes that move with `item`.
    fn item_nodes(&self, item: Item) -> Vec<NodeId> {
        match item {
            Item::Node(node) => vec![node],
            Item::Comment(index) => self
                .comments
                .entry(index)
                .members
                .iter()
                .copied()
                .filter(|m| self.in_pool(*m))
                .collect(),
        }
    }

    /// Pool nodes directly at this level: not inside any of `comments`.
    fn level_nodes(&self, candidates: &[NodeId], comments: &[usize]) -> Vec<NodeId> {
        candidates
            .iter()
            .copied()
            .filter(|n| self.in_pool(*n))
            .filter(|n| !comments.iter().any(|c| self.comments.contains(*c, *n)))
            .collect()
    }

    fn level_items(&self, nodes: &[NodeId], comments: &[usize]) -> Vec<Item> {
        nodes
            .iter()
            .map(|n| Item::Node(*n))
            .chain(comments.iter().map(|c| Item::Comment(*c)))
            .collect()
    }

    pub(crate) fn apply_comment_padding_x(&mut self) {
        if self.comments.is_empty() {
            return;
        }
        let _span = tracing::debug_span!("comment_padding_x").entered();
        let roots = self.comments.roots().to_vec();
        let pool: Vec<NodeId> = self.pool.iter().copied().collect();
        let nodes = self.level_nodes(&pool, &roots);
        self.comment_padding_x_level(&nodes, &roots);
    }

    fn comment_padding_x_level(&mut self, nodes: &[NodeId], comments: &[usize]) {
        for &comment in comments {
            let entry = self.comments.entry(comment);
            let children = entry.children.clone();
            let members: Vec<NodeId> = entry.members.iter().copied().collect();
            let inner = self.level_nodes(&members, &children);
            self.comment_padding_x_level(&inner, &children);
        }

        let mut items = self.level_items(nodes, comments);
        items.sort_by(|a, b| {
            let la = self.item_bounds(*a).map_or(0.0, |r| r.left);
            let lb = self.item_bounds(*b).map_or(0.0, |r| r.left);
            la.total_cmp(&lb)
        });

        for &a in &items {
            for link in self.straight_links_leaving(a) {
                let target = link.to_node();
                let b = if items.contains(&Item::Node(target)) {
                    Item::Node(target)
                } else if let Some(c) = comments
                    .iter()
                    .find(|c| self.comments.contains(**c, target))
                {
                    Item::Comment(*c)
                } else {
                    continue;
                };
                if a == b {
                    continue;
                }
                match (a, b) {
                    (Item::Node(_), Item::Node(_)) => continue,
                    (Item::Comment(x), Item::Comment(y)) if self.comments.intersecting(x, y) => {
                        continue;
                    }
                    _ => {}
                }
                let (Some(bounds_a), Some(bounds_b)) = (self.item_bounds(a), self.item_bounds(b))
                else {
                    continue;
                };
                let bounds_a = bounds_a.extend_by(Margin::horizontal(self.config.padding.x));
                if !bounds_a.intersects(&bounds_b) {
                    continue;
                }
                let delta = match link.direction {
                    PinDirection::Output => {
                        let overlap = bounds_a.right + 1.0 - bounds_b.left;
                        snap_to_grid(overlap, ALIGN_GRID, RoundingMethod::Ceil)
                    }
                    PinDirection::Input => {
                        let overlap = bounds_a.left - bounds_b.right;
                        snap_to_grid(overlap, ALIGN_GRID, RoundingMethod::Floor)
                    }
                };
                if delta == 0.0 {
                    continue;
                }
                let fixed = self.item_nodes(a);
                let mut moving: IndexSet<NodeId> = IndexSet::new();
                for node in self.item_nodes(b) {
                    moving.insert(node);
                    moving.extend(self.x_infos.all_children(node));
                }
                for node in moving {
                    if fixed.contains(&node) || node == self.root {
                        continue;
                    }
                    self.move_by(node, Vec2::new(delta, 0.0));
                }
                tracing::debug!(?a, ?b, delta, "comment padding x");
            }
        }
    }

    /// Same-row links from `item` to nodes outside it.
    fn straight_links_leaving(&self, item: Item) -> Vec<PinLink> {
        let nodes = self.item_nodes(item);
        let mut links: Vec<PinLink> = Vec::new();
        for node in &nodes {
            for link in self.x_infos.child_links(*node, None) {
                if self.same_row.contains(&link) && !links.contains(&link) {
                    links.push(link);
                }
            }
            if let Item::Comment(index) = item {
                for link in self.exec_links(*node, Some(PinDirection::Output)) {
                    let leaves = !self.comments.contains(index, link.to_node());
                    if leaves && self.same_row.contains(&link) && !links.contains(&link) {
                        links.push(link);
                    }
                }
            }
        }
        links.retain(|l| !nodes.contains(&l.to_node()));
        links
    }

    pub(crate) fn apply_comment_padding_y(&mut self) {
        if self.comments.is_empty() {
            return;
        }
        let _span = tracing::debug_span!("comment_padding_y").entered();
        let roots = self.comments.roots().to_vec();
        let pool: Vec<NodeId> = self.pool.iter().copied().collect();
        let nodes = self.level_nodes(&pool, &roots);
        self.comment_padding_y_level(&nodes, &roots);
    }

    fn comment_padding_y_level(&mut self, nodes: &[NodeId], comments: &[usize]) {
        for &comment in comments {
            let entry = self.comments.entry(comment);
            let children = entry.children.clone();
            let members: Vec<NodeId> = entry.members.iter().copied().collect();
            let inner = self.level_nodes(&members, &children);
            self.comment_padding_y_level(&inner, &children);
        }

        let mut items = self.level_items(nodes, comments);
        items.sort_by(|a, b| {
            let ta = self.item_bounds(*a).map_or(0.0, |r| r.top);
            let tb = self.item_bounds(*b).map_or(0.0, |r| r.top);
            ta.total_cmp(&tb)
        });

        for i in 0..items.len() {
            for j in (i + 1)..items.len() {
                let (a, b) = (items[i], items[j]);
                match (a, b) {
                    (Item::Node(_), Item::Node(_)) => continue,
                    (Item::Comment(x), Item::Comment(y)) if self.comments.intersecting(x, y) => {
                        continue;
                    }
                    (Item::Comment(x), Item::Node(n)) => {
                        let owns_cluster = self
                            .parameters
                            .get(n)
                            .is_some_and(|f| f.formatted().any(|p| self.comments.contains(x, p)));
                        if owns_cluster {
                            continue;
                        }
                    }
                    _ => {}
                }
                let (Some(mut bounds_a), Some(bounds_b)) =
                    (self.item_bounds(a), self.item_bounds(b))
                else {
                    continue;
                };
                bounds_a.bottom += self.config.padding.y;
                if !bounds_a.intersects(&bounds_b) {
                    continue;
                }
                let delta = bounds_a.bottom + 1.0 - bounds_b.top;
                let visited: HashSet<NodeId> = self.item_nodes(a).into_iter().collect();
                let start = self.item_nodes(b);
                self.shift_y_keeping_spacing(start, delta, visited);
                tracing::debug!(?a, ?b, delta, "comment padding y");
            }
        }
    }

    /// Moves `start` down by `delta`, along with same-row partners and relatively placed nodes.
    fn shift_y_keeping_spacing(
        &mut self,
        start: Vec<NodeId>,
        delta: f64,
        mut visited: HashSet<NodeId>,
    ) {
        let delta = snap_to_grid(delta, ALIGN_GRID, RoundingMethod::Ceil);
        if delta <= 0.0 {
            return;
        }
        let mut stack = start;
        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let movable = self
                .graph
                .kind(node)
                .is_some_and(|k| k.is_impure() || k.is_knot());
            if !movable {
                continue;
            }
            self.move_by(node, Vec2::new(0.0, delta));
            if let Some(formatter) = self.parameters.get(node) {
                visited.extend(formatter.formatted());
            }
            for pin in self.graph.pin_ids(node) {
                if let Some(partner) = self.same_row.partner(pin) {
                    stack.push(partner.node);
                }
            }
            stack.extend(self.relative.children(node).iter().copied());
        }
    }

    /// Resizes every comment around its members and returns the new boxes.
    pub(crate) fn refit_comments(&mut self) -> Vec<CommentBounds> {
        let mut out = Vec::new();
        for index in self.comments.bottom_up() {
            let Some(bounds) = self.comment_rect(index) else {
                continue;
            };
            let comment = self.comments.entry(index).comment;
            if let Some(node) = self.graph.node_mut(comment) {
                node.position = bounds.top_left();
                node.size = Some(bounds.size());
            }
            out.push(CommentBounds { comment, bounds });
        }
        out
    }
}
