//! Vertical placement and same-row detection.

use crate::context::LayoutContext;
use crate::guard::TraversalGuard;
use indexmap::IndexSet;
use knotwork_graph::{
    ALIGN_GRID, Margin, NodeId, PinDirection, PinId, PinLink, Rect, RoundingMethod, Vec2,
    align_to_grid, snap_to_grid,
};

/// Upper bound on push-down rounds for one node.
pub const MAX_COLLISION_ITERATIONS: usize = 30;

/// Largest pin mismatch still treated as a straight wire.
const STRAIGHT_EPSILON: f64 = 1e-6;

/// One immediate child subtree hanging off a node.
#[derive(Debug, Clone)]
struct ChildBranch {
    pin: PinId,
    parent_pin: PinId,
    nodes: IndexSet<NodeId>,
    link: PinLink,
}

impl LayoutContext<'_> {
    /// Marks the first link of every branch along the X path as same-row.
    pub(crate) fn compute_same_row(&mut self) {
        let _span = tracing::debug_span!("same_row").entered();
        self.same_row.clear();
        let mut visited: IndexSet<NodeId> = IndexSet::new();
        let mut guard = TraversalGuard::new();
        self.same_row_recursive(self.root, None, &mut visited, &mut guard);
        tracing::debug!(links = self.same_row.len(), "same-row links");
    }

    fn same_row_recursive(
        &mut self,
        node: NodeId,
        parent: Option<PinLink>,
        visited: &mut IndexSet<NodeId>,
        guard: &mut TraversalGuard,
    ) {
        visited.insert(node);
        let parent_direction = parent.map_or(self.config.direction, |l| l.direction);
        let mut first = true;
        for direction in [parent_direction, parent_direction.complement()] {
            let mut links = self.exec_links(node, Some(direction));
            self.sort_links_for_rows(&mut links, direction);
            for link in links {
                let next = link.to_node();
                if guard.is_visited(&link)
                    || !self.in_pool(next)
                    || self.is_pure(next)
                    || visited.contains(&next)
                    || !self.path.contains(&link)
                {
                    continue;
                }
                guard.visit(&link);
                if first && parent.is_none_or(|p| link.direction == p.direction) {
                    self.same_row.insert(link);
                    first = false;
                }
                self.same_row_recursive(next, Some(link), visited, guard);
            }
        }
    }

    /// Output links follow pin order; input links go highest target first.
    fn sort_links_for_rows(&self, links: &mut [PinLink], direction: PinDirection) {
        match direction {
            PinDirection::Output => {
                links.sort_by(|a, b| self.pin_y(a.from).total_cmp(&self.pin_y(b.from)));
            }
            PinDirection::Input => {
                links.sort_by(|a, b| {
                    self.pin_y(a.from)
                        .total_cmp(&self.pin_y(b.from))
                        .then(self.pin_y(a.to).total_cmp(&self.pin_y(b.to)))
                });
            }
        }
    }

    pub(crate) fn format_y(&mut self) {
        let _span = tracing::debug_span!("format_y").entered();
        let mut checked: IndexSet<NodeId> = IndexSet::new();
        let mut guard = TraversalGuard::new();
        let mut children: IndexSet<NodeId> = IndexSet::new();
        self.format_y_recursive(
            None,
            self.root,
            &mut checked,
            &mut guard,
            true,
            &mut children,
        );
        tracing::debug!(placed = checked.len(), "y pass done");
    }

    fn format_y_recursive(
        &mut self,
        link: Option<PinLink>,
        node: NodeId,
        checked: &mut IndexSet<NodeId>,
        guard: &mut TraversalGuard,
        same_row: bool,
        out_children: &mut IndexSet<NodeId>,
    ) {
        let parent = link.map(|l| l.from_node());
        if let Some(parent) = parent {
            self.relative.update(node, parent);
        }
        self.resolve_collisions(node, parent, checked);
        checked.insert(node);

        let parent_direction = link.map_or(self.config.direction, |l| l.direction);
        let main_pin = link.map(|l| l.to);
        let mut first_pin = true;
        let mut centered_parent = false;

        for direction in [parent_direction, parent_direction.complement()] {
            let mut all_pins: Vec<PinId> = self
                .graph
                .pin_ids(node)
                .filter(|p| self.graph.pin(*p).map(|pin| pin.direction) == Some(direction))
                .collect();
            all_pins.sort_by(|a, b| self.pin_y(*a).total_cmp(&self.pin_y(*b)));

            let mut links = self.graph.pin_links(node, Some(direction));
            links.sort_by(|a, b| self.pin_y(a.from).total_cmp(&self.pin_y(b.from)));

            let mut last_linked = main_pin;
            let mut last_processed: Option<NodeId> = None;
            let mut branches: Vec<ChildBranch> = Vec::new();

            for child_link in links {
                let child = child_link.to_node();
                if guard.is_visited(&child_link)
                    || !self.in_pool(child)
                    || self.is_pure(child)
                    || checked.contains(&child)
                    || !self.path.contains(&child_link)
                {
                    continue;
                }
                guard.visit(&child_link);

                self.straighten_pin(child_link.from, child_link.to);
                let child_same_row = self.same_row.contains(&child_link);

                if first_pin && (link.is_none() || child_link.direction == parent_direction) {
                    first_pin = false;
                } else if let Some(previous) = last_processed {
                    let y = self.position(child).y.max(self.position(previous).y);
                    self.set_y(child, align_to_grid(y));
                }

                let mut local_children: IndexSet<NodeId> = IndexSet::new();
                self.format_y_recursive(
                    Some(child_link),
                    child,
                    checked,
                    guard,
                    child_same_row,
                    &mut local_children,
                );
                out_children.extend(local_children.iter().copied());

                if self.x_infos.is_immediate_child(node, child) {
                    branches.push(ChildBranch {
                        pin: child_link.to,
                        parent_pin: child_link.from,
                        nodes: local_children.clone(),
                        link: child_link,
                    });
                }

                if !child_same_row && !local_children.is_empty() {
                    self.keep_below_pin(
                        &all_pins,
                        main_pin,
                        last_linked,
                        &child_link,
                        &local_children,
                    );
                }

                last_processed = Some(child);
                last_linked = Some(child_link.from);
            }

            let wants_centering = self.config.center_branches
                && branches.len() >= self.config.min_branches_to_center
                && parent_direction == PinDirection::Output;
            if wants_centering {
                if direction != parent_direction {
                    centered_parent = true;
                }
                self.center_branches(node, &branches, checked);
            }
        }

        out_children.insert(node);

        if same_row && !centered_parent {
            if let Some(link) = link {
                // Pull the parent onto this node's row.
                self.straighten_pin(link.to, link.from);
            }
        }
    }

    fn resolve_collisions(
        &mut self,
        node: NodeId,
        parent: Option<NodeId>,
        checked: &IndexSet<NodeId>,
    ) {
        let others: Vec<NodeId> = checked.iter().rev().copied().collect();
        let gap = self.config.padding.y;
        for _ in 0..MAX_COLLISION_ITERATIONS {
            let mut collided = false;
            for &other in &others {
                if other == node || Some(other) == parent {
                    continue;
                }
                let mine = self.member_bounds(node);
                let theirs = self.member_bounds(other);
                let Some(push) = push_below(&mine, &theirs, gap) else {
                    continue;
                };
                collided = true;
                let y = self.position(node).y + push + 1.0;
                self.set_y(node, snap_to_grid(y, ALIGN_GRID, RoundingMethod::Ceil));
                self.relative.update(node, other);
            }
            if !collided {
                return;
            }
        }
        tracing::warn!(
            node = %node,
            iterations = MAX_COLLISION_ITERATIONS,
            "collision resolution hit its iteration cap"
        );
    }

    /// Keeps a branch that is not on its parent's row below the last linked pin above it.
    fn keep_below_pin(
        &mut self,
        all_pins: &[PinId],
        main_pin: Option<PinId>,
        last_linked: Option<PinId>,
        child_link: &PinLink,
        local_children: &IndexSet<NodeId>,
    ) {
        let mut last_linked_all: Option<PinId> = None;
        let mut pin_to_avoid: Option<PinId> = None;
        for &pin in all_pins {
            if Some(pin) == main_pin || Some(pin) == last_linked {
                last_linked_all = Some(pin);
            }
            if pin == child_link.from {
                if last_linked_all.is_some() {
                    pin_to_avoid = last_linked_all;
                }
                break;
            }
            if self.graph.pin(pin).is_some_and(|p| p.is_linked()) {
                last_linked_all = Some(pin);
            }
        }
        if let Some(main) = main_pin {
            match pin_to_avoid {
                Some(avoid) if self.pin_y(main) > self.pin_y(avoid) => pin_to_avoid = Some(main),
                None => pin_to_avoid = Some(main),
                _ => {}
            }
        }
        let Some(avoid) = pin_to_avoid else {
            return;
        };
        let Some(bounds) = self.group_bounds(local_children.iter().copied(), true) else {
            return;
        };
        let delta = self.pin_y(avoid) + self.config.vertical_pin_spacing() - bounds.top;
        if delta <= 0.0 {
            return;
        }
        let delta = snap_to_grid(delta, ALIGN_GRID, RoundingMethod::Ceil);
        for node in local_children {
            self.move_by(*node, Vec2::new(0.0, delta));
        }
    }

    /// Shifts the branches of `node` so their pins are centered on the parent pins.
    fn center_branches(
        &mut self,
        node: NodeId,
        branches: &[ChildBranch],
        checked: &IndexSet<NodeId>,
    ) {
        let count = branches.len() as f64;
        let child_center = branches.iter().map(|b| self.pin_y(b.pin)).sum::<f64>() / count;
        let parent_center = branches
            .iter()
            .map(|b| self.pin_y(b.parent_pin))
            .sum::<f64>()
            / count;
        let offset = parent_center - child_center;

        let mut all_nodes: IndexSet<NodeId> = IndexSet::new();
        for branch in branches {
            all_nodes.extend(branch.nodes.iter().copied());
        }
        if offset != 0.0 {
            for n in &all_nodes {
                self.move_by(*n, Vec2::new(0.0, offset));
            }
        }

        all_nodes.insert(node);
        let Some(initial) = self.group_bounds(all_nodes.iter().copied(), true) else {
            return;
        };
        let padding = Margin::bottom(self.config.padding.y);
        let mut bounds = initial;
        for other in checked {
            if all_nodes.contains(other) {
                continue;
            }
            let theirs = self.cluster_bounds(*other).extend_by(padding);
            if theirs.intersects(&bounds) {
                bounds = bounds.offset_by(Vec2::new(0.0, theirs.bottom - bounds.top));
            }
        }
        let delta = bounds.top - initial.top;
        if delta > 0.0 {
            let delta = snap_to_grid(delta, ALIGN_GRID, RoundingMethod::Ceil);
            for n in &all_nodes {
                self.move_by(*n, Vec2::new(0.0, delta));
            }
        }
        // Branch wires, and wires into nodes that hang off a merge elsewhere, may now be bent.
        self.unmark_bent_links(&all_nodes);
        tracing::debug!(node = %node, branches = branches.len(), offset, "centered branches");
    }

    fn is_straight(&self, link: &PinLink) -> bool {
        (self.pin_y(link.from) - self.pin_y(link.to)).abs() <= STRAIGHT_EPSILON
    }

    /// Unmarks the same-row links touching `moved` whose pins no longer line up.
    fn unmark_bent_links(&mut self, moved: &IndexSet<NodeId>) {
        let bent: Vec<PinLink> = self
            .same_row
            .links()
            .into_iter()
            .filter(|l| moved.contains(&l.from_node()) || moved.contains(&l.to_node()))
            .filter(|l| !self.is_straight(l))
            .collect();
        for link in &bent {
            tracing::debug!(from = %link.from, to = %link.to, "same-row link bent");
            self.same_row.remove(link);
        }
    }

    /// Drops the same-row mark of every pool link that a later pass bent.
    pub(crate) fn settle_same_row(&mut self) {
        let pool = self.pool.clone();
        self.unmark_bent_links(&pool);
    }

    /// Pushes clusters down until no two of them overlap.
    ///
    /// Clusters are taken top to bottom; each one is moved below every earlier cluster it
    /// still touches. Nodes only ever move down, so every overlapping pair is resolved once.
    pub(crate) fn separate_overlaps(&mut self) {
        let _span = tracing::debug_span!("separate_overlaps").entered();
        let mut order: Vec<NodeId> = self.pool.iter().copied().collect();
        order.sort_by(|a, b| {
            let (ra, rb) = (self.cluster_bounds(*a), self.cluster_bounds(*b));
            ra.top.total_cmp(&rb.top).then(ra.left.total_cmp(&rb.left))
        });

        let mut placed: Vec<Rect> = Vec::new();
        let mut moved = 0usize;
        for node in order {
            while let Some(push) = push_below(&self.member_bounds(node), &placed, 0.0) {
                let gap = push + self.config.padding.y;
                let delta = snap_to_grid(gap, ALIGN_GRID, RoundingMethod::Ceil);
                self.move_by(node, Vec2::new(0.0, delta));
                moved += 1;
            }
            placed.extend(self.member_bounds(node));
        }
        if moved > 0 {
            tracing::debug!(moved, "separated overlapping clusters");
        }
    }
}

/// How far `mine` has to move down to clear every rect in `theirs` grown by `gap` at the bottom.
fn push_below(mine: &[Rect], theirs: &[Rect], gap: f64) -> Option<f64> {
    let mut push: Option<f64> = None;
    for m in mine {
        for t in theirs {
            let t = t.extend_by(Margin::bottom(gap));
            if m.intersects(&t) {
                let needed = t.bottom - m.top;
                push = Some(push.map_or(needed, |p: f64| p.max(needed)));
            }
        }
    }
    push
}
