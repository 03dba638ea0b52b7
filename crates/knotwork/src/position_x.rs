//! Horizontal placement.
//!
//! Nodes are visited in alternating output/input waves starting at the root. Each node takes
//! its X from the link that reaches it first; a later link may only move it further along the
//! wave's direction, and never by re-parenting onto one of its own descendants.

use crate::config::FormattingStyle;
use crate::context::{HashSet, LayoutContext};
use knotwork_graph::{
    ALIGN_GRID, NodeId, PinDirection, PinLink, Rect, RoundingMethod, Vec2, align_to_grid,
    grouped_bounds, snap_to_grid,
};
use std::collections::VecDeque;

/// A branch that has to be pushed clear of `avoid` once the waves settle.
#[derive(Debug, Clone, Copy)]
struct ExpandRequest {
    link: PinLink,
    avoid: NodeId,
}

/// `None` stands for the root, which is reached without a link.
type Visit = Option<PinLink>;

#[derive(Debug, Default)]
struct Waves {
    output: VecDeque<Visit>,
    input: VecDeque<Visit>,
}

impl Waves {
    fn queue(&mut self, direction: PinDirection) -> &mut VecDeque<Visit> {
        match direction {
            PinDirection::Output => &mut self.output,
            PinDirection::Input => &mut self.input,
        }
    }

    fn is_empty(&self) -> bool {
        self.output.is_empty() && self.input.is_empty()
    }
}

#[derive(Debug, Default)]
struct ExpandState {
    waiting: Vec<ExpandRequest>,
    expanded: HashSet<NodeId>,
}

impl LayoutContext<'_> {
    pub(crate) fn format_x(&mut self, use_clusters: bool) {
        let _span = tracing::debug_span!("format_x", use_clusters).entered();
        self.x_infos.clear();
        self.path.clear();

        let mut state = ExpandState::default();
        self.decide_x_parents(vec![None], &mut state, use_clusters);

        if self.config.style == FormattingStyle::Expanded {
            // Requests queued while expanding are left for the next pass.
            let mut i = state.waiting.len();
            while i > 0 {
                i -= 1;
                let request = state.waiting[i];
                let dirty = self.expand_x(request, use_clusters);
                if !dirty.is_empty() {
                    self.decide_x_parents(dirty, &mut state, use_clusters);
                }
            }
        }
        tracing::debug!(
            expansions = state.waiting.len(),
            path = self.path.len(),
            "x pass done"
        );
    }

    fn decide_x_parents(&mut self, seeds: Vec<Visit>, state: &mut ExpandState, use_clusters: bool) {
        let mut waves = Waves::default();
        for seed in seeds {
            let direction = seed.map_or(self.config.direction, |l| l.direction);
            waves.queue(direction).push_back(seed);
        }

        // Each node can only improve a bounded number of times; the budget catches pathological
        // inputs where two links keep out-bidding each other.
        let mut budget = (self.pool.len() + 1) * (self.pool.len() + 1) * 8 + 64;
        let mut current = self.config.direction;
        while !waves.is_empty() {
            while let Some(visit) = waves.queue(current).pop_front() {
                if budget == 0 {
                    tracing::warn!(root = %self.root, "x pass gave up before settling");
                    return;
                }
                budget -= 1;
                self.visit_x(visit, current, &mut waves, state, use_clusters);
            }
            current = current.complement();
        }
    }

    fn visit_x(
        &mut self,
        visit: Visit,
        wave: PinDirection,
        waves: &mut Waves,
        state: &mut ExpandState,
        use_clusters: bool,
    ) {
        let node = visit.map_or(self.root, |l| l.to_node());
        let new_x = self.child_x(visit, use_clusters);
        let mut changed = false;

        if !self.x_infos.is_assigned(node) {
            self.x_infos.set_parent(node, visit);
            if node != self.root {
                self.set_x(node, new_x);
            }
            if let Some(link) = visit {
                self.path.insert(link);
            }
            changed = true;
        } else if let Some(link) = visit {
            let old_link = self.x_infos.parent_link(node);
            let from = link.from_node();

            let mut should_check = true;
            let avoid = self.top_most_node_to_avoid(Some(link), &state.waiting);
            let old_avoid = self.top_most_node_to_avoid(old_link, &state.waiting);
            if old_avoid.is_some() && old_avoid != avoid && wave == PinDirection::Input {
                should_check = false;
            }

            let from_link = self.x_infos.parent_link(from);
            let same_as_current = old_link == Some(link);
            let same_or_opposite = same_as_current
                || old_link.map(|l| l.opposite()) == Some(link)
                || from_link.map(|l| l.opposite()) == Some(link);
            let cycle = !same_or_opposite
                && (self.x_infos.is_descendant(node, from)
                    || self.x_infos.is_descendant(from, node));
            if cycle {
                should_check = false;
            }

            if should_check {
                let only_update = same_or_opposite;
                let old_direction = old_link.map(|l| l.direction);
                if old_direction == Some(wave) || only_update {
                    let old_x = self.position(node).x;
                    let better = match wave {
                        PinDirection::Output => new_x > old_x,
                        PinDirection::Input => new_x < old_x,
                    };
                    if better || (same_as_current && new_x != old_x) {
                        self.set_x(node, new_x);
                        if !only_update {
                            self.x_infos.set_parent(node, Some(link));
                        }
                        self.path.insert(link);
                        changed = true;
                    }
                }
            }
        }

        if !changed {
            return;
        }

        let mut first_input = match wave {
            PinDirection::Output => visit,
            PinDirection::Input => None,
        };
        for link in self.exec_links(node, None) {
            let next = link.to_node();
            if next == self.root || !self.in_pool(next) || self.is_pure(next) {
                continue;
            }
            waves.queue(link.direction).push_back(Some(link));

            if link.direction == PinDirection::Input
                && self.config.style == FormattingStyle::Expanded
            {
                match first_input {
                    Some(first) if first != link.opposite() => {
                        let avoid = match first.direction {
                            PinDirection::Output => first.from_node(),
                            PinDirection::Input => first.to_node(),
                        };
                        if state.expanded.insert(next) {
                            state.waiting.push(ExpandRequest { link, avoid });
                        }
                    }
                    Some(_) => {}
                    None => first_input = Some(link),
                }
            }
        }
    }

    /// Walks up the parent chain and returns the avoid node requested closest to the root.
    fn top_most_node_to_avoid(
        &self,
        link: Option<PinLink>,
        waiting: &[ExpandRequest],
    ) -> Option<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::default();
        let mut answer = None;
        let mut cursor = link;
        while let Some(current) = cursor {
            if !seen.insert(current.to_node()) {
                break;
            }
            if let Some(request) = waiting.iter().rev().find(|r| r.link == current) {
                answer = Some(request.avoid);
            }
            cursor = self.x_infos.parent_link(current.from_node());
        }
        answer
    }

    /// Pushes the branch behind `request.link` past its avoid node. Returns the links that
    /// need to be reconsidered.
    fn expand_x(&mut self, request: ExpandRequest, use_clusters: bool) -> Vec<Visit> {
        let from = request.link.from_node();
        let mut to_move = self.x_infos.all_children_except(from, Some(request.avoid));
        to_move.push(from);
        to_move.retain(|n| *n != self.root && *n != request.avoid);
        if to_move.is_empty() {
            return Vec::new();
        }

        let Some(branch) = self.group_bounds(to_move.iter().copied(), use_clusters) else {
            return Vec::new();
        };
        let avoid = self.bounds(request.avoid, use_clusters);
        let delta = avoid.right - branch.left + self.config.padding.x;
        if delta <= 0.0 {
            return Vec::new();
        }
        let delta = snap_to_grid(delta, ALIGN_GRID, RoundingMethod::Ceil);
        for node in &to_move {
            self.move_by(*node, Vec2::new(delta, 0.0));
        }
        tracing::debug!(from = %from, avoid = %request.avoid, delta, "expanded branch");

        let mut dirty: Vec<Visit> = Vec::new();
        for node in &to_move {
            for link in self.exec_links(*node, None) {
                let next = link.to_node();
                if next == request.avoid
                    || next == self.root
                    || to_move.contains(&next)
                    || !self.in_pool(next)
                    || self.is_pure(next)
                {
                    continue;
                }
                dirty.push(Some(link));
            }
        }
        dirty
    }

    /// X for the node at the far end of `visit`, placed beside its parent.
    pub(crate) fn child_x(&self, visit: Visit, use_clusters: bool) -> f64 {
        let Some(link) = visit else {
            return self.position(self.root).x;
        };
        let parent = self.bounds(link.from_node(), use_clusters);
        let child = self.node_bounds(link.to_node());
        let larger = if use_clusters {
            self.row_cluster_bounds(link, parent)
        } else {
            child
        };
        let x = match link.direction {
            PinDirection::Input => {
                parent.left - (larger.right - child.left) - self.config.padding.x
            }
            PinDirection::Output => {
                parent.right + (child.left - larger.left) + self.config.padding.x
            }
        };
        align_to_grid(x)
    }

    /// Bounds of the child's cluster, counting only the members that will share a row with
    /// `parent` once the link is straight. Dependencies stacked below the parent's rows do
    /// not push the child away.
    fn row_cluster_bounds(&self, link: PinLink, parent: Rect) -> Rect {
        let own = self.node_bounds(link.to_node());
        let Some(formatter) = self.parameters.get(link.to_node()) else {
            return own;
        };
        let shift = Vec2::new(0.0, self.pin_y(link.from) - self.pin_y(link.to));
        let gap = self.config.parameter_padding.y;
        let rows = formatter
            .formatted()
            .filter_map(|n| self.graph.bounds(n))
            .filter(|r| {
                let placed = r.offset_by(shift);
                placed.top < parent.bottom + gap && placed.bottom > parent.top - gap
            })
            .chain(std::iter::once(own));
        grouped_bounds(rows).unwrap_or(own)
    }

    /// Gives steep output wires more horizontal room.
    pub(crate) fn expand_by_height(&mut self) {
        let nodes: Vec<NodeId> = self.pool.iter().copied().collect();
        for node in nodes {
            let links = self.x_infos.child_links(node, Some(PinDirection::Output));
            if links.is_empty() {
                continue;
            }
            if self.config.center_branches && links.len() < self.config.min_branches_to_center {
                continue;
            }
            let mut largest = 0.0_f64;
            for link in &links {
                let (Some(from), Some(to)) = (
                    self.graph.pin_position(link.from),
                    self.graph.pin_position(link.to),
                ) else {
                    continue;
                };
                let dy = (to.y - from.y).abs();
                let dx = (to.x - from.x).abs();
                largest = largest.max(dy * 0.75 - dx);
            }
            if largest <= 0.0 {
                continue;
            }
            let delta = snap_to_grid(largest, ALIGN_GRID, RoundingMethod::Ceil);
            for link in links {
                self.move_branch_x(link.to_node(), delta);
            }
        }
    }

    /// Pushes exec nodes right of parameter clusters that belong to other consumers.
    pub(crate) fn expand_ahead_of_parameters(&mut self) {
        let nodes: Vec<NodeId> = self.pool.iter().copied().collect();
        for node in nodes {
            let x = self.position(node).x;
            let mut largest = 0.0_f64;
            for dep in self.graph.linked_nodes(node, Some(PinDirection::Input)) {
                if !self.is_pure(dep) {
                    continue;
                }
                let Some(owner) = self.parameters.owner(dep) else {
                    continue;
                };
                if owner == node {
                    continue;
                }
                let right = self.node_bounds(dep).right;
                largest = largest.max(right + self.config.parameter_padding.x - x);
            }
            if largest > 0.0 {
                let delta = snap_to_grid(largest, ALIGN_GRID, RoundingMethod::Ceil);
                self.move_branch_x(node, delta);
            }
        }
    }

    /// Moves `node` and every X-descendant right by `delta`.
    pub(crate) fn move_branch_x(&mut self, node: NodeId, delta: f64) {
        let mut nodes = self.x_infos.all_children(node);
        nodes.push(node);
        for n in nodes {
            if n == self.root {
                continue;
            }
            self.move_by(n, Vec2::new(delta, 0.0));
        }
    }
}
