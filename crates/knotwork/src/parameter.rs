//! Layout of the pure dependency trees feeding exec nodes.
//!
//! Every consumer owns one [`ParameterFormatter`]. The outer passes treat a consumer and its
//! formatted pure nodes as one cluster: moving the consumer and calling
//! [`ParameterSet::refresh`] drags the whole cluster along.

use crate::config::{FormatConfig, ParameterStyle};
use crate::tree::{NodeFilter, is_exec_category};
use indexmap::{IndexMap, IndexSet};
use knotwork_graph::{
    ALIGN_GRID, Graph, NodeId, PinDirection, PinLink, Rect, RoundingMethod, Vec2, grouped_bounds,
    snap_to_grid,
};
use rustc_hash::FxBuildHasher;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

#[derive(Debug, Clone)]
pub(crate) struct ParameterFormatter {
    root: NodeId,
    /// Root first, then every pure node this formatter placed.
    nodes: IndexSet<NodeId>,
    /// Pure nodes linked directly to the root's input pins.
    inputs: IndexSet<NodeId>,
    ignored: HashSet<NodeId>,
    /// Root position when the cluster was last laid out or moved.
    anchor: Vec2,
}

impl ParameterFormatter {
    pub fn new(root: NodeId) -> Self {
        let mut nodes = IndexSet::new();
        nodes.insert(root);
        Self {
            root,
            nodes,
            inputs: IndexSet::new(),
            ignored: HashSet::default(),
            anchor: Vec2::ZERO,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn nodes(&self) -> &IndexSet<NodeId> {
        &self.nodes
    }

    /// Pure nodes only.
    pub fn formatted(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().skip(1).copied()
    }

    pub fn ignore<I: IntoIterator<Item = NodeId>>(&mut self, nodes: I) {
        self.ignored.extend(nodes);
    }

    /// Gives up `node` so another consumer can own it.
    pub fn release(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        self.nodes.shift_remove(&node);
        self.inputs.shift_remove(&node);
        self.ignored.insert(node);
    }

    pub fn bounds(&self, graph: &Graph) -> Option<Rect> {
        grouped_bounds(self.nodes.iter().filter_map(|n| graph.bounds(*n)))
    }

    pub fn format(&mut self, graph: &mut Graph, config: &FormatConfig, filter: &NodeFilter) {
        self.nodes.clear();
        self.inputs.clear();
        self.nodes.insert(self.root);
        match config.parameter_style {
            ParameterStyle::Helixing => {
                if let Some(bounds) = graph.bounds(self.root) {
                    let mut cursor = bounds.bottom + config.parameter_padding.y;
                    let right = bounds.left - config.parameter_padding.x;
                    self.place_helixing(graph, config, filter, self.root, right, &mut cursor);
                }
            }
            ParameterStyle::LeftSide => {
                self.place_left_side(graph, config, filter, self.root);
            }
        }
        self.sync_anchor(graph);
    }

    /// Moves the pure nodes by however far the root moved since the last layout.
    pub fn refresh(&mut self, graph: &mut Graph) {
        let Some(position) = graph.position(self.root) else {
            return;
        };
        let delta = position - self.anchor;
        if delta == Vec2::ZERO {
            return;
        }
        for node in self.nodes.iter().skip(1) {
            graph.translate(*node, delta);
        }
        self.anchor = position;
    }

    pub fn sync_anchor(&mut self, graph: &Graph) {
        self.anchor = graph.position(self.root).unwrap_or(self.anchor);
    }

    /// Unclaimed pure nodes feeding `node`'s parameter inputs, ordered by pin height.
    fn dependencies(
        &self,
        graph: &Graph,
        config: &FormatConfig,
        filter: &NodeFilter,
        node: NodeId,
    ) -> Vec<(PinLink, NodeId)> {
        let mut links: Vec<PinLink> = graph
            .pin_links(node, Some(PinDirection::Input))
            .into_iter()
            .filter(|l| {
                graph
                    .pin(l.from)
                    .is_some_and(|p| !is_exec_category(p.category, config))
            })
            .collect();
        links.sort_by(|a, b| pin_offset(graph, a).total_cmp(&pin_offset(graph, b)));

        let mut out: Vec<(PinLink, NodeId)> = Vec::new();
        for link in links {
            let dep = link.to_node();
            let usable = graph.kind(dep).is_some_and(|k| k.is_pure())
                && filter.allows(dep)
                && !self.ignored.contains(&dep)
                && !self.nodes.contains(&dep)
                && !out.iter().any(|(_, n)| *n == dep);
            if usable {
                out.push((link, dep));
            }
        }
        out
    }

    /// Stacks the dependencies of `node` below `cursor`, right-aligned to `right`.
    ///
    /// Each nesting level steps one column further toward the input side, so the tree winds
    /// down and to the left of the consumer.
    fn place_helixing(
        &mut self,
        graph: &mut Graph,
        config: &FormatConfig,
        filter: &NodeFilter,
        node: NodeId,
        right: f64,
        cursor: &mut f64,
    ) {
        for (_, dep) in self.dependencies(graph, config, filter, node) {
            if !self.nodes.insert(dep) {
                continue;
            }
            if node == self.root {
                self.inputs.insert(dep);
            }
            let size = graph.bounds(dep).map_or(Vec2::ZERO, |b| b.size());
            let x = snap_to_grid(right - size.x, ALIGN_GRID, RoundingMethod::Floor);
            let y = snap_to_grid(*cursor, ALIGN_GRID, RoundingMethod::Ceil);
            graph.set_position(dep, Vec2::new(x, y));
            *cursor = y + size.y + config.parameter_padding.y;
            let next_right = x - config.parameter_padding.x;
            self.place_helixing(graph, config, filter, dep, next_right, cursor);
        }
    }

    /// Returns the bottom of the subtree rooted at `node`.
    fn place_left_side(
        &mut self,
        graph: &mut Graph,
        config: &FormatConfig,
        filter: &NodeFilter,
        node: NodeId,
    ) -> f64 {
        let Some(bounds) = graph.bounds(node) else {
            return 0.0;
        };
        let mut bottom = bounds.bottom;
        let mut next_top: Option<f64> = None;
        for (link, dep) in self.dependencies(graph, config, filter, node) {
            if !self.nodes.insert(dep) {
                continue;
            }
            if node == self.root {
                self.inputs.insert(dep);
            }
            let width = graph.bounds(dep).map_or(0.0, |b| b.width());
            let x = snap_to_grid(
                bounds.left - config.parameter_padding.x - width,
                ALIGN_GRID,
                RoundingMethod::Floor,
            );
            let pin_y = graph.pin_position(link.from).map_or(bounds.top, |p| p.y);
            let mut y = pin_y - graph.pin(link.to).map_or(0.0, |p| p.offset_y);
            if let Some(top) = next_top {
                y = y.max(top);
            }
            graph.set_position(dep, Vec2::new(x, y));
            let sub_bottom = self.place_left_side(graph, config, filter, dep);
            next_top = Some(snap_to_grid(
                sub_bottom + config.parameter_padding.y,
                ALIGN_GRID,
                RoundingMethod::Ceil,
            ));
            bottom = bottom.max(sub_bottom);
        }
        bottom
    }
}

fn pin_offset(graph: &Graph, link: &PinLink) -> f64 {
    graph.pin(link.from).map_or(0.0, |p| p.offset_y)
}

/// Every parameter formatter of one format call plus the pure-node ownership map.
#[derive(Debug, Clone, Default)]
pub(crate) struct ParameterSet {
    formatters: IndexMap<NodeId, ParameterFormatter>,
    owners: HashMap<NodeId, NodeId>,
}

impl ParameterSet {
    /// Formats the parameters of every pool node.
    ///
    /// Consumers are visited left to right. Pure nodes wired straight into an earlier consumer
    /// stay with it; deeper shared nodes go to the most recent claimant.
    pub fn format_pool(
        &mut self,
        graph: &mut Graph,
        pool: &IndexSet<NodeId>,
        config: &FormatConfig,
        filter: &NodeFilter,
    ) {
        let mut order: Vec<NodeId> = pool.iter().copied().collect();
        order.sort_by(|a, b| {
            let pa = graph.position(*a).unwrap_or_default();
            let pb = graph.position(*b).unwrap_or_default();
            pa.x.total_cmp(&pb.x).then(pa.y.total_cmp(&pb.y))
        });

        let mut claimed_inputs: Vec<NodeId> = Vec::new();
        for consumer in order {
            let formatter = self
                .formatters
                .entry(consumer)
                .or_insert_with(|| ParameterFormatter::new(consumer));
            formatter.ignore(claimed_inputs.iter().copied());
            formatter.format(graph, config, filter);
            let formatted: Vec<NodeId> = formatter.formatted().collect();
            claimed_inputs.extend(formatter.inputs.iter().copied());
            for node in formatted {
                self.claim(node, consumer);
            }
        }

        for formatter in self.formatters.values_mut() {
            formatter.format(graph, config, filter);
        }
        self.rebuild_owners();
        tracing::debug!(
            consumers = self.formatters.len(),
            pure_nodes = self.owners.len(),
            "formatted parameters"
        );
    }

    /// Formats a single consumer on its own.
    pub fn format_single(
        &mut self,
        graph: &mut Graph,
        consumer: NodeId,
        config: &FormatConfig,
        filter: &NodeFilter,
    ) {
        let formatter = self
            .formatters
            .entry(consumer)
            .or_insert_with(|| ParameterFormatter::new(consumer));
        formatter.format(graph, config, filter);
        self.rebuild_owners();
    }

    fn claim(&mut self, node: NodeId, consumer: NodeId) {
        let Some(previous) = self.owners.insert(node, consumer) else {
            return;
        };
        if previous != consumer {
            if let Some(formatter) = self.formatters.get_mut(&previous) {
                formatter.release(node);
            }
        }
    }

    fn rebuild_owners(&mut self) {
        self.owners.clear();
        let consumers: Vec<NodeId> = self.formatters.keys().copied().collect();
        for consumer in consumers {
            let nodes: Vec<NodeId> = self
                .formatters
                .get(&consumer)
                .map(|f| f.formatted().collect())
                .unwrap_or_default();
            for node in nodes {
                self.claim(node, consumer);
            }
        }
    }

    pub fn owner(&self, node: NodeId) -> Option<NodeId> {
        self.owners.get(&node).copied()
    }

    pub fn get(&self, consumer: NodeId) -> Option<&ParameterFormatter> {
        self.formatters.get(&consumer)
    }

    /// Formatter whose cluster contains `node`, whether `node` is a consumer or a pure node.
    pub fn formatter_for(&self, node: NodeId) -> Option<&ParameterFormatter> {
        let key = self.owner(node).unwrap_or(node);
        self.formatters.get(&key)
    }

    pub fn refresh(&mut self, graph: &mut Graph, node: NodeId) {
        if let Some(formatter) = self.formatters.get_mut(&node) {
            formatter.refresh(graph);
        }
    }

    pub fn sync_anchors(&mut self, graph: &Graph) {
        for formatter in self.formatters.values_mut() {
            formatter.sync_anchor(graph);
        }
    }

    /// Every pure node placed by some formatter, in formatter order.
    pub fn pure_nodes(&self) -> Vec<NodeId> {
        self.formatters
            .values()
            .flat_map(|f| f.formatted())
            .collect()
    }

    pub fn formatters(&self) -> impl Iterator<Item = &ParameterFormatter> + '_ {
        self.formatters.values()
    }
}
