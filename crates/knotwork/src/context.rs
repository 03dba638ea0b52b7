//! State shared by the passes of one format call.

use crate::comments::CommentTree;
use crate::config::FormatConfig;
use crate::parameter::ParameterSet;
use crate::same_row::SameRowMapping;
use crate::tree::{self, NodeFilter};
use crate::x_info::XInfoMap;
use indexmap::IndexSet;
use knotwork_graph::{Graph, NodeId, PinDirection, PinId, PinLink, Rect, Vec2, grouped_bounds};
use rustc_hash::FxBuildHasher;

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
pub(crate) type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

/// Nodes whose Y was settled relative to another node during the Y pass.
///
/// When a later pass pushes a node down, the nodes placed relative to it follow.
#[derive(Debug, Clone, Default)]
pub(crate) struct RelativeMapping {
    parent_of: HashMap<NodeId, NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl RelativeMapping {
    pub fn update(&mut self, child: NodeId, parent: NodeId) {
        if child == parent {
            return;
        }
        if let Some(old) = self.parent_of.insert(child, parent) {
            if let Some(list) = self.children.get_mut(&old) {
                list.retain(|c| *c != child);
            }
        }
        let list = self.children.entry(parent).or_default();
        if !list.contains(&child) {
            list.push(child);
        }
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.children.get(&node).map_or(&[], Vec::as_slice)
    }
}

pub(crate) struct LayoutContext<'g> {
    pub graph: &'g mut Graph,
    pub config: &'g FormatConfig,
    pub filter: &'g NodeFilter,
    pub root: NodeId,
    pub pool: IndexSet<NodeId>,
    pub x_infos: XInfoMap,
    /// Parent-to-child links chosen by the X pass.
    pub path: HashSet<PinLink>,
    pub same_row: SameRowMapping,
    pub parameters: ParameterSet,
    pub relative: RelativeMapping,
    pub comments: CommentTree,
}

impl<'g> LayoutContext<'g> {
    pub fn new(
        graph: &'g mut Graph,
        config: &'g FormatConfig,
        filter: &'g NodeFilter,
        root: NodeId,
    ) -> Self {
        Self {
            graph,
            config,
            filter,
            root,
            pool: IndexSet::new(),
            x_infos: XInfoMap::default(),
            path: HashSet::default(),
            same_row: SameRowMapping::default(),
            parameters: ParameterSet::default(),
            relative: RelativeMapping::default(),
            comments: CommentTree::default(),
        }
    }

    pub fn in_pool(&self, node: NodeId) -> bool {
        self.pool.contains(&node)
    }

    pub fn is_pure(&self, node: NodeId) -> bool {
        self.graph.kind(node).is_some_and(|k| k.is_pure())
    }

    pub fn exec_links(&self, node: NodeId, direction: Option<PinDirection>) -> Vec<PinLink> {
        tree::exec_links(self.graph, node, direction, self.config)
    }

    pub fn position(&self, node: NodeId) -> Vec2 {
        self.graph.position(node).unwrap_or_default()
    }

    pub fn node_bounds(&self, node: NodeId) -> Rect {
        self.graph
            .bounds(node)
            .unwrap_or_else(|| Rect::from_origin_size(self.position(node), Vec2::ZERO))
    }

    /// Bounds of the node together with its parameter cluster.
    pub fn cluster_bounds(&self, node: NodeId) -> Rect {
        self.parameters
            .formatter_for(node)
            .and_then(|f| f.bounds(self.graph))
            .unwrap_or_else(|| self.node_bounds(node))
    }

    /// Bounds of every node in the cluster of `node`, one rect each.
    pub fn member_bounds(&self, node: NodeId) -> Vec<Rect> {
        match self.parameters.formatter_for(node) {
            Some(f) => f.nodes().iter().filter_map(|n| self.graph.bounds(*n)).collect(),
            None => vec![self.node_bounds(node)],
        }
    }

    pub fn bounds(&self, node: NodeId, use_clusters: bool) -> Rect {
        if use_clusters {
            self.cluster_bounds(node)
        } else {
            self.node_bounds(node)
        }
    }

    pub fn group_bounds<I>(&self, nodes: I, use_clusters: bool) -> Option<Rect>
    where
        I: IntoIterator<Item = NodeId>,
    {
        grouped_bounds(nodes.into_iter().map(|n| self.bounds(n, use_clusters)))
    }

    pub fn pin_y(&self, pin: PinId) -> f64 {
        self.graph.pin_position(pin).map_or(0.0, |p| p.y)
    }

    pub fn refresh(&mut self, node: NodeId) {
        self.parameters.refresh(self.graph, node);
    }

    pub fn set_x(&mut self, node: NodeId, x: f64) {
        let y = self.position(node).y;
        self.graph.set_position(node, Vec2::new(x, y));
        self.refresh(node);
    }

    pub fn set_y(&mut self, node: NodeId, y: f64) {
        let x = self.position(node).x;
        self.graph.set_position(node, Vec2::new(x, y));
        self.refresh(node);
    }

    pub fn move_by(&mut self, node: NodeId, delta: Vec2) {
        self.graph.translate(node, delta);
        self.refresh(node);
    }

    /// Moves the node owning `moving` so that its pin lines up with `anchor`.
    pub fn straighten_pin(&mut self, anchor: PinId, moving: PinId) {
        let delta = self.pin_y(anchor) - self.pin_y(moving);
        if delta != 0.0 {
            self.move_by(moving.node, Vec2::new(0.0, delta));
        }
    }

    /// Pool nodes followed by every pure node placed by a parameter formatter.
    pub fn formatted_nodes(&self) -> IndexSet<NodeId> {
        let mut out = self.pool.clone();
        out.extend(self.parameters.pure_nodes());
        out
    }
}
