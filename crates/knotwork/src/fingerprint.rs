//! Change detection for the incremental fast path.
//!
//! A [`NodeChangeInfo`] lists every node property that can change a layout. Positions are not
//! part of it: moving nodes is exactly what the fast path repairs.

use crate::config::FormatConfig;
use crate::formatter::FormatParams;
use crate::tree::{NodeFilter, node_tree};
use indexmap::{IndexMap, IndexSet};
use knotwork_graph::{Graph, NodeId, PinCategory, PinDirection, PinId, Vec2};

#[derive(Debug, Clone, PartialEq)]
struct PinPrint {
    direction: PinDirection,
    category: PinCategory,
    offset_y: f64,
    /// Logical endpoints, looking through knots.
    links: Vec<PinId>,
    /// Knots hanging off this pin.
    knots: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NodeChangeInfo {
    size: Option<Vec2>,
    revision: u64,
    pins: Vec<PinPrint>,
    comments: Vec<NodeId>,
}

impl NodeChangeInfo {
    pub fn capture(graph: &Graph, node: NodeId) -> Option<Self> {
        let entry = graph.node(node)?;
        let pins = graph
            .pin_ids(node)
            .filter_map(|id| {
                let pin = graph.pin(id)?;
                let mut links = graph.resolved_links(id);
                links.sort();
                Some(PinPrint {
                    direction: pin.direction,
                    category: pin.category,
                    offset_y: pin.offset_y,
                    links,
                    knots: graph.knot_chain(id),
                })
            })
            .collect();
        Some(Self {
            size: entry.size,
            revision: entry.revision,
            pins,
            comments: graph.containing_comments(node),
        })
    }

    pub fn has_changed(&self, graph: &Graph, node: NodeId) -> bool {
        Self::capture(graph, node).as_ref() != Some(self)
    }
}

/// Everything a format call left behind for its root.
#[derive(Debug, Clone)]
pub(crate) struct EndState {
    pub anchor: NodeId,
    pub anchor_position: Vec2,
    pub config: FormatConfig,
    pub selected: Vec<NodeId>,
    pub ignored: Vec<NodeId>,
    /// Nodes reachable from the root, with their fingerprints.
    pub tree: IndexMap<NodeId, NodeChangeInfo>,
    /// Formatted nodes and their knots, as offsets from the anchor.
    pub offsets: IndexMap<NodeId, Vec2>,
    pub comments: Vec<NodeId>,
}

/// Nodes whose change can affect the layout of `root`.
pub(crate) fn layout_tree(graph: &Graph, root: NodeId, filter: &NodeFilter) -> IndexSet<NodeId> {
    node_tree(graph, root, |link| {
        let next = link.to_node();
        filter.allows(next) && graph.kind(next).is_some_and(|k| !k.is_comment())
    })
}

impl EndState {
    pub fn capture(
        graph: &Graph,
        root: NodeId,
        anchor: NodeId,
        config: &FormatConfig,
        params: &FormatParams,
        formatted: &IndexSet<NodeId>,
        comments: Vec<NodeId>,
    ) -> Option<Self> {
        let anchor_position = graph.position(anchor)?;
        let filter = NodeFilter::new(root, &params.nodes_to_format, &params.ignored_nodes);
        let tree = layout_tree(graph, root, &filter)
            .into_iter()
            .filter_map(|n| NodeChangeInfo::capture(graph, n).map(|info| (n, info)))
            .collect();
        let mut offsets: IndexMap<NodeId, Vec2> = IndexMap::new();
        for &node in formatted {
            let Some(position) = graph.position(node) else {
                continue;
            };
            offsets.insert(node, position - anchor_position);
            for pin in graph.pin_ids(node) {
                if graph.pin(pin).map(|p| p.direction) == Some(PinDirection::Output) {
                    for knot in graph.knot_chain(pin) {
                        if let Some(p) = graph.position(knot) {
                            offsets.entry(knot).or_insert(p - anchor_position);
                        }
                    }
                }
            }
        }
        Some(Self {
            anchor,
            anchor_position,
            config: config.clone(),
            selected: sorted(&params.nodes_to_format),
            ignored: sorted(&params.ignored_nodes),
            tree,
            offsets,
            comments,
        })
    }

    /// Reason a full layout is needed, or `None` when the saved layout can be reused.
    pub fn formatting_required(
        &self,
        graph: &Graph,
        root: NodeId,
        anchor: NodeId,
        config: &FormatConfig,
        params: &FormatParams,
    ) -> Option<&'static str> {
        if *config != self.config {
            return Some("config changed");
        }
        if anchor != self.anchor || !self.tree.contains_key(&anchor) {
            return Some("anchor changed");
        }
        if sorted(&params.nodes_to_format) != self.selected
            || sorted(&params.ignored_nodes) != self.ignored
        {
            return Some("selection changed");
        }
        if self.offsets.keys().any(|n| !graph.contains_node(*n)) {
            return Some("node deleted");
        }
        let filter = NodeFilter::new(root, &params.nodes_to_format, &params.ignored_nodes);
        let tree = layout_tree(graph, root, &filter);
        if tree.len() != self.tree.len() || tree.iter().any(|n| !self.tree.contains_key(n)) {
            return Some("node set changed");
        }
        if self
            .tree
            .iter()
            .any(|(node, info)| info.has_changed(graph, *node))
        {
            return Some("node changed");
        }
        None
    }
}

fn sorted(nodes: &[NodeId]) -> Vec<NodeId> {
    let mut out = nodes.to_vec();
    out.sort();
    out.dedup();
    out
}
