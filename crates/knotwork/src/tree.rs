//! Node sets reachable from a root: the generic node tree and the exec node pool.

use crate::config::FormatConfig;
use indexmap::IndexSet;
use knotwork_graph::{Graph, NodeId, PinCategory, PinDirection, PinLink};
use rustc_hash::FxBuildHasher;

type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

/// Caller restrictions for one format call.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    root: Option<NodeId>,
    selected: Option<HashSet<NodeId>>,
    ignored: HashSet<NodeId>,
}

impl NodeFilter {
    pub fn new(root: NodeId, selected: &[NodeId], ignored: &[NodeId]) -> Self {
        Self {
            root: Some(root),
            selected: (!selected.is_empty()).then(|| selected.iter().copied().collect()),
            ignored: ignored.iter().copied().collect(),
        }
    }

    /// Ignored nodes are always rejected; the root passes any selection.
    pub fn allows(&self, node: NodeId) -> bool {
        if self.ignored.contains(&node) {
            return false;
        }
        if self.root == Some(node) {
            return true;
        }
        self.selected.as_ref().is_none_or(|s| s.contains(&node))
    }

    pub fn is_ignored(&self, node: NodeId) -> bool {
        self.ignored.contains(&node)
    }
}

pub(crate) fn is_exec_category(category: PinCategory, config: &FormatConfig) -> bool {
    match category {
        PinCategory::Exec => true,
        PinCategory::Delegate => config.treat_delegates_as_exec,
        PinCategory::Parameter => false,
    }
}

/// Whether the `from` pin of `link` carries control flow.
pub(crate) fn is_exec_link(graph: &Graph, link: &PinLink, config: &FormatConfig) -> bool {
    graph
        .pin(link.from)
        .is_some_and(|p| is_exec_category(p.category, config))
}

/// Logical exec links of `node`, in pin order.
pub(crate) fn exec_links(
    graph: &Graph,
    node: NodeId,
    direction: Option<PinDirection>,
    config: &FormatConfig,
) -> Vec<PinLink> {
    graph
        .pin_links(node, direction)
        .into_iter()
        .filter(|l| is_exec_link(graph, l, config))
        .collect()
}

/// Every node reachable from `root` through links accepted by `follow`, root first.
pub fn node_tree<F>(graph: &Graph, root: NodeId, mut follow: F) -> IndexSet<NodeId>
where
    F: FnMut(&PinLink) -> bool,
{
    let mut tree: IndexSet<NodeId> = IndexSet::new();
    if !graph.contains_node(root) {
        return tree;
    }
    tree.insert(root);
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        for link in graph.pin_links(node, None) {
            let next = link.to_node();
            if tree.contains(&next) || !follow(&link) {
                continue;
            }
            tree.insert(next);
            stack.push(next);
        }
    }
    tree
}

/// Exec pool for one format call.
#[derive(Debug, Clone, Default)]
pub struct NodePool {
    pub nodes: IndexSet<NodeId>,
    /// Links through which nodes were discovered, in discovery order.
    pub discovered_through: Vec<PinLink>,
}

/// Collects the exec nodes around `root`.
///
/// Two stacks alternate between the output and input side so discovery stays close to the
/// root in both directions. Pure, knot and comment nodes never enter the pool.
pub fn build_pool(
    graph: &Graph,
    root: NodeId,
    config: &FormatConfig,
    filter: &NodeFilter,
) -> NodePool {
    let _span = tracing::debug_span!("pool").entered();
    let mut pool = NodePool::default();
    let mut output_stack = vec![root];
    let mut input_stack: Vec<NodeId> = Vec::new();

    let accepts = |node: NodeId| {
        filter.allows(node) && graph.kind(node).is_some_and(|k| k.is_impure())
    };

    while let Some(node) = output_stack.pop().or_else(|| input_stack.pop()) {
        if pool.nodes.contains(&node) || !accepts(node) {
            continue;
        }
        pool.nodes.insert(node);

        for direction in [PinDirection::Input, PinDirection::Output] {
            let links = exec_links(graph, node, Some(direction), config);
            for link in links.into_iter().rev() {
                let next = link.to_node();
                if pool.nodes.contains(&next) || !accepts(next) {
                    continue;
                }
                pool.discovered_through.push(link);
                match direction {
                    PinDirection::Output => output_stack.push(next),
                    PinDirection::Input => input_stack.push(next),
                }
            }
        }
    }
    tracing::debug!(root = %root, size = pool.nodes.len(), "built node pool");
    pool
}
