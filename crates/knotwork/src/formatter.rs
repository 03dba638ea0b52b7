//! Format calls: pass ordering, the keep-still anchor, the fast path and cancellation.

use crate::comments::{CommentBounds, CommentTree};
use crate::config::FormatConfig;
use crate::context::LayoutContext;
use crate::error::{FormatError, InvalidRootReason, Result};
use crate::fingerprint::EndState;
use crate::knots::KnotRequest;
use crate::parameter::ParameterSet;
use crate::tree::{NodeFilter, NodePool, build_pool, node_tree};
use indexmap::IndexSet;
use knotwork_graph::{
    Graph, NodeId, NodeKind, PinDirection, PinLink, RoundingMethod, Vec2, align_to_grid,
    snap_to_grid,
};
use rustc_hash::FxBuildHasher;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// Per-call options that are not part of [`FormatConfig`].
#[derive(Debug, Clone, Default)]
pub struct FormatParams {
    /// When non-empty, only these nodes (and the root) may be formatted.
    pub nodes_to_format: Vec<NodeId>,
    /// Never moved and never formatted.
    pub ignored_nodes: Vec<NodeId>,
    /// Node whose position is preserved. Defaults to the root.
    pub node_to_keep_still: Option<NodeId>,
    /// Checked between passes; set it to abandon the call.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl FormatParams {
    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Pure nodes laid out for one consumer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterGroup {
    pub consumer: NodeId,
    pub nodes: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatReport {
    pub root: NodeId,
    /// Exec pool first, then every pure node placed by a parameter formatter.
    pub formatted: Vec<NodeId>,
    pub parameters: Vec<ParameterGroup>,
    pub same_row: Vec<PinLink>,
    pub comment_bounds: Vec<CommentBounds>,
    pub ignored_comments: Vec<NodeId>,
    pub knot_requests: Vec<KnotRequest>,
    pub fast_path: bool,
    pub cancelled: bool,
}

impl FormatReport {
    fn new(root: NodeId) -> Self {
        Self {
            root,
            formatted: Vec::new(),
            parameters: Vec::new(),
            same_row: Vec::new(),
            comment_bounds: Vec::new(),
            ignored_comments: Vec::new(),
            knot_requests: Vec::new(),
            fast_path: false,
            cancelled: false,
        }
    }

    /// Moves every reported position by `delta`.
    pub fn translate(&mut self, delta: Vec2) {
        for bounds in &mut self.comment_bounds {
            bounds.bounds = bounds.bounds.offset_by(delta);
        }
        for request in &mut self.knot_requests {
            request.translate(delta);
        }
    }
}

/// Formats node graphs and remembers each root's last layout for the fast path.
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: FormatConfig,
    previous: HashMap<NodeId, EndState>,
}

impl Formatter {
    pub fn new(config: FormatConfig) -> Self {
        Self {
            config,
            previous: HashMap::default(),
        }
    }

    pub fn config(&self) -> &FormatConfig {
        &self.config
    }

    /// Saved layouts made under another config are reformatted on their next call.
    pub fn set_config(&mut self, config: FormatConfig) {
        self.config = config;
    }

    /// Drops the saved layout of `root`.
    pub fn forget(&mut self, root: NodeId) {
        self.previous.remove(&root);
    }

    pub fn format(
        &mut self,
        graph: &mut Graph,
        root: NodeId,
        params: &FormatParams,
    ) -> Result<FormatReport> {
        let _span = tracing::debug_span!("format", root = %root).entered();
        let filter = NodeFilter::new(root, &params.nodes_to_format, &params.ignored_nodes);
        let kind = validate_root(graph, root, &filter)?;
        let mut anchor = match params.node_to_keep_still {
            Some(node) if !kind.is_event() && graph.contains_node(node) => node,
            _ => root,
        };

        if self.config.enable_fast_path {
            if let Some(report) = self.fast_path(graph, root, anchor, params) {
                return Ok(report);
            }
        }

        let pool = if kind.is_pure() {
            let mut nodes = IndexSet::new();
            nodes.insert(root);
            NodePool {
                nodes,
                discovered_through: Vec::new(),
            }
        } else {
            build_pool(graph, root, &self.config, &filter)
        };
        let missing = missing_sizes(graph, &pool.nodes, &filter);
        if !missing.is_empty() {
            tracing::warn!(count = missing.len(), "nodes need their size measured first");
            return Err(FormatError::MissingSize { nodes: missing });
        }

        let mut report = FormatReport::new(root);
        if !graph.has_links(root) {
            report.formatted.push(root);
            return Ok(report);
        }
        let root_start = aligned(graph.position(root).unwrap_or_default());
        let mut anchor_start = aligned(graph.position(anchor).unwrap_or_default());
        graph.set_position(anchor, anchor_start);

        if kind.is_pure() {
            let mut parameters = ParameterSet::default();
            parameters.format_single(graph, root, &self.config, &filter);
            report.formatted = parameters
                .get(root)
                .map(|f| f.nodes().iter().copied().collect())
                .unwrap_or_default();
            if !report.formatted.contains(&anchor) {
                (anchor, anchor_start) = (root, root_start);
            }
            restore_anchor(graph, anchor, anchor_start, &report.formatted);
            report.parameters = parameter_groups(&parameters);
            self.save(graph, root, anchor, params, &report);
            return Ok(report);
        }

        let config = self.config.clone();
        let mut ctx = LayoutContext::new(graph, &config, &filter, root);
        ctx.pool = pool.nodes;
        for link in &pool.discovered_through {
            ctx.straighten_pin(link.from, link.to);
        }

        let finished = run_passes(&mut ctx, params);
        let formatted = ctx.formatted_nodes();
        if !formatted.contains(&anchor) {
            (anchor, anchor_start) = (root, root_start);
        }
        report.formatted = formatted.iter().copied().collect();
        report.parameters = parameter_groups(&ctx.parameters);
        report.ignored_comments = ctx.comments.ignored().to_vec();
        if !finished {
            tracing::debug!("format cancelled");
            report.same_row = ctx.same_row.links();
            report.cancelled = true;
            return Ok(report);
        }

        restore_anchor(ctx.graph, anchor, anchor_start, &report.formatted);
        ctx.parameters.sync_anchors(ctx.graph);
        if config.snap_to_grid {
            let pool: Vec<NodeId> = ctx.pool.iter().copied().collect();
            for node in pool {
                let x = ctx.position(node).x;
                let x = snap_to_grid(x, config.grid_size, RoundingMethod::Round);
                ctx.set_x(node, x);
            }
            ctx.separate_overlaps();
            ctx.settle_same_row();
        }
        report.same_row = ctx.same_row.links();
        if config.create_knots {
            report.knot_requests = ctx.plan_knots();
        }
        if config.apply_comment_padding {
            report.comment_bounds = ctx.refit_comments();
        }
        drop(ctx);

        self.save(graph, root, anchor, params, &report);
        tracing::debug!(
            formatted = report.formatted.len(),
            knots = report.knot_requests.len(),
            "format done"
        );
        Ok(report)
    }

    /// Replays the saved layout when nothing relevant changed since the last call.
    fn fast_path(
        &mut self,
        graph: &mut Graph,
        root: NodeId,
        anchor: NodeId,
        params: &FormatParams,
    ) -> Option<FormatReport> {
        let state = self.previous.get(&root)?;
        if let Some(reason) = state.formatting_required(graph, root, anchor, &self.config, params) {
            tracing::debug!(root = %root, reason, "fast path skipped");
            return None;
        }
        let position = graph.position(anchor)?;
        let delta = position - state.anchor_position;
        for (node, offset) in &state.offsets {
            graph.set_position(*node, position + *offset);
        }
        for comment in &state.comments {
            graph.translate(*comment, delta);
        }

        let mut report = FormatReport::new(root);
        report.fast_path = true;
        report.formatted = state
            .offsets
            .keys()
            .copied()
            .filter(|n| graph.kind(*n).is_some_and(|k| !k.is_knot()))
            .collect();
        report.comment_bounds = state
            .comments
            .iter()
            .filter_map(|c| {
                graph.bounds(*c).map(|bounds| CommentBounds {
                    comment: *c,
                    bounds,
                })
            })
            .collect();
        tracing::debug!(root = %root, moved = state.offsets.len(), "fast path hit");
        self.save(graph, root, anchor, params, &report);
        Some(report)
    }

    fn save(
        &mut self,
        graph: &Graph,
        root: NodeId,
        anchor: NodeId,
        params: &FormatParams,
        report: &FormatReport,
    ) {
        if !self.config.enable_fast_path {
            return;
        }
        let formatted: IndexSet<NodeId> = report.formatted.iter().copied().collect();
        let comments = report.comment_bounds.iter().map(|c| c.comment).collect();
        match EndState::capture(
            graph,
            root,
            anchor,
            &self.config,
            params,
            &formatted,
            comments,
        ) {
            Some(state) => {
                self.previous.insert(root, state);
            }
            None => self.forget(root),
        }
    }
}

/// Formats `root` once with default parameters.
pub fn format(graph: &mut Graph, root: NodeId, config: &FormatConfig) -> Result<FormatReport> {
    Formatter::new(config.clone())
        .format(graph, root, &FormatParams::default())
}

fn validate_root(graph: &Graph, root: NodeId, filter: &NodeFilter) -> Result<NodeKind> {
    let invalid = |reason| FormatError::InvalidRoot { node: root, reason };
    let kind = graph
        .kind(root)
        .ok_or_else(|| invalid(InvalidRootReason::Missing))?;
    if kind.is_comment() {
        return Err(invalid(InvalidRootReason::Comment));
    }
    if kind.is_knot() {
        return Err(invalid(InvalidRootReason::Knot));
    }
    if filter.is_ignored(root) {
        return Err(invalid(InvalidRootReason::Ignored));
    }
    Ok(kind)
}

/// Pool nodes and the pure nodes feeding them that have no measured size.
fn missing_sizes(graph: &Graph, pool: &IndexSet<NodeId>, filter: &NodeFilter) -> Vec<NodeId> {
    let mut nodes: IndexSet<NodeId> = pool.clone();
    for &consumer in pool {
        nodes.extend(node_tree(graph, consumer, |l| {
            let next = l.to_node();
            l.direction == PinDirection::Input
                && filter.allows(next)
                && graph.kind(next).is_some_and(|k| k.is_pure())
        }));
    }
    nodes
        .into_iter()
        .filter(|n| graph.bounds(*n).is_none())
        .collect()
}

/// Runs the layout passes. Returns `false` when the call was cancelled part way.
fn run_passes(ctx: &mut LayoutContext<'_>, params: &FormatParams) -> bool {
    let config = ctx.config;
    ctx.format_x(false);
    if params.is_cancelled() {
        return false;
    }

    {
        let _span = tracing::debug_span!("parameters").entered();
        ctx.parameters.format_pool(ctx.graph, &ctx.pool, config, ctx.filter);
    }
    if params.is_cancelled() {
        return false;
    }

    if config.apply_comment_padding {
        let formatted = ctx.formatted_nodes();
        ctx.comments = CommentTree::build(ctx.graph, &formatted, &ctx.parameters);
    }
    ctx.format_x(true);
    ctx.compute_same_row();
    if config.expand_nodes_ahead_of_parameters {
        ctx.expand_ahead_of_parameters();
    }
    if config.apply_comment_padding {
        ctx.apply_comment_padding_x();
    }
    if params.is_cancelled() {
        return false;
    }

    ctx.format_y();
    if config.expand_nodes_by_height {
        ctx.expand_by_height();
    }
    if config.apply_comment_padding {
        ctx.apply_comment_padding_y();
    }
    ctx.separate_overlaps();
    ctx.settle_same_row();
    !params.is_cancelled()
}

fn aligned(position: Vec2) -> Vec2 {
    Vec2::new(align_to_grid(position.x), align_to_grid(position.y))
}

/// Translates `nodes` so `anchor` lands back on `target`.
fn restore_anchor(graph: &mut Graph, anchor: NodeId, target: Vec2, nodes: &[NodeId]) {
    let Some(position) = graph.position(anchor) else {
        return;
    };
    let delta = target - position;
    if delta == Vec2::ZERO {
        return;
    }
    for node in nodes {
        graph.translate(*node, delta);
    }
}

fn parameter_groups(parameters: &ParameterSet) -> Vec<ParameterGroup> {
    parameters
        .formatters()
        .filter(|f| f.formatted().next().is_some())
        .map(|f| ParameterGroup {
            consumer: f.root(),
            nodes: f.formatted().collect(),
        })
        .collect()
}
