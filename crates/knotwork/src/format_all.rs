//! Formatting every root of a graph and arranging the resulting clusters.

use crate::config::{FormatAllStyle, FormatConfig};
use crate::error::{FormatError, Result};
use crate::formatter::{FormatParams, FormatReport, Formatter};
use crate::tree::exec_links;
use indexmap::IndexSet;
use knotwork_graph::{Graph, NodeId, PinDirection, Rect, Vec2, grouped_bounds};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatAllReport {
    pub roots: Vec<NodeId>,
    /// One report per formatted root, with positions after arrangement.
    pub clusters: Vec<FormatReport>,
    /// Roots left where they were because their cluster could not be formatted.
    pub skipped: Vec<NodeId>,
}

/// Event nodes, then impure nodes without incoming exec links, in id order.
pub fn find_roots(graph: &Graph, config: &FormatConfig) -> Vec<NodeId> {
    let mut roots: Vec<NodeId> = graph
        .nodes()
        .filter(|(_, n)| n.kind.is_event())
        .map(|(id, _)| id)
        .collect();
    for (id, node) in graph.nodes() {
        if node.kind.is_impure()
            && !node.kind.is_event()
            && exec_links(graph, id, Some(PinDirection::Input), config).is_empty()
        {
            roots.push(id);
        }
    }
    roots
}

#[derive(Debug)]
struct Cluster {
    report: FormatReport,
    bounds: Rect,
    root_y: f64,
}

impl Cluster {
    fn translate(&mut self, graph: &mut Graph, delta: Vec2) {
        if delta == Vec2::ZERO {
            return;
        }
        for node in &self.report.formatted {
            graph.translate(*node, delta);
        }
        for comment in &self.report.comment_bounds {
            graph.translate(comment.comment, delta);
        }
        self.report.translate(delta);
        self.bounds = self.bounds.offset_by(delta);
    }
}

/// Formats every root of `graph` and lays the clusters out without overlap.
///
/// Nodes formatted for an earlier root are ignored by later ones, so a node shared between
/// two exec chains stays with the first.
pub fn format_all(graph: &mut Graph, config: &FormatConfig) -> Result<FormatAllReport> {
    let _span = tracing::debug_span!("format_all").entered();
    let roots = find_roots(graph, config);
    let mut formatter = Formatter::new(config.clone());
    let mut done: IndexSet<NodeId> = IndexSet::new();
    let mut clusters: Vec<Cluster> = Vec::new();
    let mut skipped: Vec<NodeId> = Vec::new();

    for &root in &roots {
        if done.contains(&root) {
            continue;
        }
        let params = FormatParams {
            ignored_nodes: done.iter().copied().collect(),
            ..FormatParams::default()
        };
        let report = match formatter.format(graph, root, &params) {
            Ok(report) => report,
            Err(err @ (FormatError::MissingSize { .. } | FormatError::InvalidRoot { .. })) => {
                tracing::warn!(root = %root, error = %err, "skipping root");
                skipped.push(root);
                continue;
            }
            Err(err) => return Err(err),
        };
        done.extend(report.formatted.iter().copied());
        let bounds = grouped_bounds(
            report
                .formatted
                .iter()
                .filter_map(|n| graph.bounds(*n))
                .chain(report.comment_bounds.iter().map(|c| c.bounds)),
        );
        let Some(bounds) = bounds else {
            continue;
        };
        let root_y = graph.position(root).map_or(bounds.top, |p| p.y);
        clusters.push(Cluster {
            report,
            bounds,
            root_y,
        });
    }

    match config.format_all_style {
        FormatAllStyle::Simple => arrange_simple(graph, &mut clusters, config.format_all_padding),
        FormatAllStyle::Smart => arrange_smart(graph, &mut clusters, config.format_all_padding),
    }
    tracing::debug!(
        roots = roots.len(),
        clusters = clusters.len(),
        skipped = skipped.len(),
        "formatted all"
    );
    Ok(FormatAllReport {
        roots,
        clusters: clusters.into_iter().map(|c| c.report).collect(),
        skipped,
    })
}

/// One column ordered by root Y.
fn arrange_simple(graph: &mut Graph, clusters: &mut [Cluster], padding: Vec2) {
    let Some(area) = grouped_bounds(clusters.iter().map(|c| c.bounds)) else {
        return;
    };
    clusters.sort_by(|a, b| a.root_y.total_cmp(&b.root_y));
    stack_column(graph, clusters, area.left, area.top, padding.y);
}

/// Columns of clusters that overlap horizontally, placed side by side.
fn arrange_smart(graph: &mut Graph, clusters: &mut [Cluster], padding: Vec2) {
    let Some(area) = grouped_bounds(clusters.iter().map(|c| c.bounds)) else {
        return;
    };
    clusters.sort_by(|a, b| a.bounds.left.total_cmp(&b.bounds.left));

    let mut columns: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    let mut right = f64::NEG_INFINITY;
    for (i, cluster) in clusters.iter().enumerate() {
        if i > start && cluster.bounds.left >= right {
            columns.push((start, i));
            start = i;
            right = f64::NEG_INFINITY;
        }
        right = right.max(cluster.bounds.right);
    }
    if start < clusters.len() {
        columns.push((start, clusters.len()));
    }

    let mut left = area.left;
    for (from, to) in columns {
        let column = &mut clusters[from..to];
        column.sort_by(|a, b| a.root_y.total_cmp(&b.root_y));
        let width = stack_column(graph, column, left, area.top, padding.y);
        left += width + padding.x;
    }
}

/// Stacks `clusters` top to bottom starting at (`left`, `top`). Returns the column width.
fn stack_column(graph: &mut Graph, clusters: &mut [Cluster], left: f64, top: f64, gap: f64) -> f64 {
    let mut y = top;
    let mut width = 0.0_f64;
    for cluster in clusters {
        let delta = Vec2::new(left - cluster.bounds.left, y - cluster.bounds.top);
        cluster.translate(graph, delta);
        y = cluster.bounds.bottom + gap;
        width = width.max(cluster.bounds.width());
    }
    width
}
