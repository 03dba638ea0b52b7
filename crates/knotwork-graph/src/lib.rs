//! Graph model consumed by the `knotwork` formatter.
//!
//! Nodes live in an arena and are addressed by stable [`NodeId`]s. Pins are addressed by
//! `(node, index)` pairs, so removing a node never leaves a dangling reference behind. Every
//! link is recorded on both of its pins.
//!
//! Knot nodes are routing waypoints: [`Graph::resolved_links`] and [`Graph::pin_links`] look
//! through them and report the logical endpoints.

#![forbid(unsafe_code)]

pub mod document;
mod error;
pub mod geometry;
mod graph;

pub use document::{DocumentIndex, GraphDocument};
pub use error::{GraphError, Result};
pub use geometry::{
    ALIGN_GRID, Margin, Rect, RoundingMethod, Vec2, align_to_grid, grouped_bounds, snap_to_grid,
};
pub use graph::{
    Graph, LinkKey, Node, NodeId, NodeKind, Pin, PinCategory, PinDirection, PinId, PinLink,
};
