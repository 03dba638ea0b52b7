#![forbid(unsafe_code)]

//! Auto-layout for node graphs in visual-scripting editors.
//!
//! A format call starts at a root node and runs a fixed sequence of passes over the exec nodes
//! around it:
//!
//! 1. the node pool is collected through exec links ([`build_pool`]);
//! 2. columns are assigned along the flow direction (X pass);
//! 3. pure dependencies are laid out next to their consumers (parameter pass);
//! 4. the X pass runs again with parameter clusters as obstacles;
//! 5. rows are assigned and same-row wires straightened (Y pass);
//! 6. comment boxes are padded apart, then refitted;
//! 7. knot tracks are planned for long or blocked wires.
//!
//! The graph itself lives in [`knotwork_graph`], re-exported as [`graph`].

pub mod comments;
pub mod config;
mod context;
pub mod error;
mod fingerprint;
pub mod format_all;
pub mod formatter;
mod guard;
pub mod knots;
mod parameter;
mod position_x;
mod position_y;
pub mod same_row;
pub mod tree;
mod x_info;

pub use knotwork_graph as graph;

pub use comments::CommentBounds;
pub use config::{FormatAllStyle, FormatConfig, FormattingStyle, ParameterStyle, WiringStyle};
pub use error::{FormatError, InvalidRootReason, Result};
pub use format_all::{FormatAllReport, find_roots, format_all};
pub use formatter::{FormatParams, FormatReport, Formatter, ParameterGroup, format};
pub use guard::TraversalGuard;
pub use knots::{KnotRequest, KnotTrack, PlannedKnot, apply_knot_requests};
pub use position_y::MAX_COLLISION_ITERATIONS;
pub use same_row::SameRowMapping;
pub use tree::{NodeFilter, NodePool, build_pool, node_tree};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
