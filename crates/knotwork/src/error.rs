use knotwork_graph::{GraphError, NodeId};
use std::fmt;

/// Why a node cannot anchor a format call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidRootReason {
    Missing,
    Comment,
    Knot,
    Ignored,
}

impl fmt::Display for InvalidRootReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Missing => "it does not exist",
            Self::Comment => "it is a comment",
            Self::Knot => "it is a knot",
            Self::Ignored => "it is in the ignored set",
        };
        f.write_str(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("cannot format from node {node}: {reason}")]
    InvalidRoot {
        node: NodeId,
        reason: InvalidRootReason,
    },
    #[error("{} node(s) have no measured size yet: {nodes:?}", nodes.len())]
    MissingSize { nodes: Vec<NodeId> },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

pub type Result<T> = std::result::Result<T, FormatError>;
