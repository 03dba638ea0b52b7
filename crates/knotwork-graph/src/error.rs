use crate::graph::{NodeId, PinDirection, PinId};

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("unknown pin {0}")]
    UnknownPin(PinId),
    #[error("cannot link {a} to {b}: both pins are {direction:?}")]
    SameDirectionLink {
        a: PinId,
        b: PinId,
        direction: PinDirection,
    },
    #[error("cannot link two pins of node {0}")]
    SelfLink(NodeId),
    #[error("node {0} is not a knot")]
    NotAKnot(NodeId),
    #[error("node {0} is not a comment")]
    NotAComment(NodeId),
    #[error("pin {from} lists {to} as linked but {to} does not link back")]
    AsymmetricLink { from: PinId, to: PinId },
    #[error("invalid graph document: {0}")]
    InvalidDocument(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
