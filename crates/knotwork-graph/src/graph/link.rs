use super::{NodeId, PinDirection, PinId};
use serde::{Deserialize, Serialize};

/// A directed view of a pin connection. `direction` is the direction of the `from` pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinLink {
    pub from: PinId,
    pub to: PinId,
    pub direction: PinDirection,
}

impl PinLink {
    pub const fn new(from: PinId, to: PinId, direction: PinDirection) -> Self {
        Self {
            from,
            to,
            direction,
        }
    }

    pub const fn from_node(&self) -> NodeId {
        self.from.node
    }

    pub const fn to_node(&self) -> NodeId {
        self.to.node
    }

    /// The same connection seen from the other end.
    pub const fn opposite(&self) -> Self {
        Self {
            from: self.to,
            to: self.from,
            direction: self.direction.complement(),
        }
    }

    pub fn key(&self) -> LinkKey {
        LinkKey::new(self.from, self.to)
    }
}

/// Orientation-free identity of a link: a link and its opposite produce the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkKey {
    low: PinId,
    high: PinId,
}

impl LinkKey {
    pub fn new(a: PinId, b: PinId) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn pins(&self) -> (PinId, PinId) {
        (self.low, self.high)
    }
}

impl From<PinLink> for LinkKey {
    fn from(link: PinLink) -> Self {
        link.key()
    }
}
