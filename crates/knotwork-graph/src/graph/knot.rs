use super::{Graph, HashSet, Node, NodeId, NodeKind, Pin, PinCategory, PinDirection, PinId};
use crate::error::{GraphError, Result};
use crate::geometry::Vec2;

pub const KNOT_INPUT: u32 = 0;
pub const KNOT_OUTPUT: u32 = 1;

impl Graph {
    /// Adds an unlinked knot whose input and output pins sit at its vertical center.
    pub fn add_knot(&mut self, position: Vec2, size: Vec2, category: PinCategory) -> NodeId {
        let mut node = Node::new(NodeKind::Knot, "knot");
        node.position = position;
        node.size = Some(size);
        let id = self.add_node(node);
        let mid = size.y * 0.5;
        if let Some(node) = self.node_mut(id) {
            node.pins
                .push(Pin::new("in", PinDirection::Input, category, mid));
            node.pins
                .push(Pin::new("out", PinDirection::Output, category, mid));
        }
        id
    }

    pub fn knot_input(knot: NodeId) -> PinId {
        PinId::new(knot, KNOT_INPUT)
    }

    pub fn knot_output(knot: NodeId) -> PinId {
        PinId::new(knot, KNOT_OUTPUT)
    }

    /// Removes a knot and links every upstream pin straight to every downstream pin.
    pub fn dissolve_knot(&mut self, knot: NodeId) -> Result<()> {
        let node = self.node(knot).ok_or(GraphError::UnknownNode(knot))?;
        if !node.kind.is_knot() {
            return Err(GraphError::NotAKnot(knot));
        }
        let mut upstream: Vec<PinId> = Vec::new();
        let mut downstream: Vec<PinId> = Vec::new();
        for pin in &node.pins {
            match pin.direction {
                PinDirection::Input => upstream.extend(pin.links.iter().copied()),
                PinDirection::Output => downstream.extend(pin.links.iter().copied()),
            }
        }
        self.remove_node(knot);
        for &up in &upstream {
            for &down in &downstream {
                if up.node != down.node {
                    self.link(up, down)?;
                }
            }
        }
        Ok(())
    }

    /// Knots reachable from `pin` by walking through knot nodes only, in discovery order.
    pub fn knot_chain(&self, pin: PinId) -> Vec<NodeId> {
        let Some(start) = self.pin(pin) else {
            return Vec::new();
        };
        let mut chain: Vec<NodeId> = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::default();
        let mut stack: Vec<PinId> = start.links.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current.node) else {
                continue;
            };
            if !node.kind.is_knot() || !visited.insert(current.node) {
                continue;
            }
            chain.push(current.node);
            let Some(entered) = node.pin(current.index) else {
                continue;
            };
            for exit in node.pins.iter().filter(|p| p.direction != entered.direction) {
                stack.extend(exit.links.iter().rev().copied());
            }
        }
        chain
    }

    /// Non-knot pins linked directly to the output side of a knot.
    pub fn knot_targets(&self, knot: NodeId) -> Vec<PinId> {
        let Some(node) = self.node(knot) else {
            return Vec::new();
        };
        node.pins
            .iter()
            .filter(|p| p.direction == PinDirection::Output)
            .flat_map(|p| p.links.iter().copied())
            .filter(|p| self.kind(p.node).is_some_and(|k| !k.is_knot()))
            .collect()
    }
}
