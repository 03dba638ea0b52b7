//! Arena-backed node graph.
//!
//! Nodes are stored in slots indexed by [`NodeId`]; a removed node leaves an empty slot so ids
//! held by callers never alias a different node. Pins belong to exactly one node and are
//! addressed by [`PinId`]. Links are stored on both endpoint pins and kept symmetric by every
//! mutating API.

mod knot;
mod link;

pub use link::{LinkKey, PinLink};

use crate::error::{GraphError, Result};
use crate::geometry::{Rect, Vec2};
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use std::fmt;

type HashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinId {
    pub node: NodeId,
    pub index: u32,
}

impl PinId {
    pub const fn new(node: NodeId, index: u32) -> Self {
        Self { node, index }
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.node, self.index)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PinDirection {
    Input,
    #[default]
    Output,
}

impl PinDirection {
    pub const fn complement(self) -> Self {
        match self {
            Self::Input => Self::Output,
            Self::Output => Self::Input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PinCategory {
    Exec,
    Parameter,
    Delegate,
}

/// Closed set of node variants. Capabilities are answered from the variant alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    /// Exec node with side effects.
    Impure,
    /// Data-only node: no exec pins, laid out by parameter formatters.
    Pure,
    /// Exec entry point.
    Event,
    /// Routing waypoint with one input and one output pin.
    Knot,
    /// Grouping box owning a member list.
    Comment,
}

impl NodeKind {
    pub const fn is_pure(self) -> bool {
        matches!(self, Self::Pure)
    }

    /// Nodes that take part in exec layout.
    pub const fn is_impure(self) -> bool {
        matches!(self, Self::Impure | Self::Event)
    }

    pub const fn is_event(self) -> bool {
        matches!(self, Self::Event)
    }

    pub const fn is_knot(self) -> bool {
        matches!(self, Self::Knot)
    }

    pub const fn is_comment(self) -> bool {
        matches!(self, Self::Comment)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub name: String,
    pub direction: PinDirection,
    pub category: PinCategory,
    /// Vertical offset of the connection point from the node's top edge.
    pub offset_y: f64,
    links: Vec<PinId>,
}

impl Pin {
    pub fn new(
        name: impl Into<String>,
        direction: PinDirection,
        category: PinCategory,
        offset_y: f64,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            category,
            offset_y,
            links: Vec::new(),
        }
    }

    pub fn input(name: impl Into<String>, category: PinCategory, offset_y: f64) -> Self {
        Self::new(name, PinDirection::Input, category, offset_y)
    }

    pub fn output(name: impl Into<String>, category: PinCategory, offset_y: f64) -> Self {
        Self::new(name, PinDirection::Output, category, offset_y)
    }

    /// Pins this pin is directly linked to, in link order.
    pub fn links(&self) -> &[PinId] {
        &self.links
    }

    pub fn is_linked(&self) -> bool {
        !self.links.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub title: String,
    pub kind: NodeKind,
    pub position: Vec2,
    /// Host-measured size. `None` until the host has measured the node.
    pub size: Option<Vec2>,
    /// Host-maintained counter bumped whenever the node changes visually.
    pub revision: u64,
    pins: Vec<Pin>,
    members: Vec<NodeId>,
}

impl Node {
    pub fn new(kind: NodeKind, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            kind,
            position: Vec2::ZERO,
            size: None,
            revision: 0,
            pins: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.size = Some(Vec2::new(width, height));
        self
    }

    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }

    pub fn pin(&self, index: u32) -> Option<&Pin> {
        self.pins.get(index as usize)
    }

    /// Members of a comment node. Empty for every other kind.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.size
            .map(|size| Rect::from_origin_size(self.position, size))
    }
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    live: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        // Links can only be created through `link`, never smuggled in with the node.
        for pin in &mut node.pins {
            pin.links.clear();
        }
        self.nodes.push(Some(node));
        self.live += 1;
        id
    }

    pub fn add_pin(&mut self, node: NodeId, mut pin: Pin) -> Result<PinId> {
        let entry = self.node_mut(node).ok_or(GraphError::UnknownNode(node))?;
        pin.links.clear();
        entry.pins.push(pin);
        Ok(PinId::new(node, (entry.pins.len() - 1) as u32))
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index()).and_then(Option::as_mut)
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.as_ref().map(|n| (NodeId(i as u32), n)))
    }

    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.node(id).map(|n| n.kind)
    }

    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.node(id.node).and_then(|n| n.pin(id.index))
    }

    pub fn pin_ids(&self, node: NodeId) -> impl Iterator<Item = PinId> + '_ {
        let count = self.node(node).map_or(0, |n| n.pins.len());
        (0..count as u32).map(move |i| PinId::new(node, i))
    }

    /// Looks a pin up by name; the first match wins.
    pub fn find_pin(&self, node: NodeId, name: &str) -> Option<PinId> {
        let entry = self.node(node)?;
        entry
            .pins
            .iter()
            .position(|p| p.name == name)
            .map(|i| PinId::new(node, i as u32))
    }

    pub fn position(&self, id: NodeId) -> Option<Vec2> {
        self.node(id).map(|n| n.position)
    }

    pub fn set_position(&mut self, id: NodeId, position: Vec2) -> bool {
        match self.node_mut(id) {
            Some(node) => {
                node.position = position;
                true
            }
            None => false,
        }
    }

    pub fn translate(&mut self, id: NodeId, delta: Vec2) {
        if let Some(node) = self.node_mut(id) {
            node.position += delta;
        }
    }

    /// Node bounds, or `None` when the node is unknown or has not been measured.
    pub fn bounds(&self, id: NodeId) -> Option<Rect> {
        self.node(id).and_then(Node::bounds)
    }

    /// Absolute connection point of a pin: inputs sit on the left edge, outputs on the right.
    pub fn pin_position(&self, id: PinId) -> Option<Vec2> {
        let node = self.node(id.node)?;
        let pin = node.pin(id.index)?;
        let width = node.size.map_or(0.0, |s| s.x);
        let x = match pin.direction {
            PinDirection::Input => node.position.x,
            PinDirection::Output => node.position.x + width,
        };
        Some(Vec2::new(x, node.position.y + pin.offset_y))
    }

    pub fn link(&mut self, a: PinId, b: PinId) -> Result<()> {
        let pa = self.pin(a).ok_or(GraphError::UnknownPin(a))?;
        let pb = self.pin(b).ok_or(GraphError::UnknownPin(b))?;
        if a.node == b.node {
            return Err(GraphError::SelfLink(a.node));
        }
        if pa.direction == pb.direction {
            return Err(GraphError::SameDirectionLink {
                a,
                b,
                direction: pa.direction,
            });
        }
        if pa.links.contains(&b) {
            return Ok(());
        }
        self.pin_slot(a).ok_or(GraphError::UnknownPin(a))?.links.push(b);
        self.pin_slot(b).ok_or(GraphError::UnknownPin(b))?.links.push(a);
        Ok(())
    }

    pub fn unlink(&mut self, a: PinId, b: PinId) -> bool {
        if !self.is_linked(a, b) {
            return false;
        }
        for (pin, other) in [(a, b), (b, a)] {
            if let Some(slot) = self.pin_slot(pin) {
                slot.links.retain(|p| *p != other);
            }
        }
        true
    }

    pub fn is_linked(&self, a: PinId, b: PinId) -> bool {
        self.pin(a).is_some_and(|p| p.links.contains(&b))
    }

    /// Removes a node, its links and its membership in every comment.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let mut node = self.nodes.get_mut(id.index())?.take()?;
        self.live -= 1;
        for (index, pin) in node.pins.iter_mut().enumerate() {
            let me = PinId::new(id, index as u32);
            for other in pin.links.drain(..) {
                if let Some(other_pin) = self.pin_slot(other) {
                    other_pin.links.retain(|p| *p != me);
                }
            }
        }
        for slot in self.nodes.iter_mut().flatten() {
            slot.members.retain(|m| *m != id);
        }
        Some(node)
    }

    pub fn set_members<I>(&mut self, comment: NodeId, members: I) -> Result<()>
    where
        I: IntoIterator<Item = NodeId>,
    {
        let mut list: Vec<NodeId> = Vec::new();
        for member in members {
            if member == comment {
                continue;
            }
            if !self.contains_node(member) {
                return Err(GraphError::UnknownNode(member));
            }
            if !list.contains(&member) {
                list.push(member);
            }
        }
        let node = self
            .node_mut(comment)
            .ok_or(GraphError::UnknownNode(comment))?;
        if !node.kind.is_comment() {
            return Err(GraphError::NotAComment(comment));
        }
        node.members = list;
        Ok(())
    }

    pub fn comments(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes()
            .filter(|(_, n)| n.kind.is_comment())
            .map(|(id, _)| id)
    }

    pub fn comment_members(&self, comment: NodeId) -> &[NodeId] {
        self.node(comment).map_or(&[], |n| n.members.as_slice())
    }

    /// Comments listing `node` as a member, in id order.
    pub fn containing_comments(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.kind.is_comment() && n.members.contains(&node))
            .map(|(id, _)| id)
            .collect()
    }

    /// Logical endpoints of `pin`, looking through knot nodes.
    pub fn resolved_links(&self, pin: PinId) -> Vec<PinId> {
        let Some(start) = self.pin(pin) else {
            return Vec::new();
        };
        let mut out: Vec<PinId> = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::default();
        let mut stack: Vec<PinId> = start.links.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            let Some(node) = self.node(current.node) else {
                continue;
            };
            if !node.kind.is_knot() {
                if current.node != pin.node && !out.contains(&current) {
                    out.push(current);
                }
                continue;
            }
            if !visited.insert(current.node) {
                continue;
            }
            let Some(entered) = node.pin(current.index) else {
                continue;
            };
            for exit in node.pins.iter().filter(|p| p.direction != entered.direction) {
                stack.extend(exit.links.iter().rev().copied());
            }
        }
        out
    }

    /// Logical links leaving `node`, one per (pin, resolved endpoint), in pin order.
    pub fn pin_links(&self, node: NodeId, direction: Option<PinDirection>) -> Vec<PinLink> {
        let Some(entry) = self.node(node) else {
            return Vec::new();
        };
        let mut links = Vec::new();
        for (index, pin) in entry.pins.iter().enumerate() {
            if direction.is_some_and(|d| d != pin.direction) {
                continue;
            }
            let from = PinId::new(node, index as u32);
            for to in self.resolved_links(from) {
                links.push(PinLink::new(from, to, pin.direction));
            }
        }
        links
    }

    /// Distinct nodes logically linked to `node`.
    pub fn linked_nodes(&self, node: NodeId, direction: Option<PinDirection>) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = Vec::new();
        for link in self.pin_links(node, direction) {
            if !out.contains(&link.to.node) {
                out.push(link.to.node);
            }
        }
        out
    }

    pub fn has_links(&self, node: NodeId) -> bool {
        self.node(node)
            .is_some_and(|n| n.pins.iter().any(Pin::is_linked))
    }

    /// Number of direct links, each counted once.
    pub fn link_count(&self) -> usize {
        self.nodes()
            .flat_map(|(_, n)| n.pins.iter())
            .map(|p| p.links.len())
            .sum::<usize>()
            / 2
    }

    /// Checks that every link is mirrored on the other pin and joins opposite directions.
    pub fn validate(&self) -> Result<()> {
        for (id, node) in self.nodes() {
            for (index, pin) in node.pins.iter().enumerate() {
                let from = PinId::new(id, index as u32);
                for &to in &pin.links {
                    let other = self.pin(to).ok_or(GraphError::UnknownPin(to))?;
                    if !other.links.contains(&from) {
                        return Err(GraphError::AsymmetricLink { from, to });
                    }
                    if other.direction == pin.direction {
                        return Err(GraphError::SameDirectionLink {
                            a: from,
                            b: to,
                            direction: pin.direction,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    fn pin_slot(&mut self, id: PinId) -> Option<&mut Pin> {
        self.node_mut(id.node)
            .and_then(|n| n.pins.get_mut(id.index as usize))
    }
}
