#![allow(dead_code)]

use knotwork::FormatConfig;
use knotwork::graph::{Graph, Node, NodeId, NodeKind, Pin, PinCategory, PinId, Rect, Vec2};

/// Small builder for test graphs. Exec nodes get an `exec` input and a `then` output at y 24.
#[derive(Debug, Default)]
pub struct Builder {
    pub graph: Graph,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&mut self, kind: NodeKind, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let node = Node::new(kind, format!("{kind:?}"))
            .with_position(x, y)
            .with_size(w, h);
        self.graph.add_node(node)
    }

    /// Impure node with `exec` (pin 0) and `then` (pin 1).
    pub fn exec(&mut self, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let id = self.node(NodeKind::Impure, x, y, w, h);
        self.input(id, "exec", PinCategory::Exec, 24.0);
        self.output(id, "then", PinCategory::Exec, 24.0);
        id
    }

    /// Event node with a single `then` output (pin 0).
    pub fn event(&mut self, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let id = self.node(NodeKind::Event, x, y, w, h);
        self.output(id, "then", PinCategory::Exec, 24.0);
        id
    }

    /// Pure node with a `value` output (pin 0).
    pub fn pure(&mut self, x: f64, y: f64, w: f64, h: f64) -> NodeId {
        let id = self.node(NodeKind::Pure, x, y, w, h);
        self.output(id, "value", PinCategory::Parameter, 24.0);
        id
    }

    pub fn comment(&mut self, members: &[NodeId]) -> NodeId {
        let id = self.node(NodeKind::Comment, 0.0, 0.0, 10.0, 10.0);
        self.graph
            .set_members(id, members.iter().copied())
            .expect("comment members");
        id
    }

    pub fn input(
        &mut self,
        node: NodeId,
        name: &str,
        category: PinCategory,
        offset: f64,
    ) -> PinId {
        self.graph
            .add_pin(node, Pin::input(name, category, offset))
            .expect("add input pin")
    }

    pub fn output(
        &mut self,
        node: NodeId,
        name: &str,
        category: PinCategory,
        offset: f64,
    ) -> PinId {
        self.graph
            .add_pin(node, Pin::output(name, category, offset))
            .expect("add output pin")
    }

    pub fn pin(&self, node: NodeId, name: &str) -> PinId {
        self.graph.find_pin(node, name).expect("pin exists")
    }

    pub fn link(&mut self, from: NodeId, from_pin: &str, to: NodeId, to_pin: &str) {
        let a = self.pin(from, from_pin);
        let b = self.pin(to, to_pin);
        self.graph.link(a, b).expect("link");
    }

    /// Links `from.then` to `to.exec`.
    pub fn then(&mut self, from: NodeId, to: NodeId) {
        self.link(from, "then", to, "exec");
    }

    pub fn position(&self, node: NodeId) -> Vec2 {
        self.graph.position(node).expect("node exists")
    }

    pub fn bounds(&self, node: NodeId) -> Rect {
        self.graph.bounds(node).expect("node has bounds")
    }

    pub fn pin_y(&self, pin: PinId) -> f64 {
        self.graph.pin_position(pin).expect("pin exists").y
    }
}

/// Default config without knot planning, so tests only look at positions.
pub fn config() -> FormatConfig {
    FormatConfig {
        create_knots: false,
        ..FormatConfig::default()
    }
}

/// Whether the two rects overlap once `a` is grown by `pad` on every side.
pub fn overlaps_padded(a: Rect, b: Rect, pad: Vec2) -> bool {
    let grown = Rect::new(a.left - pad.x, a.top - pad.y, a.right + pad.x, a.bottom + pad.y);
    grown.intersects(&b)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("knotwork=debug")
        .try_init();
}
