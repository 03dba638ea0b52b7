//! JSON interchange format for graphs.
//!
//! Nodes are named by string ids and pins by `(node id, pin name)` pairs, so documents stay
//! readable and stable when the arena is rebuilt.

use crate::error::{GraphError, Result};
use crate::geometry::Vec2;
use crate::graph::{Graph, Node, NodeId, NodeKind, Pin, PinCategory, PinDirection, PinId};
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

type HashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    pub nodes: Vec<NodeDocument>,
    #[serde(default)]
    pub links: Vec<[PinRef; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDocument {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Vec2>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub revision: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pins: Vec<PinDocument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinDocument {
    pub name: String,
    pub direction: PinDirection,
    pub category: PinCategory,
    #[serde(default)]
    pub offset_y: f64,
}

/// `[node id, pin name]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinRef(pub String, pub String);

fn is_zero(v: &u64) -> bool {
    *v == 0
}

/// Maps document ids to arena ids and back.
#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    by_name: HashMap<String, NodeId>,
    names: HashMap<NodeId, String>,
}

impl DocumentIndex {
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn require(&self, name: &str) -> Result<NodeId> {
        self.node(name)
            .ok_or_else(|| GraphError::InvalidDocument(format!("unknown node id `{name}`")))
    }

    /// Document id of a node; nodes created after loading get a synthetic `knot-<n>` id.
    pub fn name(&self, id: NodeId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("knot-{}", id.0))
    }

    fn insert(&mut self, name: String, id: NodeId) {
        self.names.insert(id, name.clone());
        self.by_name.insert(name, id);
    }
}

impl GraphDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let text = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(text)
    }

    /// Builds the arena graph. Ids must be unique and every link must name existing pins.
    pub fn build(&self) -> Result<(Graph, DocumentIndex)> {
        let mut graph = Graph::new();
        let mut index = DocumentIndex::default();
        for doc in &self.nodes {
            if index.node(&doc.id).is_some() {
                return Err(GraphError::InvalidDocument(format!(
                    "duplicate node id `{}`",
                    doc.id
                )));
            }
            let mut node = Node::new(doc.kind, doc.title.clone());
            node.position = doc.position;
            node.size = doc.size;
            node.revision = doc.revision;
            let id = graph.add_node(node);
            for pin in &doc.pins {
                graph.add_pin(
                    id,
                    Pin::new(pin.name.clone(), pin.direction, pin.category, pin.offset_y),
                )?;
            }
            index.insert(doc.id.clone(), id);
        }

        for doc in &self.nodes {
            if doc.members.is_empty() {
                continue;
            }
            let comment = index.require(&doc.id)?;
            let members = doc
                .members
                .iter()
                .map(|m| index.require(m))
                .collect::<Result<Vec<_>>>()?;
            graph.set_members(comment, members)?;
        }

        for [a, b] in &self.links {
            let a = resolve_pin(&graph, &index, a)?;
            let b = resolve_pin(&graph, &index, b)?;
            graph.link(a, b)?;
        }
        Ok((graph, index))
    }

    /// Serializes `graph` back into a document, naming nodes through `index`.
    pub fn from_graph(graph: &Graph, index: &DocumentIndex) -> Self {
        let mut nodes = Vec::with_capacity(graph.node_count());
        let mut links = Vec::new();
        for (id, node) in graph.nodes() {
            nodes.push(NodeDocument {
                id: index.name(id),
                title: node.title.clone(),
                kind: node.kind,
                position: node.position,
                size: node.size,
                revision: node.revision,
                pins: node
                    .pins()
                    .iter()
                    .map(|p| PinDocument {
                        name: p.name.clone(),
                        direction: p.direction,
                        category: p.category,
                        offset_y: p.offset_y,
                    })
                    .collect(),
                members: node.members().iter().map(|m| index.name(*m)).collect(),
            });
            for pin in node.pins() {
                if pin.direction != PinDirection::Output {
                    continue;
                }
                for to in pin.links() {
                    let Some(to_pin) = graph.pin(*to) else {
                        continue;
                    };
                    links.push([
                        PinRef(index.name(id), pin.name.clone()),
                        PinRef(index.name(to.node), to_pin.name.clone()),
                    ]);
                }
            }
        }
        Self { nodes, links }
    }
}

fn resolve_pin(graph: &Graph, index: &DocumentIndex, pin: &PinRef) -> Result<PinId> {
    let node = index.require(&pin.0)?;
    graph.find_pin(node, &pin.1).ok_or_else(|| {
        GraphError::InvalidDocument(format!("node `{}` has no pin `{}`", pin.0, pin.1))
    })
}
