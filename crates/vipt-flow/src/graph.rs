// Abstract traversal graph handed to renderers. Nested rule graphs hang off
// RuleSubgraph vertices; edges never cross a nesting level.
use serde::Serialize;
use vipt_core::{ChainId, RuleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VertexId(usize);

impl VertexId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexClass {
    Chain,
    Rule,
    RuleSubgraph,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum VertexKind {
    Chain {
        chain: ChainId,
        special: bool,
        /// Set when expansion stopped because the chain is already being expanded
        truncated: bool,
    },
    Rule {
        rule: RuleId,
    },
    RuleSubgraph {
        chain: ChainId,
        graph: FlowGraph,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Vertex {
    name: String,
    #[serde(flatten)]
    kind: VertexKind,
}

impl Vertex {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &VertexKind {
        &self.kind
    }

    pub fn class(&self) -> VertexClass {
        match self.kind {
            VertexKind::Chain { .. } => VertexClass::Chain,
            VertexKind::Rule { .. } => VertexClass::Rule,
            VertexKind::RuleSubgraph { .. } => VertexClass::RuleSubgraph,
        }
    }

    pub fn subgraph(&self) -> Option<&FlowGraph> {
        match &self.kind {
            VertexKind::RuleSubgraph { graph, .. } => Some(graph),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Fall through to the next chain or rule
    Next,
    /// Chain into the graph of its own rules
    Rules,
    Jump,
    Goto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: VertexId,
    pub to: VertexId,
    pub kind: EdgeKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FlowGraph {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vertex(&mut self, name: impl Into<String>, kind: VertexKind) -> VertexId {
        let id = VertexId(self.vertices.len());
        self.vertices.push(Vertex {
            name: name.into(),
            kind,
        });
        id
    }

    pub fn add_edge(&mut self, from: VertexId, to: VertexId, kind: EdgeKind) {
        self.edges.push(Edge { from, to, kind });
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.0]
    }

    pub fn vertices(&self) -> impl Iterator<Item = (VertexId, &Vertex)> {
        self.vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (VertexId(i), v))
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn successors(&self, id: VertexId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |edge| edge.from == id)
    }

    /// First vertex at this level with the given display name
    pub fn find_vertex(&self, name: &str) -> Option<VertexId> {
        self.vertices().find(|(_, v)| v.name == name).map(|(id, _)| id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices at every nesting level, depth first
    pub fn total_vertices(&self) -> usize {
        self.vertices
            .iter()
            .map(|v| 1 + v.subgraph().map_or(0, FlowGraph::total_vertices))
            .sum()
    }
}
