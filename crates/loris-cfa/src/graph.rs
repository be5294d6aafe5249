use std::fmt;

use crate::expr::EdgeOp;

/// A unique identifier for a CFA location.
pub type NodeId = usize;
/// A unique identifier for a CFA edge.
pub type EdgeId = usize;

/// A location in the control-flow automaton.
#[derive(Debug, Clone)]
pub struct CfaNode {
    pub id: NodeId,
    /// Human-readable label, used in traces and diagnostics.
    pub name: String,
    /// Edges leaving this location.
    pub leaving_edges: Vec<EdgeId>,
    /// Edges entering this location.
    pub entering_edges: Vec<EdgeId>,
    /// Whether this location is the entry of a function body.
    pub is_function_entry: bool,
    /// Whether this location is the exit of a function body.
    pub is_function_exit: bool,
    /// Whether reaching this location violates the checked property.
    pub is_error: bool,
}

/// A labeled transition between two CFA locations.
#[derive(Debug, Clone)]
pub struct CfaEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub op: EdgeOp,
}

impl fmt::Display for CfaEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -{}-> {}", self.source, self.op, self.target)
    }
}

/// An immutable control-flow automaton.
///
/// Built once by [`CfaBuilder`]; the analysis engine only reads it.
#[derive(Debug, Clone)]
pub struct Cfa {
    nodes: Vec<CfaNode>,
    edges: Vec<CfaEdge>,
    entry: NodeId,
}

impl Cfa {
    pub fn entry(&self) -> NodeId {
        self.entry
    }

    pub fn node(&self, id: NodeId) -> &CfaNode {
        &self.nodes[id]
    }

    pub fn edge(&self, id: EdgeId) -> &CfaEdge {
        &self.edges[id]
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Iterate over the edges leaving the given location.
    pub fn leaving_edges(&self, id: NodeId) -> impl Iterator<Item = &CfaEdge> {
        self.nodes[id].leaving_edges.iter().map(|e| &self.edges[*e])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CfaNode> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = &CfaEdge> {
        self.edges.iter()
    }
}

/// Incremental builder for [`Cfa`].
#[derive(Debug, Default)]
pub struct CfaBuilder {
    nodes: Vec<CfaNode>,
    edges: Vec<CfaEdge>,
}

impl CfaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plain location and return its id.
    pub fn node(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(CfaNode {
            id,
            name: name.into(),
            leaving_edges: Vec::new(),
            entering_edges: Vec::new(),
            is_function_entry: false,
            is_function_exit: false,
            is_error: false,
        });
        id
    }

    /// Add an error location (reaching it is a property violation).
    pub fn error_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.node(name);
        self.nodes[id].is_error = true;
        id
    }

    /// Add a function-entry location.
    pub fn function_entry_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.node(name);
        self.nodes[id].is_function_entry = true;
        id
    }

    /// Add a function-exit location.
    pub fn function_exit_node(&mut self, name: impl Into<String>) -> NodeId {
        let id = self.node(name);
        self.nodes[id].is_function_exit = true;
        id
    }

    /// Add an edge labeled with the given operation and return its id.
    pub fn edge(&mut self, source: NodeId, target: NodeId, op: EdgeOp) -> EdgeId {
        assert!(source < self.nodes.len() && target < self.nodes.len());
        let id = self.edges.len();
        self.edges.push(CfaEdge {
            id,
            source,
            target,
            op,
        });
        self.nodes[source].leaving_edges.push(id);
        self.nodes[target].entering_edges.push(id);
        id
    }

    /// Finish construction. `entry` is the initial location of the program.
    pub fn build(self, entry: NodeId) -> Cfa {
        assert!(entry < self.nodes.len(), "entry node out of range");
        Cfa {
            nodes: self.nodes,
            edges: self.edges,
            entry,
        }
    }
}
