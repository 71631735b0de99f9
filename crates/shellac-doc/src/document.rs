//! Material document container and queries.

use crate::element::{Material, NodeDef, NodeElement, NodeGraph, OutputElement};
use std::collections::HashMap;

/// A loaded material document.
///
/// Holds node definitions, node graphs, free-standing nodes and outputs,
/// and materials. Node and output names are expected to be unique across
/// the document; lookups search document-level elements first and node
/// graphs second.
#[derive(Debug, Default)]
pub struct Document {
    node_defs: HashMap<String, NodeDef>,
    node_graphs: Vec<NodeGraph>,
    materials: Vec<Material>,
    nodes: Vec<NodeElement>,
    outputs: Vec<OutputElement>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a node definition.
    pub fn add_node_def(&mut self, def: NodeDef) {
        self.node_defs.insert(def.name.clone(), def);
    }

    /// Finds a node definition by name.
    pub fn node_def(&self, name: &str) -> Option<&NodeDef> {
        self.node_defs.get(name)
    }

    /// Adds a node graph.
    pub fn add_node_graph(&mut self, graph: NodeGraph) {
        self.node_graphs.push(graph);
    }

    /// Finds a node graph by name.
    pub fn node_graph(&self, name: &str) -> Option<&NodeGraph> {
        self.node_graphs.iter().find(|g| g.name == name)
    }

    /// Adds a material.
    pub fn add_material(&mut self, material: Material) {
        self.materials.push(material);
    }

    /// Finds a material by name.
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    /// Adds a free-standing node instance.
    pub fn add_node(&mut self, node: NodeElement) {
        self.nodes.push(node);
    }

    /// Adds a free-standing output element.
    pub fn add_output(&mut self, output: OutputElement) {
        self.outputs.push(output);
    }

    /// Finds a node instance anywhere in the document.
    pub fn node(&self, name: &str) -> Option<&NodeElement> {
        self.nodes
            .iter()
            .find(|n| n.name == name)
            .or_else(|| self.node_graphs.iter().find_map(|g| g.node(name)))
    }

    /// Finds an output element anywhere in the document.
    pub fn output(&self, name: &str) -> Option<&OutputElement> {
        self.outputs
            .iter()
            .find(|o| o.name == name)
            .or_else(|| self.node_graphs.iter().find_map(|g| g.output(name)))
    }

    /// Finds a named output of a named node graph.
    pub fn graph_output(&self, graph: &str, output: &str) -> Option<&OutputElement> {
        self.node_graph(graph).and_then(|g| g.output(output))
    }

    /// The node graph that declares the given output element, if any.
    pub fn parent_graph_of_output(&self, output: &str) -> Option<&NodeGraph> {
        self.node_graphs.iter().find(|g| g.output(output).is_some())
    }
}
