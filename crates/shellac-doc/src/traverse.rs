//! Upstream edge traversal over document elements.
//!
//! [`Document::traverse_upstream`] walks the connection structure rooted
//! at an element and yields every edge `(upstream, connecting,
//! downstream)` reachable from it. Each element is expanded once, so an
//! edge appears exactly once even when elements are shared.

use crate::document::Document;
use crate::element::{BindInput, InputBinding, NodeElement, OutputElement, ShaderRef};
use std::collections::{HashSet, VecDeque};

/// A reference to a traversable document element.
#[derive(Debug, Clone, Copy)]
pub enum ElemRef<'a> {
    Node(&'a NodeElement),
    Output(&'a OutputElement),
    ShaderRef(&'a ShaderRef),
}

impl<'a> ElemRef<'a> {
    /// The element's name.
    pub fn name(&self) -> &'a str {
        match self {
            ElemRef::Node(n) => &n.name,
            ElemRef::Output(o) => &o.name,
            ElemRef::ShaderRef(s) => &s.name,
        }
    }

    fn key(&self) -> (u8, *const ()) {
        match *self {
            ElemRef::Node(n) => (0, (n as *const NodeElement).cast()),
            ElemRef::Output(o) => (1, (o as *const OutputElement).cast()),
            ElemRef::ShaderRef(s) => (2, (s as *const ShaderRef).cast()),
        }
    }
}

/// The connecting element an edge runs through.
#[derive(Debug, Clone, Copy)]
pub enum ConnRef<'a> {
    /// An input element on the downstream node.
    Input(&'a InputBinding),
    /// A bind-input on the downstream shader reference.
    BindInput(&'a BindInput),
}

/// One upstream edge: `upstream` feeds `downstream` through `connecting`.
#[derive(Debug, Clone, Copy)]
pub struct Edge<'a> {
    pub upstream: ElemRef<'a>,
    pub connecting: Option<ConnRef<'a>>,
    pub downstream: ElemRef<'a>,
}

/// Iterator over the upstream edges reachable from a root element.
///
/// Edges are yielded in breadth-first discovery order: an element's own
/// upstream edges appear before the edges of anything upstream of it.
pub struct UpstreamWalk<'a> {
    doc: &'a Document,
    queue: VecDeque<ElemRef<'a>>,
    ready: VecDeque<Edge<'a>>,
    visited: HashSet<(u8, *const ())>,
}

impl Document {
    /// Walks the connection structure upstream from `root`.
    pub fn traverse_upstream<'a>(&'a self, root: ElemRef<'a>) -> UpstreamWalk<'a> {
        let mut visited = HashSet::new();
        visited.insert(root.key());
        UpstreamWalk {
            doc: self,
            queue: VecDeque::from([root]),
            ready: VecDeque::new(),
            visited,
        }
    }
}

impl<'a> UpstreamWalk<'a> {
    fn enqueue(&mut self, elem: ElemRef<'a>) {
        if self.visited.insert(elem.key()) {
            self.queue.push_back(elem);
        }
    }

    fn expand(&mut self, elem: ElemRef<'a>) {
        match elem {
            ElemRef::Output(output) => {
                let Some(node) = output
                    .node_name
                    .as_deref()
                    .and_then(|n| self.doc.node(n))
                else {
                    return;
                };
                self.ready.push_back(Edge {
                    upstream: ElemRef::Node(node),
                    connecting: None,
                    downstream: elem,
                });
                self.enqueue(ElemRef::Node(node));
            }
            ElemRef::Node(node) => {
                for binding in &node.inputs {
                    let upstream = if let Some(r) = &binding.output_ref {
                        self.doc.graph_output(&r.graph, &r.output).map(ElemRef::Output)
                    } else if let Some(n) = &binding.node_name {
                        self.doc.node(n).map(ElemRef::Node)
                    } else {
                        None
                    };
                    if let Some(upstream) = upstream {
                        self.ready.push_back(Edge {
                            upstream,
                            connecting: Some(ConnRef::Input(binding)),
                            downstream: elem,
                        });
                        self.enqueue(upstream);
                    }
                }
            }
            ElemRef::ShaderRef(shader_ref) => {
                for bind in &shader_ref.bind_inputs {
                    let Some(r) = &bind.output_ref else { continue };
                    if let Some(output) = self.doc.graph_output(&r.graph, &r.output) {
                        let upstream = ElemRef::Output(output);
                        self.ready.push_back(Edge {
                            upstream,
                            connecting: Some(ConnRef::BindInput(bind)),
                            downstream: elem,
                        });
                        self.enqueue(upstream);
                    }
                }
            }
        }
    }
}

impl<'a> Iterator for UpstreamWalk<'a> {
    type Item = Edge<'a>;

    fn next(&mut self) -> Option<Edge<'a>> {
        loop {
            if let Some(edge) = self.ready.pop_front() {
                return Some(edge);
            }
            let elem = self.queue.pop_front()?;
            self.expand(elem);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Material, NodeGraph};
    use crate::value::Value;

    fn chain_doc() -> Document {
        // noise -> blur -> out
        let mut doc = Document::new();
        doc.add_node_graph(
            NodeGraph::new("g")
                .with_node(NodeElement::new("noise", "ND_noise_float"))
                .with_node(
                    NodeElement::new("blur", "ND_blur_float")
                        .with_input(InputBinding::connected("in", "noise")),
                )
                .with_output(OutputElement::new("out", "float").with_node("blur")),
        );
        doc
    }

    #[test]
    fn walks_chain_from_output() {
        let doc = chain_doc();
        let root = ElemRef::Output(doc.graph_output("g", "out").unwrap());
        let edges: Vec<_> = doc.traverse_upstream(root).collect();

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].upstream.name(), "blur");
        assert_eq!(edges[0].downstream.name(), "out");
        assert!(edges[0].connecting.is_none());
        assert_eq!(edges[1].upstream.name(), "noise");
        assert_eq!(edges[1].downstream.name(), "blur");
        assert!(matches!(edges[1].connecting, Some(ConnRef::Input(_))));
    }

    #[test]
    fn shared_upstream_expands_once() {
        // Two consumers of the same node: edges to it appear twice, its
        // own upstream edges once.
        let mut doc = Document::new();
        doc.add_node_graph(
            NodeGraph::new("g")
                .with_node(NodeElement::new("src", "ND_noise_float"))
                .with_node(
                    NodeElement::new("a", "ND_blur_float")
                        .with_input(InputBinding::connected("in", "src")),
                )
                .with_node(
                    NodeElement::new("mix", "ND_mix_float")
                        .with_input(InputBinding::connected("fg", "a"))
                        .with_input(InputBinding::connected("bg", "src")),
                )
                .with_output(OutputElement::new("out", "float").with_node("mix")),
        );
        let root = ElemRef::Output(doc.graph_output("g", "out").unwrap());
        let edges: Vec<_> = doc.traverse_upstream(root).collect();

        let into_src = edges
            .iter()
            .filter(|e| e.upstream.name() == "src")
            .count();
        assert_eq!(into_src, 2);
        // out<-mix, mix<-a, mix<-src, a<-src
        assert_eq!(edges.len(), 4);
    }

    #[test]
    fn shader_ref_jumps_through_graph_output() {
        let mut doc = chain_doc();
        doc.add_material(Material::new("m").with_shader_ref(
            ShaderRef::new("surf", "ND_plastic_surfaceshader")
                .with_bind_input(BindInput::to_graph_output("albedo", "g", "out")),
        ));
        let sref = doc.material("m").unwrap().shader_ref("surf").unwrap();
        let edges: Vec<_> = doc.traverse_upstream(ElemRef::ShaderRef(sref)).collect();

        assert_eq!(edges.len(), 3);
        assert!(matches!(edges[0].upstream, ElemRef::Output(_)));
        assert!(matches!(edges[0].connecting, Some(ConnRef::BindInput(_))));
        assert_eq!(edges[1].upstream.name(), "blur");
    }

    #[test]
    fn value_only_bindings_produce_no_edges() {
        let mut doc = Document::new();
        doc.add_node_graph(
            NodeGraph::new("g")
                .with_node(
                    NodeElement::new("c", "ND_constant_float")
                        .with_input(InputBinding::literal("value", Value::Float(2.0))),
                )
                .with_output(OutputElement::new("out", "float").with_node("c")),
        );
        let root = ElemRef::Output(doc.graph_output("g", "out").unwrap());
        let edges: Vec<_> = doc.traverse_upstream(root).collect();
        assert_eq!(edges.len(), 1);
    }
}
