//! Builds shader graphs from material-document roots.
//!
//! Three entry points cover the supported roots: a declared node graph,
//! a bare output element, and a shader reference. Each expands document
//! elements into interior nodes and sockets, wires every connection, and
//! finalizes the graph through the lowering pipeline.

use crate::error::GraphError;
use crate::generator::Generator;
use crate::graph::ShaderGraph;
use crate::node::{Classification, Node};
use crate::port::{InputId, NodeId, OutputId};
use crate::types;
use shellac_doc::{
    ConnRef, Document, ElemRef, GeomProp, NodeDef, NodeElement, NodeGraph, OutputElement,
    ShaderRef, Value,
};
use std::collections::HashSet;

/// Constructs [`ShaderGraph`]s from the three supported document roots.
pub struct GraphBuilder<'a> {
    doc: &'a Document,
    generator: &'a dyn Generator,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(doc: &'a Document, generator: &'a dyn Generator) -> Self {
        Self { doc, generator }
    }

    /// Builds from any traversable element, dispatching on its kind.
    pub fn build(&self, name: &str, root: ElemRef<'a>) -> Result<ShaderGraph, GraphError> {
        match root {
            ElemRef::Output(output) => self.from_output(name, output),
            ElemRef::ShaderRef(shader_ref) => self.from_shader_ref(name, shader_ref),
            ElemRef::Node(node) => Err(GraphError::UnsupportedRoot {
                element: node.name.clone(),
                kind: "node elements cannot root a shader graph",
            }),
        }
    }

    /// Builds from a declared node-graph element with a nodedef interface.
    pub fn from_node_graph(&self, node_graph: &'a NodeGraph) -> Result<ShaderGraph, GraphError> {
        let def = node_graph
            .nodedef
            .as_deref()
            .and_then(|name| self.doc.node_def(name))
            .ok_or_else(|| {
                GraphError::NodeDefNotFound(
                    node_graph
                        .nodedef
                        .clone()
                        .unwrap_or_else(|| format!("<interface of {}>", node_graph.name)),
                )
            })?;

        let mut graph = ShaderGraph::new(&node_graph.name);
        self.add_input_sockets(&mut graph, def)?;
        for output in &node_graph.outputs {
            graph.add_output_socket(&output.name, types::resolve(&output.ty)?)?;
        }
        if node_graph.outputs.is_empty() {
            graph.add_output_socket("out", types::resolve(&def.ty)?)?;
        }

        for output in &node_graph.outputs {
            self.add_upstream_dependencies(&mut graph, ElemRef::Output(output), None)?;
        }

        self.classify_from_primary(&mut graph);
        graph.finalize(self.doc, self.generator)?;
        Ok(graph)
    }

    /// Builds from a bare output element.
    ///
    /// The interface supplying input sockets is the parent node-graph's
    /// nodedef when there is one, and the connected upstream node's
    /// nodedef otherwise.
    pub fn from_output(
        &self,
        name: &str,
        output: &'a OutputElement,
    ) -> Result<ShaderGraph, GraphError> {
        let interface = self
            .doc
            .parent_graph_of_output(&output.name)
            .and_then(|graph| graph.nodedef.as_deref())
            .and_then(|def| self.doc.node_def(def))
            .or_else(|| {
                output
                    .node_name
                    .as_deref()
                    .and_then(|node| self.doc.node(node))
                    .and_then(|node| self.doc.node_def(&node.nodedef))
            })
            .ok_or_else(|| GraphError::UnsupportedRoot {
                element: output.name.clone(),
                kind: "output has no resolvable interface",
            })?;

        let mut graph = ShaderGraph::new(name);
        self.add_input_sockets(&mut graph, interface)?;
        graph.add_output_socket(&output.name, types::resolve(&output.ty)?)?;

        self.add_upstream_dependencies(&mut graph, ElemRef::Output(output), None)?;

        self.classify_from_primary(&mut graph);
        graph.finalize(self.doc, self.generator)?;
        Ok(graph)
    }

    /// Builds from a shader reference binding a shader nodedef.
    pub fn from_shader_ref(
        &self,
        name: &str,
        shader_ref: &'a ShaderRef,
    ) -> Result<ShaderGraph, GraphError> {
        let def = self
            .doc
            .node_def(&shader_ref.nodedef)
            .ok_or_else(|| GraphError::NodeDefNotFound(shader_ref.nodedef.clone()))?;

        let mut graph = ShaderGraph::new(name);
        self.add_input_sockets(&mut graph, def)?;
        let mut declared_outputs = false;
        for port in def.outputs() {
            graph.add_output_socket(&port.name, types::resolve(&port.ty)?)?;
            declared_outputs = true;
        }
        if !declared_outputs {
            graph.add_output_socket("out", types::resolve(&def.ty)?)?;
        }

        // Instantiate the referenced shader node and expose its result.
        let node = Node::from_def(&shader_ref.name, def, self.generator, None)?;
        let id = graph.insert_node(node);
        let primary = OutputId { node: id, index: 0 };
        let output_socket = graph.primary_output_socket().map(|(socket, _)| socket);
        if let Some(socket) = output_socket {
            graph.connect(primary, socket);
        }

        // Parameters carry value overrides and always publish as sockets.
        for port in def.parameters() {
            let socket = self.interface_socket(&graph, &port.name)?;
            let index = self.node_input_index(&graph, id, &port.name)?;
            if let Some(value) = shader_ref.bind_param_value(&port.name) {
                graph.output_mut(socket).value = Some(value.clone());
            }
            graph.connect(socket, InputId { node: id, index });
        }

        // Inputs may carry a value, an explicit drive, or a geomprop
        // fallback; undriven inputs publish as sockets.
        for port in def.inputs() {
            let socket = self.interface_socket(&graph, &port.name)?;
            let index = self.node_input_index(&graph, id, &port.name)?;
            let input = InputId { node: id, index };
            let bind = shader_ref.bind_input(&port.name);
            if let Some(value) = bind.and_then(|b| b.value.as_ref()) {
                graph.output_mut(socket).value = Some(value.clone());
            }
            let explicitly_driven = bind.is_some_and(|b| b.output_ref.is_some());
            if !explicitly_driven {
                if let Some(geomprop) = &port.geomprop {
                    self.add_default_geom_node(&mut graph, input, geomprop)?;
                } else {
                    graph.connect(socket, input);
                }
            }
        }

        self.add_upstream_dependencies(
            &mut graph,
            ElemRef::ShaderRef(shader_ref),
            Some(&shader_ref.name),
        )?;

        self.classify_from_primary(&mut graph);
        graph.finalize(self.doc, self.generator)?;
        Ok(graph)
    }

    // ── shared expansion steps ─────────────────────────────────────────

    fn add_input_sockets(
        &self,
        graph: &mut ShaderGraph,
        interface: &NodeDef,
    ) -> Result<(), GraphError> {
        for port in interface.ports.iter().filter(|p| !matches!(p.kind, shellac_doc::PortKind::Output)) {
            let socket = graph.add_input_socket(&port.name, types::resolve(&port.ty)?)?;
            graph.output_mut(socket).value = port.value.clone();
        }
        Ok(())
    }

    fn interface_socket(
        &self,
        graph: &ShaderGraph,
        name: &str,
    ) -> Result<OutputId, GraphError> {
        graph
            .input_socket(name)
            .map(|(socket, _)| socket)
            .ok_or_else(|| GraphError::InterfaceNameMismatch {
                interface: name.to_string(),
                graph: graph.name().to_string(),
            })
    }

    fn node_input_index(
        &self,
        graph: &ShaderGraph,
        id: NodeId,
        name: &str,
    ) -> Result<usize, GraphError> {
        graph
            .node(id)
            .input_index(name)
            .ok_or_else(|| GraphError::InputNotFound {
                input: name.to_string(),
                node: graph.node(id).name().to_string(),
            })
    }

    /// Expands every element upstream of `root` into nodes and wires.
    ///
    /// `root_node` names the interior node bind-inputs attach to when the
    /// root is a shader reference.
    fn add_upstream_dependencies(
        &self,
        graph: &mut ShaderGraph,
        root: ElemRef<'a>,
        root_node: Option<&str>,
    ) -> Result<(), GraphError> {
        let root_id = root_node.and_then(|name| graph.node_id(name));
        let mut processed_outputs: HashSet<&str> = HashSet::new();

        for edge in self.doc.traverse_upstream(root) {
            // Skip outputs already short-circuited as upstream elements.
            if let ElemRef::Output(output) = edge.downstream {
                if processed_outputs.contains(output.name.as_str()) {
                    continue;
                }
            }

            // Jump over output elements to the node feeding them.
            let upstream = match edge.upstream {
                ElemRef::Output(output) => {
                    processed_outputs.insert(output.name.as_str());
                    match output.node_name.as_deref().and_then(|n| self.doc.node(n)) {
                        Some(node) => node,
                        None => continue,
                    }
                }
                ElemRef::Node(node) => node,
                ElemRef::ShaderRef(_) => continue,
            };

            let upstream_id = match graph.node_id(&upstream.name) {
                Some(id) => id,
                None => self.add_node(graph, upstream)?,
            };
            let upstream_output = OutputId {
                node: upstream_id,
                index: 0,
            };

            if let (Some(root_id), Some(ConnRef::BindInput(bind))) = (root_id, edge.connecting) {
                // Bind-inputs drive the root shader node directly.
                if let Some(index) = graph.node(root_id).input_index(&bind.name) {
                    graph.connect(
                        upstream_output,
                        InputId {
                            node: root_id,
                            index,
                        },
                    );
                }
                continue;
            }

            match edge.downstream {
                ElemRef::Node(downstream) => {
                    let Some(downstream_id) = graph.node_id(&downstream.name) else {
                        continue;
                    };
                    if let Some(ConnRef::Input(binding)) = edge.connecting {
                        let index = graph
                            .node(downstream_id)
                            .input_index(&binding.name)
                            .ok_or_else(|| GraphError::InputNotFound {
                                input: binding.name.clone(),
                                node: downstream.name.clone(),
                            })?;
                        graph.connect(
                            upstream_output,
                            InputId {
                                node: downstream_id,
                                index,
                            },
                        );
                    }
                }
                ElemRef::Output(downstream) => {
                    let socket = graph.output_socket(&downstream.name).map(|(socket, _)| socket);
                    if let Some(socket) = socket {
                        graph.connect(upstream_output, socket);
                    }
                }
                ElemRef::ShaderRef(_) => {}
            }
        }
        Ok(())
    }

    /// Creates an interior node from a document node element, publishing
    /// interface inputs, synthesizing geometry defaults, and queueing
    /// color transforms.
    fn add_node(&self, graph: &mut ShaderGraph, elem: &NodeElement) -> Result<NodeId, GraphError> {
        let def = self
            .doc
            .node_def(&elem.nodedef)
            .ok_or_else(|| GraphError::NodeDefNotFound(elem.nodedef.clone()))?;
        let node = Node::from_def(&elem.name, def, self.generator, Some(elem))?;
        let convolution = node.has_classification(Classification::CONVOLUTION2D);
        let id = graph.insert_node(node);
        if convolution {
            graph.add_classification(Classification::CONVOLUTION2D);
        }

        // Inputs published to the graph interface.
        for binding in &elem.inputs {
            let Some(interface) = binding.interface_name.as_deref() else {
                continue;
            };
            let socket = graph.input_socket(interface).map(|(s, _)| s).ok_or_else(|| {
                GraphError::InterfaceNameMismatch {
                    interface: interface.to_string(),
                    graph: graph.name().to_string(),
                }
            })?;
            if let Some(index) = graph.node(id).input_index(&binding.name) {
                graph.connect(socket, InputId { node: id, index });
            }
        }

        // Unbound inputs with a geomprop get a synthesized reader.
        for port in def.inputs() {
            let bound = elem.input(&port.name).is_some_and(|b| b.is_connected());
            if bound {
                continue;
            }
            let Some(geomprop) = &port.geomprop else { continue };
            let Some(index) = graph.node(id).input_index(&port.name) else {
                continue;
            };
            let input = InputId { node: id, index };
            if graph.input(input).is_connected() {
                continue;
            }
            self.add_default_geom_node(graph, input, geomprop)?;
        }

        // File textures tagged sRGB get a color transform at finalize.
        if graph.node(id).has_classification(Classification::FILETEXTURE) {
            let colorspace = elem.input("file").and_then(|b| b.attribute("colorspace"));
            if colorspace == Some("sRGB") {
                graph.color_transforms.push((id, "srgb_linear".to_string()));
            }
        }

        Ok(id)
    }

    /// Synthesizes (or reuses) the geometry-reader node for a geomprop
    /// and wires it into `input`.
    fn add_default_geom_node(
        &self,
        graph: &mut ShaderGraph,
        input: InputId,
        geomprop: &GeomProp,
    ) -> Result<(), GraphError> {
        let node_name = format!("default_{}", geomprop.name);
        if let Some(existing) = graph.node_id(&node_name) {
            graph.connect(
                OutputId {
                    node: existing,
                    index: 0,
                },
                input,
            );
            return Ok(());
        }

        // The input's type picks the reader variant; geomprop and input
        // types are required to agree.
        let def_name = format!("ND_{}_{}", geomprop.name, graph.input(input).ty().name());
        let def = self
            .doc
            .node_def(&def_name)
            .ok_or_else(|| GraphError::NodeDefNotFound(def_name))?;
        let mut node = Node::from_def(&node_name, def, self.generator, None)?;
        for (hint, value) in [
            ("space", &geomprop.space),
            ("index", &geomprop.index),
            ("attrname", &geomprop.attrname),
        ] {
            if let Some(value) = value {
                if let Some(port) = node.input_mut(hint) {
                    port.set_value(Some(Value::String(value.clone())));
                }
            }
        }
        let id = graph.insert_node(node);
        graph.connect(OutputId { node: id, index: 0 }, input);
        Ok(())
    }

    /// Folds the classification of the node feeding the primary output
    /// socket into the graph's own classification.
    fn classify_from_primary(&self, graph: &mut ShaderGraph) {
        let class = graph
            .primary_output_socket()
            .and_then(|(_, port)| port.upstream())
            .filter(|up| !up.node.is_graph())
            .map(|up| graph.node(up.node).classification());
        if let Some(class) = class {
            graph.add_classification(class);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ScopeInfo;
    use crate::testutil::{test_document, TestGenerator};
    use shellac_doc::glam::Vec3;
    use shellac_doc::{BindInput, InputBinding, Material, OutputElement};

    const RED: Value = Value::Color3(Vec3::new(1.0, 0.0, 0.0));
    const GREEN: Value = Value::Color3(Vec3::new(0.0, 1.0, 0.0));

    fn constant(name: &str, value: Value) -> NodeElement {
        let def = match value {
            Value::Color3(_) => "ND_constant_color3",
            _ => "ND_constant_float",
        };
        NodeElement::new(name, def).with_input(InputBinding::literal("value", value))
    }

    #[test]
    fn node_graph_entry_builds_sockets_and_interface_wiring() {
        let mut doc = test_document();
        doc.add_node_graph(
            NodeGraph::new("checker")
                .with_nodedef("ND_checkergraph_float")
                .with_node(
                    NodeElement::new("m1", "ND_multiply_float")
                        .with_input(InputBinding::interface("in1", "scale"))
                        .with_input(InputBinding::literal("in2", Value::Float(2.0))),
                )
                .with_output(OutputElement::new("out", "float").with_node("m1")),
        );
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder
            .from_node_graph(doc.node_graph("checker").unwrap())
            .unwrap();

        assert_eq!(graph.name(), "checker");
        let (socket, port) = graph.input_socket("scale").unwrap();
        assert_eq!(port.value(), Some(&Value::Float(1.0)));

        let m1 = graph.node_id("m1").unwrap();
        assert_eq!(
            graph.node(m1).input("in1").unwrap().upstream(),
            Some(socket)
        );
        let (_, out_socket) = graph.output_socket("out").unwrap();
        assert_eq!(
            out_socket.upstream(),
            Some(OutputId { node: m1, index: 0 })
        );
        assert!(graph.classification().contains(Classification::TEXTURE));
    }

    #[test]
    fn constant_folds_into_downstream_literal() {
        let mut doc = test_document();
        doc.add_node(constant("c", Value::Float(2.0)));
        doc.add_node(
            NodeElement::new("m", "ND_multiply_float")
                .with_input(InputBinding::connected("in1", "c"))
                .with_input(InputBinding::interface("in2", "in2")),
        );
        doc.add_output(OutputElement::new("out", "float").with_node("m"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        // The constant is gone, its value pushed into the multiply.
        assert!(graph.node_by_name("c").is_none());
        assert_eq!(graph.num_nodes(), 1);
        let m = graph.node_by_name("m").unwrap();
        let in1 = m.input("in1").unwrap();
        assert!(!in1.is_connected());
        assert_eq!(in1.value(), Some(&Value::Float(2.0)));
        // The published input stays socket-driven.
        assert!(m.input("in2").unwrap().is_connected());
    }

    #[test]
    fn ifelse_folds_to_branch_two_on_low_test() {
        let mut doc = test_document();
        doc.add_node(constant("red", RED));
        doc.add_node(constant("green", GREEN));
        doc.add_node(
            NodeElement::new("pick", "ND_compare_color3")
                .with_input(InputBinding::literal("intest", Value::Float(0.3)))
                .with_input(InputBinding::connected("in1", "red"))
                .with_input(InputBinding::connected("in2", "green")),
        );
        doc.add_output(OutputElement::new("out", "color3").with_node("pick"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        // 0.3 <= 0.5 picks branch 2; the surviving constant then folds
        // into the output socket.
        assert_eq!(graph.num_nodes(), 0);
        let (_, out_socket) = graph.output_socket("out").unwrap();
        assert_eq!(out_socket.value(), Some(&RED));
    }

    #[test]
    fn ifelse_folds_to_branch_three_on_high_test() {
        let mut doc = test_document();
        doc.add_node(constant("red", RED));
        doc.add_node(constant("green", GREEN));
        doc.add_node(
            NodeElement::new("pick", "ND_compare_color3")
                .with_input(InputBinding::literal("intest", Value::Float(0.7)))
                .with_input(InputBinding::connected("in1", "red"))
                .with_input(InputBinding::connected("in2", "green")),
        );
        doc.add_output(OutputElement::new("out", "color3").with_node("pick"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        let (_, out_socket) = graph.output_socket("out").unwrap();
        assert_eq!(out_socket.value(), Some(&GREEN));
    }

    #[test]
    fn ifelse_with_constant_driven_test_still_folds() {
        let mut doc = test_document();
        doc.add_node(constant("t", Value::Float(0.2)));
        doc.add_node(constant("red", RED));
        doc.add_node(constant("green", GREEN));
        doc.add_node(
            NodeElement::new("pick", "ND_compare_color3")
                .with_input(InputBinding::connected("intest", "t"))
                .with_input(InputBinding::connected("in1", "red"))
                .with_input(InputBinding::connected("in2", "green")),
        );
        doc.add_output(OutputElement::new("out", "color3").with_node("pick"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        let (_, out_socket) = graph.output_socket("out").unwrap();
        assert_eq!(out_socket.value(), Some(&RED));
    }

    #[test]
    fn switch_folds_to_selected_branch() {
        let mut doc = test_document();
        for (name, value) in [("c0", 10.0), ("c1", 20.0), ("c2", 30.0), ("c3", 40.0)] {
            doc.add_node(constant(name, Value::Float(value)));
        }
        doc.add_node(
            NodeElement::new("sel", "ND_switch_float")
                .with_input(InputBinding::connected("in0", "c0"))
                .with_input(InputBinding::connected("in1", "c1"))
                .with_input(InputBinding::connected("in2", "c2"))
                .with_input(InputBinding::connected("in3", "c3"))
                .with_input(InputBinding::literal("which", Value::Float(2.0))),
        );
        doc.add_output(OutputElement::new("out", "float").with_node("sel"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        assert_eq!(graph.num_nodes(), 0);
        let (_, out_socket) = graph.output_socket("out").unwrap();
        assert_eq!(out_socket.value(), Some(&Value::Float(30.0)));
    }

    #[test]
    fn switch_with_missing_selector_takes_branch_zero() {
        // An unbound selector with no default resolves to branch 0
        // rather than raising.
        let mut doc = test_document();
        doc.add_node(constant("c0", Value::Float(10.0)));
        doc.add_node(constant("c1", Value::Float(20.0)));
        doc.add_node(
            NodeElement::new("sel", "ND_switch_float")
                .with_input(InputBinding::connected("in0", "c0"))
                .with_input(InputBinding::connected("in1", "c1")),
        );
        doc.add_output(OutputElement::new("out", "float").with_node("sel"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        let (_, out_socket) = graph.output_socket("out").unwrap();
        assert_eq!(out_socket.value(), Some(&Value::Float(10.0)));
    }

    #[test]
    fn unbound_geomprop_input_gets_default_reader() {
        let mut doc = test_document();
        doc.add_node(
            NodeElement::new("img", "ND_image_color3").with_input(
                InputBinding::literal("file", Value::Filename("wood.png".into())),
            ),
        );
        doc.add_output(OutputElement::new("out", "color3").with_node("img"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        let reader = graph.node_id("default_texcoord").unwrap();
        let img = graph.node_id("img").unwrap();
        assert_eq!(
            graph.node(img).input("texcoord").unwrap().upstream(),
            Some(OutputId {
                node: reader,
                index: 0
            })
        );
        // The geomprop's hints land on the reader's inputs.
        assert_eq!(
            graph.node(reader).input("index").unwrap().value(),
            Some(&Value::String("0".into()))
        );
        assert!(graph
            .node(img)
            .has_classification(Classification::SAMPLE2D | Classification::FILETEXTURE));
        assert_eq!(graph.node(img).sampling_input().unwrap().name(), "texcoord");
    }

    #[test]
    fn srgb_file_texture_gets_interposed_transform() {
        let mut doc = test_document();
        doc.add_node(
            NodeElement::new("img", "ND_image_color3").with_input(
                InputBinding::literal("file", Value::Filename("wood.png".into()))
                    .with_attribute("colorspace", "sRGB"),
            ),
        );
        doc.add_output(OutputElement::new("out", "color3").with_node("img"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        let img = graph.node_id("img").unwrap();
        let transform = graph.node_id("img_srgb_linear").unwrap();
        let (_, out_socket) = graph.output_socket("out").unwrap();
        assert_eq!(
            out_socket.upstream(),
            Some(OutputId {
                node: transform,
                index: 0
            })
        );
        let transform_in = graph.node(transform).inputs().first().unwrap();
        assert_eq!(
            transform_in.upstream(),
            Some(OutputId { node: img, index: 0 })
        );
        // The inserted conversion keeps both edges type-consistent.
        assert_eq!(transform_in.ty(), graph.node(img).outputs()[0].ty());
        // The transform must come after its source in emission order.
        let order: Vec<&str> = graph.nodes().map(|(_, n)| n.name()).collect();
        let position = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(position("img") < position("img_srgb_linear"));
    }

    #[test]
    fn shader_ref_entry_wires_bindings_and_tracks_closures() {
        let mut doc = test_document();
        doc.add_node_graph(
            NodeGraph::new("layers")
                .with_node(NodeElement::new("diff", "ND_diffuse_bsdf"))
                .with_node(NodeElement::new("spec", "ND_reflection_bsdf"))
                .with_node(
                    NodeElement::new("blend", "ND_mix_bsdf")
                        .with_input(InputBinding::connected("fg", "spec"))
                        .with_input(InputBinding::connected("bg", "diff")),
                )
                .with_output(OutputElement::new("bout", "BSDF").with_node("blend")),
        );
        doc.add_material(
            Material::new("m").with_shader_ref(
                ShaderRef::new("surf", "ND_plastic_surfaceshader")
                    .with_bind_param("sheen", Value::Float(0.6))
                    .with_bind_input(BindInput::literal("albedo", RED))
                    .with_bind_input(BindInput::to_graph_output("bsdf", "layers", "bout")),
            ),
        );
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let shader_ref = doc.material("m").unwrap().shader_ref("surf").unwrap();
        let graph = builder.from_shader_ref("m_surf", shader_ref).unwrap();

        let surf = graph.node_id("surf").unwrap();
        assert!(graph
            .node(surf)
            .has_classification(Classification::SURFACE | Classification::SHADER));
        assert!(graph
            .classification()
            .contains(Classification::SURFACE | Classification::SHADER));

        // Value-only bindings publish through sockets with the override.
        let (_, sheen) = graph.input_socket("sheen").unwrap();
        assert_eq!(sheen.value(), Some(&Value::Float(0.6)));
        let (_, albedo) = graph.input_socket("albedo").unwrap();
        assert_eq!(albedo.value(), Some(&RED));

        // The explicit drive reaches the shader through the graph output
        // jump.
        let blend = graph.node_id("blend").unwrap();
        assert_eq!(
            graph.node(surf).input("bsdf").unwrap().upstream(),
            Some(OutputId {
                node: blend,
                index: 0
            })
        );

        // Every closure upstream of the shader is tracked.
        let closures: Vec<NodeId> = graph.node(surf).used_closures().collect();
        let expected = [
            graph.node_id("blend").unwrap(),
            graph.node_id("diff").unwrap(),
            graph.node_id("spec").unwrap(),
        ];
        assert_eq!(closures.len(), 3);
        for id in expected {
            assert!(closures.contains(&id));
        }
    }

    #[test]
    fn conditional_branch_nodes_get_single_scope() {
        let mut doc = test_document();
        doc.add_node(
            NodeElement::new("t", "ND_multiply_float")
                .with_input(InputBinding::literal("in1", Value::Float(0.5))),
        );
        doc.add_node(
            NodeElement::new("a", "ND_multiply_float")
                .with_input(InputBinding::literal("in1", Value::Float(2.0))),
        );
        doc.add_node(
            NodeElement::new("b", "ND_multiply_float")
                .with_input(InputBinding::literal("in1", Value::Float(3.0))),
        );
        doc.add_node(
            NodeElement::new("pick", "ND_compare_float")
                .with_input(InputBinding::connected("intest", "t"))
                .with_input(InputBinding::connected("in1", "a"))
                .with_input(InputBinding::connected("in2", "b")),
        );
        doc.add_output(OutputElement::new("out", "float").with_node("pick"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let graph = builder.from_output("test", doc.output("out").unwrap()).unwrap();

        let pick = graph.node_id("pick").unwrap();
        assert_eq!(graph.node(pick).scope(), ScopeInfo::Global);
        // The test driver is needed on every path.
        assert_eq!(
            graph.node_by_name("t").unwrap().scope(),
            ScopeInfo::Global
        );
        assert_eq!(
            graph.node_by_name("a").unwrap().scope(),
            ScopeInfo::Single {
                conditional: pick,
                branch_mask: 0b100,
                full_mask: 0x12
            }
        );
        assert!(graph.node_by_name("a").unwrap().referenced_conditionally());
        assert_eq!(
            graph.node_by_name("b").unwrap().scope(),
            ScopeInfo::Single {
                conditional: pick,
                branch_mask: 0b1000,
                full_mask: 0x12
            }
        );
    }

    #[test]
    fn cyclic_document_fails_finalize() {
        let mut doc = test_document();
        doc.add_node(
            NodeElement::new("m1", "ND_multiply_float")
                .with_input(InputBinding::connected("in1", "m2")),
        );
        doc.add_node(
            NodeElement::new("m2", "ND_multiply_float")
                .with_input(InputBinding::connected("in1", "m1")),
        );
        doc.add_output(OutputElement::new("out", "float").with_node("m1"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let err = builder
            .from_output("test", doc.output("out").unwrap())
            .unwrap_err();
        assert!(matches!(err, GraphError::Cycle { .. }));
    }

    #[test]
    fn node_roots_are_unsupported() {
        let mut doc = test_document();
        doc.add_node(constant("c", Value::Float(1.0)));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let err = builder
            .build("test", ElemRef::Node(doc.node("c").unwrap()))
            .unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedRoot { .. }));
    }

    #[test]
    fn output_without_interface_is_unsupported() {
        let mut doc = test_document();
        doc.add_output(OutputElement::new("out", "float"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let err = builder
            .from_output("test", doc.output("out").unwrap())
            .unwrap_err();
        assert!(matches!(err, GraphError::UnsupportedRoot { .. }));
    }

    #[test]
    fn missing_nodedef_is_reported_by_name() {
        let mut doc = test_document();
        doc.add_material(
            Material::new("m")
                .with_shader_ref(ShaderRef::new("surf", "ND_missing_surfaceshader")),
        );
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let shader_ref = doc.material("m").unwrap().shader_ref("surf").unwrap();
        let err = builder.from_shader_ref("m_surf", shader_ref).unwrap_err();
        assert!(err.to_string().contains("ND_missing_surfaceshader"));
    }

    #[test]
    fn missing_implementation_fails_the_build() {
        let mut doc = test_document();
        doc.add_node(constant("c", Value::Float(1.0)));
        doc.add_output(OutputElement::new("out", "float").with_node("c"));
        let generator = TestGenerator::new().without_impl("ND_constant_float");
        let builder = GraphBuilder::new(&doc, &generator);
        let err = builder
            .from_output("test", doc.output("out").unwrap())
            .unwrap_err();
        assert!(matches!(err, GraphError::ImplementationNotFound { .. }));
    }

    #[test]
    fn connection_to_undeclared_input_fails() {
        let mut doc = test_document();
        doc.add_node(constant("c", Value::Float(1.0)));
        doc.add_node(
            NodeElement::new("m", "ND_multiply_float")
                .with_input(InputBinding::connected("nope", "c")),
        );
        doc.add_output(OutputElement::new("out", "float").with_node("m"));
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let err = builder
            .from_output("test", doc.output("out").unwrap())
            .unwrap_err();
        match err {
            GraphError::InputNotFound { input, node } => {
                assert_eq!(input, "nope");
                assert_eq!(node, "m");
            }
            other => panic!("expected InputNotFound, got {other}"),
        }
    }

    #[test]
    fn unknown_interface_name_fails() {
        let mut doc = test_document();
        doc.add_node_graph(
            NodeGraph::new("g")
                .with_nodedef("ND_checkergraph_float")
                .with_node(
                    NodeElement::new("m1", "ND_multiply_float")
                        .with_input(InputBinding::interface("in1", "missing")),
                )
                .with_output(OutputElement::new("out", "float").with_node("m1")),
        );
        let generator = TestGenerator::new();
        let builder = GraphBuilder::new(&doc, &generator);
        let err = builder
            .from_node_graph(doc.node_graph("g").unwrap())
            .unwrap_err();
        assert!(matches!(err, GraphError::InterfaceNameMismatch { .. }));
    }
}
