//! Elements of a material document.
//!
//! These are plain data types populated by a document loader (or built
//! programmatically): node definitions with typed ports, node instances
//! with input bindings, published outputs, node graphs, and materials
//! with shader references.

use crate::value::Value;
use std::collections::HashMap;

/// Geometric-property declaration on a nodedef input.
///
/// Requests that an unbound input be fed by a synthesized geometry-reader
/// node when the graph is built.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeomProp {
    /// Name of the geometric property, e.g. `texcoord` or `position`.
    pub name: String,
    /// Coordinate space hint for the reader node.
    pub space: Option<String>,
    /// Stream index hint, e.g. which set of texture coordinates.
    pub index: Option<String>,
    /// Attribute name hint for generic geometry attributes.
    pub attrname: Option<String>,
}

impl GeomProp {
    /// Creates a declaration with no hints.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            space: None,
            index: None,
            attrname: None,
        }
    }

    /// Sets the coordinate space hint.
    pub fn with_space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    /// Sets the stream index hint.
    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Sets the attribute name hint.
    pub fn with_attrname(mut self, attrname: impl Into<String>) -> Self {
        self.attrname = Some(attrname.into());
        self
    }
}

/// Role of a port declared on a nodedef.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PortKind {
    /// A connectable input.
    Input,
    /// A uniform parameter; never driven by upstream nodes.
    Parameter,
    /// A produced result.
    Output,
}

/// A port declaration on a nodedef.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortDef {
    pub name: String,
    /// Document type name, resolved to a type descriptor by the graph layer.
    pub ty: String,
    pub kind: PortKind,
    /// Default literal value.
    pub value: Option<Value>,
    /// Geometry fallback for inputs left unbound.
    pub geomprop: Option<GeomProp>,
}

impl PortDef {
    /// Declares an input port.
    pub fn input(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, ty, PortKind::Input)
    }

    /// Declares a parameter port.
    pub fn parameter(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, ty, PortKind::Parameter)
    }

    /// Declares an output port.
    pub fn output(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self::new(name, ty, PortKind::Output)
    }

    fn new(name: impl Into<String>, ty: impl Into<String>, kind: PortKind) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            kind,
            value: None,
            geomprop: None,
        }
    }

    /// Sets the default value.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Sets the geometry fallback.
    pub fn with_geomprop(mut self, geomprop: GeomProp) -> Self {
        self.geomprop = Some(geomprop);
        self
    }
}

/// A node definition: the typed interface node instances expand to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeDef {
    /// Definition name, e.g. `ND_image_color3`.
    pub name: String,
    /// Operator identity, e.g. `constant`, `image`, `compare`, `switch`.
    pub node_string: String,
    /// Declared type of the default output.
    pub ty: String,
    /// Node group, e.g. `texture2d` or `convolution2d`.
    pub node_group: Option<String>,
    /// Free-form attributes, e.g. `class` or `bsdf`.
    pub attributes: HashMap<String, String>,
    /// Declared ports, in interface order.
    pub ports: Vec<PortDef>,
}

impl NodeDef {
    /// Creates a definition with no ports.
    pub fn new(
        name: impl Into<String>,
        node_string: impl Into<String>,
        ty: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            node_string: node_string.into(),
            ty: ty.into(),
            node_group: None,
            attributes: HashMap::new(),
            ports: Vec::new(),
        }
    }

    /// Sets the node group.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.node_group = Some(group.into());
        self
    }

    /// Sets a free-form attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Appends a port declaration.
    pub fn with_port(mut self, port: PortDef) -> Self {
        self.ports.push(port);
        self
    }

    /// Reads a free-form attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Finds a port by name.
    pub fn port(&self, name: &str) -> Option<&PortDef> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Declared inputs, in order.
    pub fn inputs(&self) -> impl Iterator<Item = &PortDef> {
        self.ports.iter().filter(|p| p.kind == PortKind::Input)
    }

    /// Declared parameters, in order.
    pub fn parameters(&self) -> impl Iterator<Item = &PortDef> {
        self.ports.iter().filter(|p| p.kind == PortKind::Parameter)
    }

    /// Declared outputs, in order.
    pub fn outputs(&self) -> impl Iterator<Item = &PortDef> {
        self.ports.iter().filter(|p| p.kind == PortKind::Output)
    }
}

/// Reference to a named output of a node graph.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphOutputRef {
    pub graph: String,
    pub output: String,
}

/// An input element on a node instance: a literal override, an upstream
/// connection, an interface publication, or a combination.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InputBinding {
    pub name: String,
    /// Literal override for the declared default.
    pub value: Option<Value>,
    /// Name of the upstream node driving this input.
    pub node_name: Option<String>,
    /// Upstream node-graph output driving this input.
    pub output_ref: Option<GraphOutputRef>,
    /// Graph input socket this input publishes to the outside.
    pub interface_name: Option<String>,
    /// Free-form attributes, e.g. `colorspace`.
    pub attributes: HashMap<String, String>,
}

impl InputBinding {
    /// A literal value override.
    pub fn literal(name: impl Into<String>, value: Value) -> Self {
        Self {
            value: Some(value),
            ..Self::empty(name)
        }
    }

    /// A connection to an upstream node.
    pub fn connected(name: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            node_name: Some(node.into()),
            ..Self::empty(name)
        }
    }

    /// A connection to a node-graph output.
    pub fn to_graph_output(
        name: impl Into<String>,
        graph: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            output_ref: Some(GraphOutputRef {
                graph: graph.into(),
                output: output.into(),
            }),
            ..Self::empty(name)
        }
    }

    /// A publication to a graph input socket.
    pub fn interface(name: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            interface_name: Some(interface.into()),
            ..Self::empty(name)
        }
    }

    fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            node_name: None,
            output_ref: None,
            interface_name: None,
            attributes: HashMap::new(),
        }
    }

    /// Sets a free-form attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Reads a free-form attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// True when the binding names an upstream drive.
    pub fn is_connected(&self) -> bool {
        self.node_name.is_some() || self.output_ref.is_some()
    }
}

/// A node instance inside a graph or document.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeElement {
    pub name: String,
    /// Name of the nodedef this instance expands.
    pub nodedef: String,
    pub inputs: Vec<InputBinding>,
}

impl NodeElement {
    /// Creates an instance with no bindings.
    pub fn new(name: impl Into<String>, nodedef: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodedef: nodedef.into(),
            inputs: Vec::new(),
        }
    }

    /// Appends an input binding.
    pub fn with_input(mut self, binding: InputBinding) -> Self {
        self.inputs.push(binding);
        self
    }

    /// Finds an input binding by name.
    pub fn input(&self, name: &str) -> Option<&InputBinding> {
        self.inputs.iter().find(|b| b.name == name)
    }
}

/// An output element publishing a node's result.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputElement {
    pub name: String,
    /// Document type name of the published value.
    pub ty: String,
    /// Node whose primary output is published.
    pub node_name: Option<String>,
}

impl OutputElement {
    /// Creates an unconnected output.
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            node_name: None,
        }
    }

    /// Connects the output to a node.
    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node_name = Some(node.into());
        self
    }
}

/// A declared graph of node instances with published outputs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeGraph {
    pub name: String,
    /// Interface this graph implements, if declared.
    pub nodedef: Option<String>,
    pub nodes: Vec<NodeElement>,
    pub outputs: Vec<OutputElement>,
}

impl NodeGraph {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodedef: None,
            nodes: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Sets the implemented interface.
    pub fn with_nodedef(mut self, nodedef: impl Into<String>) -> Self {
        self.nodedef = Some(nodedef.into());
        self
    }

    /// Appends a node instance.
    pub fn with_node(mut self, node: NodeElement) -> Self {
        self.nodes.push(node);
        self
    }

    /// Appends a published output.
    pub fn with_output(mut self, output: OutputElement) -> Self {
        self.outputs.push(output);
        self
    }

    /// Finds an interior node by name.
    pub fn node(&self, name: &str) -> Option<&NodeElement> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Finds a published output by name.
    pub fn output(&self, name: &str) -> Option<&OutputElement> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

/// A value override on a shader-reference parameter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BindParam {
    pub name: String,
    pub value: Option<Value>,
}

/// A binding on a shader-reference input: a value override, an upstream
/// graph-output drive, or both.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BindInput {
    pub name: String,
    pub value: Option<Value>,
    pub output_ref: Option<GraphOutputRef>,
}

impl BindInput {
    /// A literal override.
    pub fn literal(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            output_ref: None,
        }
    }

    /// An explicit upstream drive from a node-graph output.
    pub fn to_graph_output(
        name: impl Into<String>,
        graph: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: None,
            output_ref: Some(GraphOutputRef {
                graph: graph.into(),
                output: output.into(),
            }),
        }
    }
}

/// Instantiates a shader nodedef with overridden values and drives.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShaderRef {
    pub name: String,
    /// Name of the shader nodedef being referenced.
    pub nodedef: String,
    pub bind_params: Vec<BindParam>,
    pub bind_inputs: Vec<BindInput>,
}

impl ShaderRef {
    /// Creates a reference with no bindings.
    pub fn new(name: impl Into<String>, nodedef: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodedef: nodedef.into(),
            bind_params: Vec::new(),
            bind_inputs: Vec::new(),
        }
    }

    /// Appends a parameter override.
    pub fn with_bind_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.bind_params.push(BindParam {
            name: name.into(),
            value: Some(value),
        });
        self
    }

    /// Appends an input binding.
    pub fn with_bind_input(mut self, bind: BindInput) -> Self {
        self.bind_inputs.push(bind);
        self
    }

    /// The override value for a parameter, if bound.
    pub fn bind_param_value(&self, name: &str) -> Option<&Value> {
        self.bind_params
            .iter()
            .find(|p| p.name == name)
            .and_then(|p| p.value.as_ref())
    }

    /// Finds an input binding by name.
    pub fn bind_input(&self, name: &str) -> Option<&BindInput> {
        self.bind_inputs.iter().find(|b| b.name == name)
    }
}

/// A material: a set of shader references.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Material {
    pub name: String,
    pub shader_refs: Vec<ShaderRef>,
}

impl Material {
    /// Creates an empty material.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader_refs: Vec::new(),
        }
    }

    /// Appends a shader reference.
    pub fn with_shader_ref(mut self, shader_ref: ShaderRef) -> Self {
        self.shader_refs.push(shader_ref);
        self
    }

    /// Finds a shader reference by name.
    pub fn shader_ref(&self, name: &str) -> Option<&ShaderRef> {
        self.shader_refs.iter().find(|s| s.name == name)
    }
}
