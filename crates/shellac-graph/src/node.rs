//! Nodes: typed operators with classified semantics and scope metadata.

use crate::context::ContextId;
use crate::error::GraphError;
use crate::generator::{Generator, ImplHandle};
use crate::port::{InputPort, NodeId, OutputPort};
use crate::types::{self, builtin};
use shellac_doc::{NodeDef, NodeElement, PortKind};
use std::collections::BTreeSet;
use std::ops::{BitOr, BitOrAssign};

/// Semantic classification of a node as a bitmask of roles.
///
/// Flags are additive; emitters test them to select code templates. The
/// primary-output-derived flags (SURFACE, LIGHT, BSDF, EDF, VDF against
/// the TEXTURE default) are exclusive of one another; everything else
/// composes freely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification(u32);

impl Classification {
    pub const NONE: Classification = Classification(0);
    /// Textural computation, the default for value-producing nodes.
    pub const TEXTURE: Classification = Classification(1 << 0);
    /// Light-interaction closure.
    pub const CLOSURE: Classification = Classification(1 << 1);
    /// Full shader signature.
    pub const SHADER: Classification = Classification(1 << 2);
    /// Surface shader.
    pub const SURFACE: Classification = Classification(1 << 3);
    /// Light shader.
    pub const LIGHT: Classification = Classification(1 << 4);
    pub const BSDF: Classification = Classification(1 << 5);
    /// Reflection-only BSDF.
    pub const BSDF_R: Classification = Classification(1 << 6);
    /// Transmission-only BSDF.
    pub const BSDF_T: Classification = Classification(1 << 7);
    pub const EDF: Classification = Classification(1 << 8);
    pub const VDF: Classification = Classification(1 << 9);
    /// Constant-value node, a candidate for folding.
    pub const CONSTANT: Classification = Classification(1 << 10);
    /// Texture read from a file.
    pub const FILETEXTURE: Classification = Classification(1 << 11);
    /// Any branching node.
    pub const CONDITIONAL: Classification = Classification(1 << 12);
    /// Two-way comparison branch.
    pub const IFELSE: Classification = Classification(1 << 13);
    /// N-way branch.
    pub const SWITCH: Classification = Classification(1 << 14);
    /// Samples 2D space.
    pub const SAMPLE2D: Classification = Classification(1 << 15);
    /// Samples 3D space.
    pub const SAMPLE3D: Classification = Classification(1 << 16);
    /// 2D convolution over neighboring samples.
    pub const CONVOLUTION2D: Classification = Classification(1 << 17);

    /// True when every flag in `other` is set on `self`.
    pub fn contains(self, other: Classification) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Classification {
    type Output = Classification;

    fn bitor(self, rhs: Classification) -> Classification {
        Classification(self.0 | rhs.0)
    }
}

impl BitOrAssign for Classification {
    fn bitor_assign(&mut self, rhs: Classification) {
        self.0 |= rhs.0;
    }
}

/// Conditional-scope metadata computed by the scope analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeInfo {
    /// Not yet analyzed.
    #[default]
    Unknown,
    /// Needed on every execution path.
    Global,
    /// Needed only on the branches set in `branch_mask` of `conditional`.
    Single {
        conditional: NodeId,
        branch_mask: u32,
        full_mask: u32,
    },
    /// Needed under more than one conditional. Emitters currently treat
    /// this like `Global`.
    Multiple,
}

impl ScopeInfo {
    /// Narrows this scope to one branch of a conditional ancestor.
    pub fn adjust_at_conditional(&mut self, conditional: NodeId, branch: usize, full_mask: u32) {
        match *self {
            ScopeInfo::Global => {
                *self = ScopeInfo::Single {
                    conditional,
                    branch_mask: 1 << branch,
                    full_mask,
                };
            }
            ScopeInfo::Single {
                branch_mask,
                full_mask: current_full,
                ..
            } if branch_mask == current_full => {
                *self = ScopeInfo::Single {
                    conditional,
                    branch_mask: 1 << branch,
                    full_mask,
                };
            }
            ScopeInfo::Single { .. } => *self = ScopeInfo::Multiple,
            ScopeInfo::Unknown | ScopeInfo::Multiple => {}
        }
    }

    /// Merges scope flowing in from a downstream consumer.
    pub fn merge(&mut self, from: ScopeInfo) {
        *self = match (*self, from) {
            (ScopeInfo::Unknown, _) | (_, ScopeInfo::Global) => from,
            (ScopeInfo::Global, _) => ScopeInfo::Global,
            (
                ScopeInfo::Single {
                    conditional: a,
                    branch_mask: mask_a,
                    full_mask,
                },
                ScopeInfo::Single {
                    conditional: b,
                    branch_mask: mask_b,
                    ..
                },
            ) if a == b => {
                let branch_mask = mask_a | mask_b;
                if branch_mask == full_mask {
                    // Needed on every branch, so no longer conditional.
                    ScopeInfo::Global
                } else {
                    ScopeInfo::Single {
                        conditional: a,
                        branch_mask,
                        full_mask,
                    }
                }
            }
            _ => ScopeInfo::Multiple,
        };
    }
}

/// A typed operator in a shader graph.
///
/// Ports are stored in declaration order; positions are observable and
/// used by the optimizer's bypass and the conditional branch encoding.
pub struct Node {
    pub(crate) name: String,
    pub(crate) inputs: Vec<InputPort>,
    pub(crate) outputs: Vec<OutputPort>,
    pub(crate) classification: Classification,
    pub(crate) scope: ScopeInfo,
    pub(crate) implementation: Option<ImplHandle>,
    pub(crate) sampling_input: Option<usize>,
    pub(crate) contexts: Vec<ContextId>,
    pub(crate) used_closures: BTreeSet<NodeId>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("classification", &self.classification)
            .field("scope", &self.scope)
            .field(
                "implementation",
                &self.implementation.as_ref().map(|i| i.name()),
            )
            .field("sampling_input", &self.sampling_input)
            .field("contexts", &self.contexts)
            .field("used_closures", &self.used_closures)
            .finish()
    }
}

impl Node {
    /// Creates an empty node with no ports.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            classification: Classification::NONE,
            scope: ScopeInfo::Unknown,
            implementation: None,
            sampling_input: None,
            contexts: Vec::new(),
            used_closures: BTreeSet::new(),
        }
    }

    /// Expands a nodedef interface into a node.
    ///
    /// Resolves the implementation through the generator, creates ports
    /// with defaults, applies value overrides from `instance`, and
    /// assigns the classification from the primary output type, the
    /// node string, and the node group.
    pub fn from_def(
        name: impl Into<String>,
        def: &NodeDef,
        generator: &dyn Generator,
        instance: Option<&NodeElement>,
    ) -> Result<Node, GraphError> {
        let mut node = Node::new(name);

        node.implementation = Some(generator.implementation(def).ok_or_else(|| {
            GraphError::ImplementationNotFound {
                nodedef: def.name.clone(),
                target: generator.target().to_string(),
                language: generator.language().to_string(),
            }
        })?);

        let group = match def.node_group.as_deref() {
            Some("texture2d") | Some("procedural2d") => Classification::SAMPLE2D,
            Some("texture3d") | Some("procedural3d") => Classification::SAMPLE3D,
            Some("convolution2d") => Classification::CONVOLUTION2D,
            _ => Classification::NONE,
        };

        for port in &def.ports {
            let ty = types::resolve(&port.ty)?;
            if port.kind == PortKind::Output {
                node.add_output(&port.name, ty)?;
            } else {
                node.add_input(&port.name, ty)?.value = port.value.clone();
                let index = node.inputs.len() - 1;
                let samples_2d = group == Classification::SAMPLE2D && port.name == "texcoord";
                let samples_3d = group == Classification::SAMPLE3D && port.name == "position";
                if samples_2d || samples_3d {
                    node.sampling_input = Some(index);
                }
            }
        }

        if node.outputs.is_empty() {
            node.add_output("out", types::resolve(&def.ty)?)?;
        }

        if let Some(instance) = instance {
            for binding in &instance.inputs {
                if let Some(value) = &binding.value {
                    if let Some(input) = node.input_mut(&binding.name) {
                        input.value = Some(value.clone());
                    }
                }
            }
        }

        // Classify, defaulting to a plain texture node.
        node.classification = Classification::TEXTURE;
        let primary_ty = node.outputs[0].ty;
        if primary_ty == &builtin::SURFACESHADER {
            node.classification = Classification::SURFACE | Classification::SHADER;
        } else if primary_ty == &builtin::LIGHTSHADER {
            node.classification = Classification::LIGHT | Classification::SHADER;
        } else if primary_ty == &builtin::BSDF {
            node.classification = Classification::BSDF | Classification::CLOSURE;
            match def.attribute("bsdf") {
                Some("R") => node.classification |= Classification::BSDF_R,
                Some("T") => node.classification |= Classification::BSDF_T,
                _ => {}
            }
        } else if primary_ty == &builtin::EDF {
            node.classification = Classification::EDF | Classification::CLOSURE;
        } else if primary_ty == &builtin::VDF {
            node.classification = Classification::VDF | Classification::CLOSURE;
        } else if def.node_string == "constant" {
            node.classification = Classification::TEXTURE | Classification::CONSTANT;
        } else if def.node_string == "image" || def.attribute("class") == Some("image") {
            node.classification = Classification::TEXTURE | Classification::FILETEXTURE;
        } else if def.node_string == "compare" {
            node.classification =
                Classification::TEXTURE | Classification::CONDITIONAL | Classification::IFELSE;
        } else if def.node_string == "switch" {
            node.classification =
                Classification::TEXTURE | Classification::CONDITIONAL | Classification::SWITCH;
        }

        node.classification |= group;

        let contexts = generator.context_ids(&node);
        node.contexts = contexts;

        Ok(node)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Input ports in declaration order.
    pub fn inputs(&self) -> &[InputPort] {
        &self.inputs
    }

    /// Output ports in declaration order.
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Finds an input port by name.
    pub fn input(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub(crate) fn input_mut(&mut self, name: &str) -> Option<&mut InputPort> {
        self.inputs.iter_mut().find(|p| p.name == name)
    }

    /// The position of a named input.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    /// The input at a position.
    pub fn input_at(&self, index: usize) -> Option<&InputPort> {
        self.inputs.get(index)
    }

    /// Finds an output port by name.
    pub fn output(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// The position of a named output.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    /// The output at a position.
    pub fn output_at(&self, index: usize) -> Option<&OutputPort> {
        self.outputs.get(index)
    }

    /// Adds an input port.
    pub fn add_input(&mut self, name: &str, ty: crate::types::TypeRef) -> Result<&mut InputPort, GraphError> {
        if self.input(name).is_some() {
            return Err(GraphError::DuplicatePortName {
                port: name.to_string(),
                node: self.name.clone(),
            });
        }
        self.inputs.push(InputPort::new(name.to_string(), ty));
        Ok(self.inputs.last_mut().expect("port just added"))
    }

    /// Adds an output port.
    pub fn add_output(&mut self, name: &str, ty: crate::types::TypeRef) -> Result<&mut OutputPort, GraphError> {
        if self.output(name).is_some() {
            return Err(GraphError::DuplicatePortName {
                port: name.to_string(),
                node: self.name.clone(),
            });
        }
        self.outputs.push(OutputPort::new(name.to_string(), ty));
        Ok(self.outputs.last_mut().expect("port just added"))
    }

    pub(crate) fn rename_input(&mut self, index: usize, name: String) {
        self.inputs[index].name = name;
    }

    pub(crate) fn rename_output(&mut self, index: usize, name: String) {
        self.outputs[index].name = name;
    }

    pub fn classification(&self) -> Classification {
        self.classification
    }

    /// True when every flag in `class` is set on this node.
    pub fn has_classification(&self, class: Classification) -> bool {
        self.classification.contains(class)
    }

    /// The node's conditional scope, valid after finalize.
    pub fn scope(&self) -> ScopeInfo {
        self.scope
    }

    pub(crate) fn scope_mut(&mut self) -> &mut ScopeInfo {
        &mut self.scope
    }

    /// True when this node is needed only on specific branches of a
    /// single conditional.
    pub fn referenced_conditionally(&self) -> bool {
        matches!(self.scope, ScopeInfo::Single { branch_mask, .. } if branch_mask != 0)
    }

    /// The resolved implementation handle.
    pub fn implementation(&self) -> Option<&ImplHandle> {
        self.implementation.as_ref()
    }

    /// The canonical sampling input for 2D/3D sampling nodes.
    pub fn sampling_input(&self) -> Option<&InputPort> {
        self.sampling_input.and_then(|i| self.inputs.get(i))
    }

    /// Generation contexts this node participates in.
    pub fn contexts(&self) -> &[ContextId] {
        &self.contexts
    }

    /// Closure nodes upstream of this shader node, valid after finalize.
    pub fn used_closures(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.used_closures.iter().copied()
    }
}
