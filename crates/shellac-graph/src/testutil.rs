//! Shared test fixtures: a document of common nodedefs and a stub
//! generator.

use crate::generator::{Generator, IdentifierSyntax, ImplHandle, NodeImplementation, Syntax};
use shellac_doc::{Document, GeomProp, NodeDef, PortDef, Value};
use std::collections::HashSet;
use std::sync::Arc;

struct StubImpl(String);

impl NodeImplementation for StubImpl {
    fn name(&self) -> &str {
        &self.0
    }
}

/// Generator that resolves an implementation for every nodedef except the
/// ones marked missing.
pub(crate) struct TestGenerator {
    syntax: IdentifierSyntax,
    missing: HashSet<String>,
}

impl TestGenerator {
    pub fn new() -> Self {
        Self {
            syntax: IdentifierSyntax::new(),
            missing: HashSet::new(),
        }
    }

    pub fn without_impl(mut self, nodedef: &str) -> Self {
        self.missing.insert(nodedef.to_string());
        self
    }
}

impl Generator for TestGenerator {
    fn target(&self) -> &str {
        "test"
    }

    fn language(&self) -> &str {
        "tsl"
    }

    fn implementation(&self, def: &NodeDef) -> Option<ImplHandle> {
        if self.missing.contains(&def.name) {
            return None;
        }
        Some(Arc::new(StubImpl(format!("IM_{}", def.name))))
    }

    fn syntax(&self) -> &dyn Syntax {
        &self.syntax
    }
}

fn constant_def(name: &str, ty: &str) -> NodeDef {
    NodeDef::new(name, "constant", ty)
        .with_port(PortDef::input("value", ty))
        .with_port(PortDef::output("out", ty))
}

/// A document covering the node kinds the pipeline distinguishes.
pub(crate) fn test_document() -> Document {
    let mut doc = Document::new();

    doc.add_node_def(constant_def("ND_constant_float", "float"));
    doc.add_node_def(constant_def("ND_constant_color3", "color3"));

    doc.add_node_def(
        NodeDef::new("ND_multiply_float", "multiply", "float")
            .with_port(PortDef::input("in1", "float").with_value(Value::Float(1.0)))
            .with_port(PortDef::input("in2", "float").with_value(Value::Float(1.0)))
            .with_port(PortDef::output("out", "float")),
    );
    doc.add_node_def(
        NodeDef::new("ND_multiply_color3", "multiply", "color3")
            .with_port(PortDef::input("in1", "color3"))
            .with_port(PortDef::input("in2", "float").with_value(Value::Float(1.0)))
            .with_port(PortDef::output("out", "color3")),
    );

    doc.add_node_def(
        NodeDef::new("ND_compare_float", "compare", "float")
            .with_port(PortDef::input("intest", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::input("cutoff", "float").with_value(Value::Float(0.5)))
            .with_port(PortDef::input("in1", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::input("in2", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::output("out", "float")),
    );
    doc.add_node_def(
        NodeDef::new("ND_compare_color3", "compare", "color3")
            .with_port(PortDef::input("intest", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::input("cutoff", "float").with_value(Value::Float(0.5)))
            .with_port(PortDef::input("in1", "color3"))
            .with_port(PortDef::input("in2", "color3"))
            .with_port(PortDef::output("out", "color3")),
    );
    doc.add_node_def(
        NodeDef::new("ND_switch_float", "switch", "float")
            .with_port(PortDef::input("in0", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::input("in1", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::input("in2", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::input("in3", "float").with_value(Value::Float(0.0)))
            .with_port(PortDef::input("which", "float"))
            .with_port(PortDef::output("out", "float")),
    );

    doc.add_node_def(
        NodeDef::new("ND_image_color3", "image", "color3")
            .with_group("texture2d")
            .with_port(PortDef::parameter("file", "filename"))
            .with_port(
                PortDef::input("texcoord", "vector2")
                    .with_geomprop(GeomProp::new("texcoord").with_index("0")),
            )
            .with_port(PortDef::output("out", "color3")),
    );
    doc.add_node_def(
        NodeDef::new("ND_texcoord_vector2", "texcoord", "vector2")
            .with_port(PortDef::input("index", "string").with_value(Value::String("0".into())))
            .with_port(PortDef::output("out", "vector2")),
    );
    doc.add_node_def(
        NodeDef::new("ND_position_vector3", "position", "vector3")
            .with_group("procedural3d")
            .with_port(PortDef::input("space", "string"))
            .with_port(PortDef::output("out", "vector3")),
    );

    doc.add_node_def(
        NodeDef::new("ND_plastic_surfaceshader", "plastic", "surfaceshader")
            .with_port(PortDef::input("bsdf", "BSDF"))
            .with_port(
                PortDef::input("albedo", "color3")
                    .with_value(Value::Color3(shellac_doc::glam::Vec3::splat(0.5))),
            )
            .with_port(PortDef::parameter("sheen", "float").with_value(Value::Float(0.0))),
    );
    doc.add_node_def(
        NodeDef::new("ND_diffuse_bsdf", "diffuse", "BSDF")
            .with_port(
                PortDef::input("albedo", "color3")
                    .with_value(Value::Color3(shellac_doc::glam::Vec3::splat(0.8))),
            )
            .with_port(PortDef::output("out", "BSDF")),
    );
    doc.add_node_def(
        NodeDef::new("ND_reflection_bsdf", "reflection", "BSDF")
            .with_attribute("bsdf", "R")
            .with_port(PortDef::input("ior", "float").with_value(Value::Float(1.5)))
            .with_port(PortDef::output("out", "BSDF")),
    );
    doc.add_node_def(
        NodeDef::new("ND_mix_bsdf", "mix", "BSDF")
            .with_port(PortDef::input("fg", "BSDF"))
            .with_port(PortDef::input("bg", "BSDF"))
            .with_port(PortDef::input("mix", "float").with_value(Value::Float(0.5)))
            .with_port(PortDef::output("out", "BSDF")),
    );

    doc.add_node_def(
        NodeDef::new("ND_srgb_linear_color3", "srgb_linear", "color3")
            .with_port(PortDef::input("in", "color3"))
            .with_port(PortDef::output("out", "color3")),
    );

    doc.add_node_def(
        NodeDef::new("ND_checkergraph_float", "checkergraph", "float")
            .with_port(PortDef::input("scale", "float").with_value(Value::Float(1.0)))
            .with_port(PortDef::output("out", "float")),
    );

    doc
}
