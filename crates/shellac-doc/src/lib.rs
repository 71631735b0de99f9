//! Material document model for the shellac shader-graph compiler.
//!
//! This crate provides the typed document structures the graph layer
//! builds from:
//!
//! - [`Value`] - typed literals with fallible accessors
//! - [`NodeDef`] - node interfaces with typed ports and geomprops
//! - [`NodeElement`], [`OutputElement`], [`NodeGraph`] - instance graphs
//! - [`Material`], [`ShaderRef`] - shader bindings with overrides
//! - [`Document::traverse_upstream`] - the upstream edge stream
//!
//! The document is pure data: no file I/O, no validation beyond lookups.

mod document;
mod element;
mod traverse;
mod value;

pub use document::Document;
pub use element::{
    BindInput, BindParam, GeomProp, GraphOutputRef, InputBinding, Material, NodeDef, NodeElement,
    NodeGraph, OutputElement, PortDef, PortKind, ShaderRef,
};
pub use glam;
pub use traverse::{ConnRef, Edge, ElemRef, UpstreamWalk};
pub use value::{Value, ValueTypeError};
