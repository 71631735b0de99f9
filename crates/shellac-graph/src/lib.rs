//! Shader-graph intermediate representation and lowering pipeline.
//!
//! This crate turns material-document fragments into typed, acyclic
//! graphs of shader nodes ready for code emission:
//!
//! - [`GraphBuilder`] expands node graphs, bare outputs, and shader
//!   references into a flat [`ShaderGraph`] with boundary sockets
//! - the optimizer folds constant nodes and statically-decided
//!   conditionals, then removes unreachable nodes
//! - nodes are ordered topologically, tagged with conditional
//!   [`ScopeInfo`], and given unique target-legal names
//! - shader nodes record the closure nodes they depend on
//!
//! Emitters consume the finalized graph through [`ShaderGraph`]'s
//! accessors and the upstream edge iterator; the graph is frozen after
//! [`ShaderGraph::finalize`]. Target specifics stay behind the
//! [`Generator`] and [`Syntax`] traits.
//!
//! The pipeline is single-threaded; independent graphs may be processed
//! on separate threads once the [`types`] registry is populated.

mod builder;
mod context;
mod error;
mod generator;
mod graph;
mod iter;
mod node;
mod port;
pub mod types;

pub use builder::GraphBuilder;
pub use context::{ContextId, NodeContext};
pub use error::GraphError;
pub use generator::{
    Generator, IdentifierSyntax, ImplHandle, NodeImplementation, Syntax, UniqueNameMap,
};
pub use graph::ShaderGraph;
pub use iter::{UpstreamEdge, UpstreamEdges};
pub use node::{Classification, Node, ScopeInfo};
pub use port::{InputId, InputPort, NodeId, OutputId, OutputPort};
pub use types::{TypeDesc, TypeRef, TypeSemantic};

#[cfg(test)]
pub(crate) mod testutil;
