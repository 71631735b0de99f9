//! Error types for shader-graph construction and lowering.

use shellac_doc::ValueTypeError;
use thiserror::Error;

/// Errors raised while building, optimizing, or finalizing a shader graph.
///
/// All failures are terminal for the current call: no partial graph is
/// returned.
#[derive(Debug, Error)]
pub enum GraphError {
    /// No implementation is registered for a nodedef under the generator's
    /// target and language.
    #[error("no implementation found for nodedef '{nodedef}' matching target '{target}' and language '{language}'")]
    ImplementationNotFound {
        nodedef: String,
        target: String,
        language: String,
    },

    /// A referenced node definition is absent from the document.
    #[error("could not find a nodedef named '{0}'")]
    NodeDefNotFound(String),

    /// A connection targets an input name the node does not declare.
    #[error("could not find an input named '{input}' on node '{node}'")]
    InputNotFound { input: String, node: String },

    /// A published interface name matches no input socket.
    #[error("interface name '{interface}' doesn't match an input socket on graph '{graph}'")]
    InterfaceNameMismatch { interface: String, graph: String },

    /// A second port with an existing name was added to a node.
    #[error("a port named '{port}' already exists on node '{node}'")]
    DuplicatePortName { port: String, node: String },

    /// A positional port index is out of range.
    #[error("port index {port} is out of range on node '{node}'")]
    PortNotFound { port: usize, node: String },

    /// The graph is not acyclic.
    #[error("encountered a cycle in graph at node '{node}'")]
    Cycle { node: String },

    /// A builder entry point was handed an element it cannot expand.
    #[error("cannot build a shader graph from element '{element}': {kind}")]
    UnsupportedRoot { element: String, kind: &'static str },

    /// A document type name has no interned descriptor.
    #[error("unknown type '{0}'")]
    UnknownType(String),

    /// A literal was read as the wrong dynamic type.
    #[error(transparent)]
    Value(#[from] ValueTypeError),
}
