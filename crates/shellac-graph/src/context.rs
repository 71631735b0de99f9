//! Generation contexts a node participates in.

use crate::port::{InputId, OutputId};
use std::collections::HashMap;

/// Identifies a generation context.
///
/// Contexts are opaque to the graph core; generators assign them when a
/// node is created and emitters group code by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub u32);

impl ContextId {
    /// The context every plain node participates in.
    pub const DEFAULT: ContextId = ContextId(0);
}

/// Per-context port decoration.
///
/// When a node is generated in more than one context its port variables
/// need distinguishing suffixes; emitters record them here.
#[derive(Debug, Clone)]
pub struct NodeContext {
    id: ContextId,
    input_suffix: HashMap<InputId, String>,
    output_suffix: HashMap<OutputId, String>,
}

impl NodeContext {
    /// Creates an empty context record.
    pub fn new(id: ContextId) -> Self {
        Self {
            id,
            input_suffix: HashMap::new(),
            output_suffix: HashMap::new(),
        }
    }

    /// The context this record decorates.
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// Sets the suffix for an input port.
    pub fn set_input_suffix(&mut self, input: InputId, suffix: impl Into<String>) {
        self.input_suffix.insert(input, suffix.into());
    }

    /// Clears the suffix for an input port.
    pub fn remove_input_suffix(&mut self, input: InputId) {
        self.input_suffix.remove(&input);
    }

    /// The suffix for an input port, if set.
    pub fn input_suffix(&self, input: InputId) -> Option<&str> {
        self.input_suffix.get(&input).map(String::as_str)
    }

    /// Sets the suffix for an output port.
    pub fn set_output_suffix(&mut self, output: OutputId, suffix: impl Into<String>) {
        self.output_suffix.insert(output, suffix.into());
    }

    /// Clears the suffix for an output port.
    pub fn remove_output_suffix(&mut self, output: OutputId) {
        self.output_suffix.remove(&output);
    }

    /// The suffix for an output port, if set.
    pub fn output_suffix(&self, output: OutputId) -> Option<&str> {
        self.output_suffix.get(&output).map(String::as_str)
    }
}
