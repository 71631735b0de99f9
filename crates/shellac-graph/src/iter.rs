//! Lazy upstream edge traversal with cycle detection.

use crate::error::GraphError;
use crate::graph::ShaderGraph;
use crate::port::{InputId, OutputId};
use std::collections::HashSet;

/// One upstream edge: `upstream` drives `downstream`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpstreamEdge {
    pub upstream: OutputId,
    pub downstream: InputId,
}

/// Depth-first upstream walk from a starting output.
///
/// Yields every edge reachable from the start without crossing the graph
/// boundary; connections to sockets terminate a branch. When the walk
/// revisits an output already on the current path it yields
/// [`GraphError::Cycle`] and ends. The iterator is single-pass; create a
/// fresh one per traversal.
pub struct UpstreamEdges<'a> {
    graph: &'a ShaderGraph,
    stack: Vec<(OutputId, usize)>,
    path: HashSet<OutputId>,
    current: Option<OutputId>,
    failed: bool,
}

impl<'a> UpstreamEdges<'a> {
    pub(crate) fn new(graph: &'a ShaderGraph, from: OutputId) -> Self {
        let mut path = HashSet::new();
        path.insert(from);
        Self {
            graph,
            stack: Vec::new(),
            path,
            current: Some(from),
            failed: false,
        }
    }

    /// Follows `node.input[index]` if it leads to an interior output not
    /// already on the path.
    fn enter(&mut self, from: OutputId, index: usize) -> Result<Option<UpstreamEdge>, GraphError> {
        let downstream = InputId {
            node: from.node,
            index,
        };
        let Some(upstream) = self.graph.input(downstream).upstream() else {
            return Ok(None);
        };
        // Socket connections end the walk at the graph boundary.
        if upstream.node.is_graph() {
            return Ok(None);
        }
        if !self.path.insert(upstream) {
            return Err(GraphError::Cycle {
                node: self.graph.node(upstream.node).name().to_string(),
            });
        }
        self.current = Some(upstream);
        Ok(Some(UpstreamEdge {
            upstream,
            downstream,
        }))
    }
}

impl Iterator for UpstreamEdges<'_> {
    type Item = Result<UpstreamEdge, GraphError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        // Descend below the output yielded last.
        if let Some(current) = self.current.take() {
            if self.graph.node(current.node).num_inputs() > 0 {
                self.stack.push((current, 0));
                match self.enter(current, 0) {
                    Ok(Some(edge)) => return Some(Ok(edge)),
                    Ok(None) => {}
                    Err(err) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                }
            } else {
                self.path.remove(&current);
            }
        }

        // Backtrack, advancing to sibling inputs.
        loop {
            let (frame, index) = match self.stack.last() {
                Some(&top) => top,
                None => return None,
            };
            let num_inputs = self.graph.node(frame.node).num_inputs();
            if index + 1 < num_inputs {
                let next = index + 1;
                if let Some(top) = self.stack.last_mut() {
                    top.1 = next;
                }
                match self.enter(frame, next) {
                    Ok(Some(edge)) => return Some(Ok(edge)),
                    Ok(None) => continue,
                    Err(err) => {
                        self.failed = true;
                        return Some(Err(err));
                    }
                }
            } else {
                self.path.remove(&frame);
                self.stack.pop();
            }
        }
    }
}
