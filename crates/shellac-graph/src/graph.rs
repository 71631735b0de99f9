//! Graph container, connection management, and lowering passes.

use crate::error::GraphError;
use crate::generator::{Generator, Syntax, UniqueNameMap};
use crate::iter::UpstreamEdges;
use crate::node::{Classification, Node, ScopeInfo};
use crate::port::{InputId, InputPort, NodeId, OutputId, OutputPort};
use crate::types::TypeRef;
use shellac_doc::{Document, Value, ValueTypeError};
use std::collections::{HashMap, HashSet, VecDeque};

/// A typed, acyclic shader-node graph with boundary sockets.
///
/// Sockets invert polarity: an input socket is exposed to interior nodes
/// as an output of the graph's pseudo-node ([`NodeId::GRAPH`]), an output
/// socket as an input of it. One upstream walker therefore serves
/// interior edges and boundary edges alike.
///
/// Connections are maintained exclusively through the connection-manager
/// methods ([`connect`](Self::connect), [`disconnect_input`](Self::disconnect_input),
/// [`disconnect_output`](Self::disconnect_output)), which keep the
/// input/output cross-links symmetric at all times.
#[derive(Debug)]
pub struct ShaderGraph {
    socket_node: Node,
    nodes: HashMap<NodeId, Node>,
    by_name: HashMap<String, NodeId>,
    order: Vec<NodeId>,
    next_id: u32,
    pub(crate) color_transforms: Vec<(NodeId, String)>,
}

impl ShaderGraph {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            socket_node: Node::new(name),
            nodes: HashMap::new(),
            by_name: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
            color_transforms: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.socket_node.name()
    }

    /// Classification of the graph as a whole.
    pub fn classification(&self) -> Classification {
        self.socket_node.classification()
    }

    pub(crate) fn add_classification(&mut self, class: Classification) {
        self.socket_node.classification |= class;
    }

    // ── nodes ──────────────────────────────────────────────────────────

    /// The node with the given id; [`NodeId::GRAPH`] resolves to the
    /// socket pseudo-node.
    pub fn node(&self, id: NodeId) -> &Node {
        if id.is_graph() {
            &self.socket_node
        } else {
            &self.nodes[&id]
        }
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        if id.is_graph() {
            &mut self.socket_node
        } else {
            self.nodes.get_mut(&id).expect("node id out of graph")
        }
    }

    /// Finds an interior node id by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Finds an interior node by name.
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.node_id(name).map(|id| self.node(id))
    }

    /// Interior nodes in emission order (topological after finalize).
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.order.iter().map(move |id| (*id, &self.nodes[id]))
    }

    pub fn num_nodes(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn insert_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.by_name.insert(node.name().to_string(), id);
        self.order.push(id);
        self.nodes.insert(id, node);
        id
    }

    // ── sockets ────────────────────────────────────────────────────────

    /// Adds an input socket, exposed inside the graph as an output of the
    /// pseudo-node.
    pub fn add_input_socket(&mut self, name: &str, ty: TypeRef) -> Result<OutputId, GraphError> {
        self.socket_node.add_output(name, ty)?;
        Ok(OutputId {
            node: NodeId::GRAPH,
            index: self.socket_node.num_outputs() - 1,
        })
    }

    /// Adds an output socket, exposed inside the graph as an input of the
    /// pseudo-node.
    pub fn add_output_socket(&mut self, name: &str, ty: TypeRef) -> Result<InputId, GraphError> {
        self.socket_node.add_input(name, ty)?;
        Ok(InputId {
            node: NodeId::GRAPH,
            index: self.socket_node.num_inputs() - 1,
        })
    }

    /// Input sockets in declaration order.
    pub fn input_sockets(&self) -> impl Iterator<Item = (OutputId, &OutputPort)> + '_ {
        self.socket_node.outputs().iter().enumerate().map(|(index, port)| {
            (
                OutputId {
                    node: NodeId::GRAPH,
                    index,
                },
                port,
            )
        })
    }

    /// Output sockets in declaration order.
    pub fn output_sockets(&self) -> impl Iterator<Item = (InputId, &InputPort)> + '_ {
        self.socket_node.inputs().iter().enumerate().map(|(index, port)| {
            (
                InputId {
                    node: NodeId::GRAPH,
                    index,
                },
                port,
            )
        })
    }

    /// Finds an input socket by name.
    pub fn input_socket(&self, name: &str) -> Option<(OutputId, &OutputPort)> {
        self.socket_node.output_index(name).map(|index| {
            (
                OutputId {
                    node: NodeId::GRAPH,
                    index,
                },
                &self.socket_node.outputs()[index],
            )
        })
    }

    /// Finds an output socket by name.
    pub fn output_socket(&self, name: &str) -> Option<(InputId, &InputPort)> {
        self.socket_node.input_index(name).map(|index| {
            (
                InputId {
                    node: NodeId::GRAPH,
                    index,
                },
                &self.socket_node.inputs()[index],
            )
        })
    }

    /// The primary output socket: the first one declared.
    pub fn primary_output_socket(&self) -> Option<(InputId, &InputPort)> {
        self.socket_node.inputs().first().map(|port| {
            (
                InputId {
                    node: NodeId::GRAPH,
                    index: 0,
                },
                port,
            )
        })
    }

    // ── ports ──────────────────────────────────────────────────────────

    /// The input port addressed by `id`.
    pub fn input(&self, id: InputId) -> &InputPort {
        &self.node(id.node).inputs[id.index]
    }

    pub(crate) fn input_mut(&mut self, id: InputId) -> &mut InputPort {
        &mut self.node_mut(id.node).inputs[id.index]
    }

    /// The output port addressed by `id`.
    pub fn output(&self, id: OutputId) -> &OutputPort {
        &self.node(id.node).outputs[id.index]
    }

    pub(crate) fn output_mut(&mut self, id: OutputId) -> &mut OutputPort {
        &mut self.node_mut(id.node).outputs[id.index]
    }

    // ── connection manager ─────────────────────────────────────────────

    /// Connects `from` to `to`, breaking any existing upstream of `to`.
    pub fn connect(&mut self, from: OutputId, to: InputId) {
        self.disconnect_input(to);
        self.input_mut(to).upstream = Some(from);
        let output = self.output_mut(from);
        if !output.downstream.contains(&to) {
            output.downstream.push(to);
        }
    }

    /// Breaks the upstream connection of `to`, if any.
    pub fn disconnect_input(&mut self, to: InputId) {
        if let Some(from) = self.input_mut(to).upstream.take() {
            self.output_mut(from).downstream.retain(|d| *d != to);
        }
    }

    /// Breaks every downstream connection of `from`.
    pub fn disconnect_output(&mut self, from: OutputId) {
        let downstream = std::mem::take(&mut self.output_mut(from).downstream);
        for to in downstream {
            self.input_mut(to).upstream = None;
        }
    }

    pub(crate) fn disconnect_node(&mut self, id: NodeId) {
        for index in 0..self.node(id).num_inputs() {
            self.disconnect_input(InputId { node: id, index });
        }
        for index in 0..self.node(id).num_outputs() {
            self.disconnect_output(OutputId { node: id, index });
        }
    }

    // ── traversal ──────────────────────────────────────────────────────

    /// Walks edges upstream from `from`, detecting cycles.
    pub fn traverse_upstream(&self, from: OutputId) -> UpstreamEdges<'_> {
        UpstreamEdges::new(self, from)
    }

    // ── bypass ─────────────────────────────────────────────────────────

    /// Splices the input at `input_index` through to every consumer of
    /// the output at `output_index`: as a connection when the input is
    /// driven, as a literal otherwise.
    pub fn bypass(
        &mut self,
        id: NodeId,
        input_index: usize,
        output_index: usize,
    ) -> Result<(), GraphError> {
        let node = self.node(id);
        if input_index >= node.num_inputs() {
            return Err(GraphError::PortNotFound {
                port: input_index,
                node: node.name().to_string(),
            });
        }
        if output_index >= node.num_outputs() {
            return Err(GraphError::PortNotFound {
                port: output_index,
                node: node.name().to_string(),
            });
        }

        let input = InputId {
            node: id,
            index: input_index,
        };
        let output = OutputId {
            node: id,
            index: output_index,
        };
        let downstream = self.output(output).downstream.clone();
        if let Some(source) = self.input(input).upstream {
            for to in downstream {
                self.disconnect_input(to);
                self.connect(source, to);
            }
        } else {
            let value = self.input(input).value.clone();
            for to in downstream {
                self.disconnect_input(to);
                self.input_mut(to).value = value.clone();
            }
        }
        Ok(())
    }

    // ── optimizer ──────────────────────────────────────────────────────

    /// Folds constant nodes and statically-decided conditionals, then
    /// removes nodes no output socket can reach.
    pub(crate) fn optimize(&mut self) -> Result<(), GraphError> {
        let mut edits = 0usize;
        let ids = self.order.clone();
        for id in ids {
            let class = self.node(id).classification();
            if class.contains(Classification::CONSTANT) {
                // A constant whose value input is published upstream must
                // stay; a literal one folds downstream.
                let literal = self
                    .node(id)
                    .input_at(0)
                    .is_some_and(|input| !input.is_connected());
                if literal {
                    self.bypass(id, 0, 0)?;
                    edits += 1;
                }
            } else if class.contains(Classification::IFELSE) {
                if let Some(branch) = self.fold_ifelse(id)? {
                    self.bypass(id, branch, 0)?;
                    edits += 1;
                }
            } else if class.contains(Classification::SWITCH) {
                if let Some(branch) = self.fold_switch(id)? {
                    self.bypass(id, branch, 0)?;
                    edits += 1;
                }
            }
        }
        if edits > 0 {
            self.collect_unused()?;
        }
        Ok(())
    }

    fn input_index_required(&self, id: NodeId, name: &str) -> Result<usize, GraphError> {
        self.node(id)
            .input_index(name)
            .ok_or_else(|| GraphError::InputNotFound {
                input: name.to_string(),
                node: self.node(id).name().to_string(),
            })
    }

    /// The literal feeding `input` when it is unconnected or driven by a
    /// constant node; `None` when it is driven by live upstream code.
    fn folded_literal(&self, input: InputId) -> Option<Option<&Value>> {
        match self.input(input).upstream {
            None => Some(self.input(input).value()),
            Some(up) if self.node(up.node).has_classification(Classification::CONSTANT) => {
                Some(self.node(up.node).input_at(0).and_then(InputPort::value))
            }
            Some(_) => None,
        }
    }

    /// The branch an if/else resolves to when its test is static.
    fn fold_ifelse(&self, id: NodeId) -> Result<Option<usize>, GraphError> {
        let intest = InputId {
            node: id,
            index: self.input_index_required(id, "intest")?,
        };
        let Some(test) = self.folded_literal(intest) else {
            return Ok(None);
        };
        let test = test.map(Value::as_float).transpose()?.unwrap_or(0.0);
        let cutoff = InputId {
            node: id,
            index: self.input_index_required(id, "cutoff")?,
        };
        let cutoff = self
            .input(cutoff)
            .value()
            .map(Value::as_float)
            .transpose()?
            .unwrap_or(0.0);
        Ok(Some(if test <= cutoff { 2 } else { 3 }))
    }

    /// The branch a switch resolves to when its selector is static.
    fn fold_switch(&self, id: NodeId) -> Result<Option<usize>, GraphError> {
        let which = InputId {
            node: id,
            index: self.input_index_required(id, "which")?,
        };
        let Some(value) = self.folded_literal(which) else {
            return Ok(None);
        };
        let branch = match value {
            // A missing selector picks branch 0.
            None => 0,
            Some(Value::Bool(b)) => *b as usize,
            Some(Value::Float(f)) => f.max(0.0) as usize,
            Some(Value::Int(i)) => (*i).max(0) as usize,
            Some(other) => {
                return Err(GraphError::Value(ValueTypeError::expected(
                    "integer",
                    other.type_name(),
                )))
            }
        };
        Ok(Some(branch))
    }

    /// Removes every node the output sockets can no longer reach.
    fn collect_unused(&mut self) -> Result<(), GraphError> {
        let mut live: HashSet<NodeId> = HashSet::new();
        let sockets: Vec<InputId> = (0..self.socket_node.num_inputs())
            .map(|index| InputId {
                node: NodeId::GRAPH,
                index,
            })
            .collect();
        for socket in sockets {
            let Some(connection) = self.input(socket).upstream else {
                continue;
            };
            if !connection.node.is_graph() {
                live.insert(connection.node);
            }
            for edge in self.traverse_upstream(connection) {
                live.insert(edge?.upstream.node);
            }
        }

        let dead: Vec<NodeId> = self
            .order
            .iter()
            .copied()
            .filter(|id| !live.contains(id))
            .collect();
        for id in dead {
            self.disconnect_node(id);
            self.color_transforms.retain(|(node, _)| *node != id);
            if let Some(node) = self.nodes.remove(&id) {
                self.by_name.remove(node.name());
            }
        }
        self.order.retain(|id| live.contains(id));
        Ok(())
    }

    // ── color transforms ───────────────────────────────────────────────

    /// Interposes the queued color-transform nodes on their source
    /// outputs.
    pub(crate) fn insert_color_transforms(
        &mut self,
        doc: &Document,
        generator: &dyn Generator,
    ) -> Result<(), GraphError> {
        let pending = std::mem::take(&mut self.color_transforms);
        for (id, transform) in pending {
            self.insert_color_transform(doc, generator, id, &transform)?;
        }
        Ok(())
    }

    fn insert_color_transform(
        &mut self,
        doc: &Document,
        generator: &dyn Generator,
        id: NodeId,
        transform: &str,
    ) -> Result<(), GraphError> {
        let source = OutputId { node: id, index: 0 };
        let def_name = format!("ND_{}_{}", transform, self.output(source).ty().name());
        // Transforms are only declared for color types; other outputs
        // pass through untouched.
        let Some(def) = doc.node_def(&def_name) else {
            return Ok(());
        };
        let name = format!("{}_{}", self.node(id).name(), transform);
        let node = Node::from_def(name, def, generator, None)?;
        let new_id = self.insert_node(node);
        let new_output = OutputId {
            node: new_id,
            index: 0,
        };
        for to in self.output(source).downstream.clone() {
            self.disconnect_input(to);
            self.connect(new_output, to);
        }
        self.connect(
            source,
            InputId {
                node: new_id,
                index: 0,
            },
        );
        Ok(())
    }

    // ── topological sort ───────────────────────────────────────────────

    /// Reorders interior nodes so every node follows its interior
    /// dependencies (Kahn's algorithm). Socket-driven inputs do not
    /// contribute to in-degrees.
    pub(crate) fn topological_sort(&mut self) -> Result<(), GraphError> {
        let mut in_degree: HashMap<NodeId, usize> = HashMap::with_capacity(self.order.len());
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        for &id in &self.order {
            let degree = self.nodes[&id]
                .inputs()
                .iter()
                .filter(|input| input.upstream().is_some_and(|up| !up.node.is_graph()))
                .count();
            in_degree.insert(id, degree);
            if degree == 0 {
                queue.push_back(id);
            }
        }

        let mut order = Vec::with_capacity(self.order.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for output_index in 0..self.node(id).num_outputs() {
                let output = OutputId {
                    node: id,
                    index: output_index,
                };
                for &to in self.output(output).downstream() {
                    if to.node.is_graph() {
                        continue;
                    }
                    if let Some(degree) = in_degree.get_mut(&to.node) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(to.node);
                        }
                    }
                }
            }
        }

        if order.len() != self.order.len() {
            let culprit = self
                .order
                .iter()
                .find(|id| !order.contains(id))
                .map(|id| self.node(*id).name().to_string())
                .unwrap_or_default();
            return Err(GraphError::Cycle { node: culprit });
        }
        self.order = order;
        Ok(())
    }

    // ── scope analysis ─────────────────────────────────────────────────

    /// Tags every node with its conditional scope, walking the sorted
    /// order in reverse so consumers are resolved before producers.
    pub(crate) fn calculate_scopes(&mut self) {
        let Some(&last) = self.order.last() else {
            return;
        };
        *self.node_mut(last).scope_mut() = ScopeInfo::Global;
        let mut used: HashSet<NodeId> = HashSet::from([last]);

        for order_index in (0..self.order.len()).rev() {
            let id = self.order[order_index];
            if !used.contains(&id) {
                continue;
            }
            let mut merges: Vec<(NodeId, ScopeInfo)> = Vec::new();
            {
                let node = self.node(id);
                let is_ifelse = node.has_classification(Classification::IFELSE);
                let is_switch = node.has_classification(Classification::SWITCH);
                let current = node.scope();
                let num_inputs = node.num_inputs();
                let switch_full_mask = ((1u64 << num_inputs) - 1) as u32;

                for (input_index, input) in node.inputs().iter().enumerate() {
                    let Some(up) = input.upstream() else { continue };
                    if up.node.is_graph() {
                        continue;
                    }
                    let mut candidate = current;
                    if is_ifelse && (input_index == 2 || input_index == 3) {
                        // Full mask for the two value branches of a compare.
                        candidate.adjust_at_conditional(id, input_index, 0x12);
                    } else if is_switch {
                        candidate.adjust_at_conditional(id, input_index, switch_full_mask);
                    }
                    merges.push((up.node, candidate));
                }
            }
            for (up, candidate) in merges {
                self.node_mut(up).scope_mut().merge(candidate);
                used.insert(up);
            }
        }
    }

    // ── name validation ────────────────────────────────────────────────

    /// Renames sockets and node outputs to legal, unique identifiers.
    /// Node outputs take the compound form `<node>_<output>`.
    pub(crate) fn validate_names(&mut self, syntax: &dyn Syntax) {
        let mut unique = UniqueNameMap::new();

        for index in 0..self.socket_node.num_outputs() {
            let mut name = self.socket_node.outputs()[index].name().to_string();
            syntax.make_unique(&mut name, &mut unique);
            self.socket_node.rename_output(index, name);
        }
        for index in 0..self.socket_node.num_inputs() {
            let mut name = self.socket_node.inputs()[index].name().to_string();
            syntax.make_unique(&mut name, &mut unique);
            self.socket_node.rename_input(index, name);
        }
        let ids = self.order.clone();
        for id in ids {
            let node = self.nodes.get_mut(&id).expect("ordered node present");
            for index in 0..node.num_outputs() {
                let mut name = format!("{}_{}", node.name(), node.outputs()[index].name());
                syntax.make_unique(&mut name, &mut unique);
                node.rename_output(index, name);
            }
        }
    }

    // ── closure tracking ───────────────────────────────────────────────

    /// Records, for every shader node, the closure nodes reachable
    /// upstream of its primary output.
    pub(crate) fn track_closures(&mut self) -> Result<(), GraphError> {
        let mut tracked: Vec<(NodeId, Vec<NodeId>)> = Vec::new();
        for &id in &self.order {
            if !self.node(id).has_classification(Classification::SHADER) {
                continue;
            }
            let mut closures = Vec::new();
            for edge in self.traverse_upstream(OutputId { node: id, index: 0 }) {
                let edge = edge?;
                if self
                    .node(edge.upstream.node)
                    .has_classification(Classification::CLOSURE)
                {
                    closures.push(edge.upstream.node);
                }
            }
            tracked.push((id, closures));
        }
        for (id, closures) in tracked {
            self.node_mut(id).used_closures.extend(closures);
        }
        Ok(())
    }

    // ── finalize ───────────────────────────────────────────────────────

    /// Runs the lowering pipeline: optimize, insert color transforms,
    /// sort, analyze scopes, assign unique names, track closures.
    ///
    /// After this the graph is frozen; emitters only read it.
    pub fn finalize(
        &mut self,
        doc: &Document,
        generator: &dyn Generator,
    ) -> Result<(), GraphError> {
        self.optimize()?;
        self.insert_color_transforms(doc, generator)?;
        self.topological_sort()?;
        self.calculate_scopes();
        self.validate_names(generator.syntax());
        self.track_closures()?;
        Ok(())
    }
}
