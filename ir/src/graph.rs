//! Mutable, name-keyed dataflow graph.
//!
//! Nodes are addressed by [`NodeId`], which is stable across mutation and
//! orders nodes by creation. Edges are value names: every node output and
//! every initializer is a [`ValueId`], and a node consumes values by listing
//! them in `inputs`. Shapes and dtypes are tracked per value, not per node.
//!
//! The graph holds both source-framework operators (`Enter`, `Merge`,
//! `TensorArrayReadV3`, ...) and target operators (`LSTM`, `Squeeze`, ...)
//! while a conversion is in flight.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::ops::Index;

use bon::Builder;
use rnnfold_dtype::DType;
use snafu::{OptionExt, ensure};

use crate::error::{DuplicateValueSnafu, Result, UnknownNodeSnafu};
use crate::types::{AttributeValue, Shape, TensorData, ValueId};

pub type Attributes = BTreeMap<String, AttributeValue>;

/// Build an attribute map from name/value pairs.
pub fn attrs<const N: usize>(pairs: [(&str, AttributeValue); N]) -> Attributes {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Stable node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub op_type: String,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    pub attrs: Attributes,
}

impl Node {
    pub fn attr(&self, name: &str) -> Option<&AttributeValue> {
        self.attrs.get(name)
    }

    pub fn attr_int(&self, name: &str) -> Option<i64> {
        match self.attrs.get(name)? {
            AttributeValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn attr_ints(&self, name: &str) -> Option<&[i64]> {
        match self.attrs.get(name)? {
            AttributeValue::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        match self.attrs.get(name)? {
            AttributeValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_op(&self, op_type: &str) -> bool {
        self.op_type == op_type
    }

    pub fn is_const(&self) -> bool {
        self.op_type == "Const"
    }
}

/// Everything needed to add one node.
///
/// ```ignore
/// let squeeze = graph.make_node(
///     NodeSpec::builder()
///         .op_type("Squeeze")
///         .inputs(vec![rnn_out.clone()])
///         .attrs(attrs([("axes", vec![1i64].into())]))
///         .shapes(vec![shape])
///         .build(),
/// )?;
/// ```
#[derive(Debug, Clone, Builder)]
pub struct NodeSpec {
    #[builder(into)]
    pub op_type: String,
    #[builder(default)]
    pub inputs: Vec<ValueId>,
    #[builder(default)]
    pub attrs: Attributes,
    /// Number of outputs to allocate when `outputs` is empty.
    #[builder(default = 1)]
    pub output_count: usize,
    /// Explicit output names; generated from the node name when empty.
    #[builder(default)]
    pub outputs: Vec<ValueId>,
    #[builder(default)]
    pub shapes: Vec<Shape>,
    #[builder(default)]
    pub dtypes: Vec<DType>,
    #[builder(into)]
    pub name: Option<String>,
}

/// Dataflow graph with per-value shape and dtype bookkeeping.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: BTreeMap<NodeId, Node>,
    producers: HashMap<ValueId, NodeId>,
    /// Every node name ever used. Removal keeps names reserved.
    node_names: HashSet<String>,
    shapes: HashMap<ValueId, Shape>,
    dtypes: HashMap<ValueId, DType>,
    initializers: BTreeMap<ValueId, TensorData>,
    inputs: Vec<ValueId>,
    outputs: Vec<ValueId>,
    opset: i64,
    next_node: usize,
    next_name: usize,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new(Self::DEFAULT_OPSET)
    }
}

impl Graph {
    pub const DEFAULT_OPSET: i64 = 13;

    pub fn new(opset: i64) -> Self {
        Self {
            nodes: BTreeMap::new(),
            producers: HashMap::new(),
            node_names: HashSet::new(),
            shapes: HashMap::new(),
            dtypes: HashMap::new(),
            initializers: BTreeMap::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            opset,
            next_node: 0,
            next_name: 0,
        }
    }

    pub fn opset(&self) -> i64 {
        self.opset
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Generate a name no node or value in the graph uses yet.
    pub fn make_name(&mut self, prefix: &str) -> String {
        loop {
            self.next_name += 1;
            let candidate = format!("{prefix}__{}", self.next_name);
            let taken = self.producers.contains_key(&candidate)
                || self.initializers.contains_key(&candidate)
                || self.node_names.contains(&candidate);
            if !taken {
                return candidate;
            }
        }
    }

    /// Declare a graph input (a value with no producer node).
    pub fn add_input(&mut self, id: impl Into<ValueId>, shape: Shape, dtype: DType) -> ValueId {
        let id = id.into();
        self.shapes.insert(id.clone(), shape);
        self.dtypes.insert(id.clone(), dtype);
        self.inputs.push(id.clone());
        id
    }

    /// Add a node, registering its outputs and any shapes/dtypes given.
    pub fn make_node(&mut self, spec: NodeSpec) -> Result<NodeId> {
        let name = match spec.name {
            Some(name) => name,
            None => self.make_name(&spec.op_type),
        };
        let outputs = if spec.outputs.is_empty() {
            (0..spec.output_count).map(|i| format!("{name}:{i}")).collect::<Vec<_>>()
        } else {
            spec.outputs
        };

        for out in &outputs {
            ensure!(
                !self.producers.contains_key(out) && !self.initializers.contains_key(out),
                DuplicateValueSnafu { value: out.clone() }
            );
        }

        let id = NodeId(self.next_node);
        self.next_node += 1;

        for (i, out) in outputs.iter().enumerate() {
            self.producers.insert(out.clone(), id);
            if let Some(shape) = spec.shapes.get(i) {
                self.shapes.insert(out.clone(), shape.clone());
            }
            if let Some(dtype) = spec.dtypes.get(i) {
                self.dtypes.insert(out.clone(), *dtype);
            }
        }

        tracing::trace!(node.id = %id, node.name = %name, op_type = %spec.op_type, "node created");
        self.node_names.insert(name.clone());
        self.nodes.insert(id, Node { name, op_type: spec.op_type, inputs: spec.inputs, outputs, attrs: spec.attrs });
        Ok(id)
    }

    /// Register a constant tensor under a fresh name derived from `prefix`.
    pub fn make_const(&mut self, prefix: &str, data: TensorData) -> ValueId {
        let id = self.make_name(prefix);
        self.shapes.insert(id.clone(), data.shape());
        self.dtypes.insert(id.clone(), data.dtype);
        self.initializers.insert(id.clone(), data);
        id
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn try_node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).context(UnknownNodeSnafu { node: id })
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, n)| (*id, n))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().find(|(_, n)| n.name == name).map(|(id, _)| *id)
    }

    pub fn get_node_by_output(&self, value: &str) -> Option<NodeId> {
        self.producers.get(value).copied()
    }

    /// Nodes that list `value` among their inputs, in creation order.
    pub fn find_output_consumers(&self, value: &str) -> Vec<NodeId> {
        self.nodes.iter().filter(|(_, n)| n.inputs.iter().any(|i| i == value)).map(|(id, _)| *id).collect()
    }

    pub fn get_shape(&self, value: &str) -> Option<&Shape> {
        self.shapes.get(value)
    }

    pub fn set_shape(&mut self, value: &str, shape: Shape) {
        self.shapes.insert(value.to_string(), shape);
    }

    pub fn get_dtype(&self, value: &str) -> Option<DType> {
        self.dtypes.get(value).copied()
    }

    pub fn set_dtype(&mut self, value: &str, dtype: DType) {
        self.dtypes.insert(value.to_string(), dtype);
    }

    pub fn initializer(&self, value: &str) -> Option<&TensorData> {
        self.initializers.get(value)
    }

    /// True for initializers and for outputs of `Const` nodes.
    pub fn is_const(&self, value: &str) -> bool {
        self.initializers.contains_key(value)
            || self.get_node_by_output(value).and_then(|id| self.node(id)).is_some_and(Node::is_const)
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.outputs
    }

    pub fn set_outputs(&mut self, outputs: Vec<ValueId>) {
        self.outputs = outputs;
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Rewire every consumer of `old` (nodes and graph outputs) to read `new`.
    ///
    /// The node producing `new` is left alone so that a node derived from
    /// `old` does not end up consuming itself.
    pub fn replace_all_inputs(&mut self, old: &str, new: &str) {
        let ids = self.node_ids();
        self.replace_inputs_in(&ids, old, new);
        for out in self.outputs.iter_mut().filter(|o| o.as_str() == old) {
            *out = new.to_string();
        }
    }

    /// Rewire consumers of `old` to `new`, restricted to `scope`.
    pub fn replace_inputs_in(&mut self, scope: &[NodeId], old: &str, new: &str) {
        if old == new {
            return;
        }
        let new_producer = self.get_node_by_output(new);
        for id in scope {
            if Some(*id) == new_producer {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(id) {
                for input in node.inputs.iter_mut().filter(|i| i.as_str() == old) {
                    *input = new.to_string();
                }
            }
        }
        tracing::trace!(old, new, "inputs replaced");
    }

    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        for out in &node.outputs {
            self.producers.remove(out);
            self.shapes.remove(out);
            self.dtypes.remove(out);
        }
        Some(node)
    }

    /// Collect nodes backward from the producers of `outputs`.
    ///
    /// `expand` decides, per visited node, whether the walk continues into its
    /// inputs. Nodes that stop the walk are still part of the result, and every
    /// node appears at most once. The result is in creation order.
    pub fn extract_sub_graph_nodes<F>(&self, outputs: &[ValueId], mut expand: F) -> Vec<NodeId>
    where
        F: FnMut(&Node) -> bool,
    {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeId> = outputs.iter().filter_map(|o| self.get_node_by_output(o)).collect();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = self.node(id) else { continue };
            if !expand(node) {
                continue;
            }
            stack.extend(node.inputs.iter().filter_map(|i| self.get_node_by_output(i)));
        }

        let mut result: Vec<_> = visited.into_iter().collect();
        result.sort();
        result
    }

    /// Remove every node that does not contribute to `outputs`.
    ///
    /// Initializers no remaining node reads are dropped as well. Returns the
    /// number of removed nodes.
    pub fn delete_unused_nodes(&mut self, outputs: &[ValueId]) -> usize {
        let live: HashSet<NodeId> = self.extract_sub_graph_nodes(outputs, |_| true).into_iter().collect();
        let dead: Vec<NodeId> = self.nodes.keys().filter(|id| !live.contains(id)).copied().collect();
        for id in &dead {
            self.remove_node(*id);
        }

        let used: HashSet<&ValueId> = self.nodes.values().flat_map(|n| n.inputs.iter()).chain(outputs.iter()).collect();
        let unused: Vec<ValueId> = self.initializers.keys().filter(|k| !used.contains(k)).cloned().collect();
        for id in unused {
            self.initializers.remove(&id);
            self.shapes.remove(&id);
            self.dtypes.remove(&id);
        }

        tracing::debug!(removed = dead.len(), remaining = self.nodes.len(), "unused nodes deleted");
        dead.len()
    }
}

impl Index<NodeId> for Graph {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[&id]
    }
}
