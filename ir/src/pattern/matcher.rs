use smallvec::SmallVec;

use super::OpPattern;
use crate::graph::{Graph, NodeId};
use crate::types::ValueId;

/// What a named pattern slot was bound to.
///
/// `node` is `None` when a wildcard matched a value with no producer node
/// (a graph input or an initializer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub node: Option<NodeId>,
    pub tensor: ValueId,
}

/// Bindings in the order they were made. Cell templates rarely name more than
/// a handful of slots, so the store stays on the stack.
pub type BindingStore = SmallVec<[(String, Binding); 8]>;

/// Bindings of one successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    bindings: BindingStore,
}

impl MatchResult {
    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    /// Node bound to `name`.
    pub fn get_op(&self, name: &str) -> Option<NodeId> {
        self.get(name)?.node
    }

    /// Value bound to `name`: the first output of the bound node, or the
    /// value itself for nodeless wildcards.
    pub fn get_tensor(&self, name: &str) -> Option<&str> {
        self.get(name).map(|b| b.tensor.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Roots an [`OpPattern`] at graph nodes.
///
/// With `allow_reorder`, the input patterns of every pattern node may match
/// the node's inputs in any order, so `Add(x, MatMul(..))` also matches
/// `Add(MatMul(..), x)`. Each root yields at most one result: the first
/// ordering that matches.
#[derive(Debug, Clone)]
pub struct GraphMatcher {
    pattern: OpPattern,
    allow_reorder: bool,
}

impl GraphMatcher {
    pub fn new(pattern: OpPattern) -> Self {
        Self { pattern, allow_reorder: false }
    }

    pub fn allow_reorder(mut self, allow: bool) -> Self {
        self.allow_reorder = allow;
        self
    }

    pub fn pattern(&self) -> &OpPattern {
        &self.pattern
    }

    /// Match with the pattern root at `node`.
    pub fn match_op(&self, graph: &Graph, node: NodeId) -> Option<MatchResult> {
        let tensor = graph.node(node)?.outputs.first().cloned().unwrap_or_default();
        let mut store = BindingStore::new();
        let matched = self.match_internal(graph, &self.pattern, Some(node), &tensor, &mut store);
        tracing::trace!(root = %node, matched, "pattern rooted at node");
        matched.then_some(MatchResult { bindings: store })
    }

    /// Match with the pattern root at each of `nodes`, keeping the successes.
    pub fn match_ops(&self, graph: &Graph, nodes: &[NodeId]) -> Vec<MatchResult> {
        nodes.iter().filter_map(|&id| self.match_op(graph, id)).collect()
    }

    fn match_internal(
        &self,
        graph: &Graph,
        pattern: &OpPattern,
        node: Option<NodeId>,
        tensor: &str,
        store: &mut BindingStore,
    ) -> bool {
        let op = node.and_then(|id| graph.node(id));

        // 1. Op type. Nodeless values only match wildcards.
        match op {
            Some(op) if !pattern.accepts(&op.op_type) => return false,
            None if !pattern.is_wildcard() => return false,
            _ => {}
        }

        // 2. Named binding. A name bound twice must bind the same thing.
        if let Some(name) = pattern.name() {
            let binding = Binding { node, tensor: tensor.to_string() };
            match store.iter().find(|(n, _)| n == name) {
                Some((_, existing)) => {
                    let same = match (existing.node, node) {
                        (Some(a), Some(b)) => a == b,
                        (None, None) => existing.tensor == tensor,
                        _ => false,
                    };
                    if !same {
                        return false;
                    }
                }
                None => store.push((name.to_string(), binding)),
            }
        }

        // 3. Inputs.
        let Some(input_patterns) = pattern.inputs() else {
            return true;
        };
        let Some(op) = op else {
            return false;
        };
        if op.inputs.len() != input_patterns.len() {
            return false;
        }

        let orders = if self.allow_reorder {
            permutations(input_patterns.len())
        } else {
            vec![(0..input_patterns.len()).collect()]
        };

        for order in orders {
            let mut attempt = store.clone();
            let all = op.inputs.iter().zip(&order).all(|(input, &pat_idx)| {
                let producer = graph.get_node_by_output(input);
                self.match_internal(graph, &input_patterns[pat_idx], producer, input, &mut attempt)
            });
            if all {
                *store = attempt;
                return true;
            }
        }
        false
    }
}

/// All orderings of `0..n`, identity first (Heap's algorithm).
fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut result = vec![indices.clone()];

    let mut c = vec![0; n];
    let mut i = 0;
    while i < n {
        if c[i] < i {
            if i % 2 == 0 {
                indices.swap(0, i);
            } else {
                indices.swap(c[i], i);
            }
            result.push(indices.clone());
            c[i] += 1;
            i = 0;
        } else {
            c[i] = 0;
            i += 1;
        }
    }

    result
}
