
use crate::graph::{Graph, NodeId, NodeSpec};

/// Add a single-output node with generated name.
pub fn op(graph: &mut Graph, op_type: &str, inputs: &[&str]) -> NodeId {
    let spec = NodeSpec::builder().op_type(op_type).inputs(inputs.iter().map(|s| s.to_string()).collect()).build();
    graph.make_node(spec).unwrap()
}

/// First output of `node`.
pub fn out(graph: &Graph, node: NodeId) -> String {
    graph[node].outputs[0].clone()
}
