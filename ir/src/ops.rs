//! Op-type predicates for source-framework operators.

use crate::graph::Node;

/// Per-element conditional selection (`Select`, `SelectV2`, `Where`).
pub fn is_select_op(node: &Node) -> bool {
    matches!(node.op_type.as_str(), "Select" | "SelectV2" | "Where")
}

pub fn is_tensor_array_write_op(node: &Node) -> bool {
    matches!(node.op_type.as_str(), "TensorArrayWriteV3" | "TensorArrayWriteV2")
}

pub fn is_enter_op(node: &Node) -> bool {
    node.op_type == "Enter"
}

pub fn is_merge_op(node: &Node) -> bool {
    node.op_type == "Merge"
}

pub fn is_loop_cond_op(node: &Node) -> bool {
    node.op_type == "LoopCond"
}
