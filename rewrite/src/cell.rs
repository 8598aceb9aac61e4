//! Cell template matching over a loop body.

use std::collections::HashSet;

use rnnfold_ir::{Graph, GraphMatcher, MatchResult, NodeId, OpPattern, ValueId, ops};

use crate::context::UnitRnnContext;

/// Nodes of the loop body between the loop's inputs and its outputs.
///
/// The walk goes backward from the producers of the state and scan outputs
/// and stops at `Enter`, `Merge` and constant nodes, and at nodes producing a
/// state or scan input. Stopping nodes are part of the body.
pub fn body_nodes(graph: &Graph, context: &UnitRnnContext) -> Vec<NodeId> {
    let props = &context.loop_properties;
    let input_ids: HashSet<&str> =
        props.state_inputs().into_iter().chain(props.scan_inputs()).map(|info| info.id.as_str()).collect();
    let output_ids: Vec<ValueId> =
        props.state_outputs().into_iter().chain(props.scan_outputs()).map(|info| info.id.clone()).collect();

    graph.extract_sub_graph_nodes(&output_ids, |node| {
        if ops::is_enter_op(node) || ops::is_merge_op(node) || node.is_const() {
            return false;
        }
        !node.outputs.iter().any(|o| input_ids.contains(o.as_str()))
    })
}

/// All matches of `pattern` rooted in the loop body.
#[tracing::instrument(skip_all, fields(scope = %context.rnn_scope))]
pub fn match_cell(graph: &Graph, context: &UnitRnnContext, pattern: &OpPattern, allow_reorder: bool) -> Vec<MatchResult> {
    let body = body_nodes(graph, context);
    let matcher = GraphMatcher::new(pattern.clone()).allow_reorder(allow_reorder);
    let matches = matcher.match_ops(graph, &body);
    tracing::debug!(body_nodes = body.len(), pattern_size = pattern.size(), matches = matches.len(), "cell template matched");
    matches
}
