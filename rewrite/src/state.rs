//! State-variable resolution.

use std::collections::BTreeMap;

use rnnfold_ir::{Graph, NodeId, ops};

use crate::context::UnitRnnContext;
use crate::loop_props::LoopVariable;
use crate::variant::StateVariableHandler;

/// Resolve state variables with the first handler whose finders all succeed.
///
/// Handlers are tried in order and each is resolved in isolation, so a
/// handler that fails halfway leaves nothing behind. Returns the index of the
/// selected handler with its variables.
pub fn resolve_state_variables(
    graph: &Graph,
    context: &UnitRnnContext,
    handlers: &[StateVariableHandler],
) -> Option<(usize, BTreeMap<String, LoopVariable>)> {
    handlers.iter().enumerate().find_map(|(index, handler)| {
        let vars = handler.resolve(graph, context)?;
        tracing::debug!(handler = index, vars = ?handler.names().collect::<Vec<_>>(), "state variable handler selected");
        Some((index, vars))
    })
}

/// Find the loop variable that flows from `switch_true_identity_consumers`
/// into `next_iteration_input`.
///
/// A sequence-length mask puts a select between the cell output and
/// `NextIteration`. When exactly one select consumes `next_iteration_input`
/// without feeding a tensor array write, the variable is looked up through
/// that select instead, and the select must read the current value too.
pub fn find_state_variable_with_select(
    graph: &Graph,
    context: &UnitRnnContext,
    next_iteration_input: &str,
    switch_true_identity_consumers: &[NodeId],
) -> Option<LoopVariable> {
    let selects: Vec<NodeId> = graph
        .find_output_consumers(next_iteration_input)
        .into_iter()
        .filter(|&id| {
            let node = &graph[id];
            ops::is_select_op(node)
                && !node.outputs.first().is_some_and(|out| {
                    graph.find_output_consumers(out).into_iter().any(|c| ops::is_tensor_array_write_op(&graph[c]))
                })
        })
        .collect();

    let mut consumers = switch_true_identity_consumers.to_vec();
    let mut next_iteration_input = next_iteration_input.to_string();
    if let [select] = selects[..]
        && let Some(out) = graph[select].outputs.first()
    {
        next_iteration_input = out.clone();
        consumers.push(select);
    }
    tracing::trace!(next_iteration_input = %next_iteration_input, consumers = consumers.len(), "looking up state variable");

    let candidates = context.loop_properties.get_variables(|var| {
        var.next_iteration_input.id == next_iteration_input
            && consumers.iter().all(|&c| graph.node(c).is_some_and(|n| n.inputs.contains(&var.switch_true_identity_output.id)))
    });
    match candidates[..] {
        [var] => Some(var.clone()),
        _ => {
            tracing::debug!(found = candidates.len(), "expected exactly one state variable");
            None
        }
    }
}
