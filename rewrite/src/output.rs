//! Reconnecting the fused node's outputs to the original consumers.
//!
//! ONNX unit RNNs emit `Y` as `[time, num_directions, batch, hidden]` and
//! `Y_h`/`Y_c` as `[num_directions, batch, hidden]`. Only unidirectional
//! cells are rewritten, so each output loses its direction axis before it
//! replaces the loop's value.

use rnnfold_ir::{Graph, GraphBuilder};
use snafu::{OptionExt, ResultExt, ensure};

use crate::context::UnitRnnContext;
use crate::error::{
    GraphSnafu, MissingRnnNodeSnafu, MissingRnnOutputSnafu, Result, RnnOutputShapeSnafu, UnresolvedStateVariableSnafu,
};
use crate::variant::StateVariableHandler;

/// Connect every state-variable output through `handler`, then the sequence output.
pub fn process_outputs(graph: &mut Graph, context: &UnitRnnContext, handler: &StateVariableHandler) -> Result<()> {
    for entry in handler.entries() {
        (entry.connector)(graph, context)?;
        tracing::debug!(var = %entry.name, "state output connected");
    }
    connect_unit_rnn_output_to_graph(graph, context)
}

/// Replace the gathered scan output with `Y` squeezed to `[time, batch, hidden]`.
///
/// Does nothing when nothing reads the loop's scan output after the loop.
pub fn connect_unit_rnn_output_to_graph(graph: &mut Graph, context: &UnitRnnContext) -> Result<()> {
    let exits = context.loop_properties.scan_outputs_exits();
    let Some(gather) = exits.first() else {
        tracing::debug!(scope = %context.rnn_scope, "rnn sequence output unused");
        return Ok(());
    };
    if graph.find_output_consumers(&gather.id).is_empty() && !graph.outputs().contains(&gather.id) {
        tracing::debug!(scope = %context.rnn_scope, gather = %gather.id, "no one consumes the rnn sequence output");
        return Ok(());
    }

    let rnn_node = context.rnn_node.context(MissingRnnNodeSnafu { scope: context.rnn_scope.clone() })?;
    let output = graph
        .try_node(rnn_node)
        .context(GraphSnafu)?
        .outputs
        .first()
        .cloned()
        .context(MissingRnnOutputSnafu { node: rnn_node, index: 0usize })?;
    let shape = graph.get_shape(&output).cloned();
    ensure!(shape.as_ref().is_some_and(|s| s.len() == 4), RnnOutputShapeSnafu { value: output.clone(), shape });

    let squeezed = GraphBuilder::new(graph).make_squeeze(&output, &[1]).context(GraphSnafu)?;
    graph.replace_all_inputs(&gather.id, &squeezed);
    tracing::debug!(gather = %gather.id, squeezed = %squeezed, "rnn sequence output connected");
    Ok(())
}

/// Replace the exit value of state variable `name` with output `index` of the
/// fused node, squeezed to `[batch, hidden]`.
///
/// Common connector for `Y_h`/`Y_c` style outputs. Does nothing when nothing
/// reads the exit value.
pub fn connect_state_output(graph: &mut Graph, context: &UnitRnnContext, name: &str, index: usize) -> Result<()> {
    let var = context.state_variables.get(name).context(UnresolvedStateVariableSnafu { name })?;
    let Some(exit) = &var.exit_output else {
        tracing::debug!(var = name, "state variable unused after the loop");
        return Ok(());
    };
    if graph.find_output_consumers(&exit.id).is_empty() && !graph.outputs().contains(&exit.id) {
        tracing::debug!(var = name, exit = %exit.id, "no one consumes the state output");
        return Ok(());
    }

    let rnn_node = context.rnn_node.context(MissingRnnNodeSnafu { scope: context.rnn_scope.clone() })?;
    let output = graph
        .try_node(rnn_node)
        .context(GraphSnafu)?
        .outputs
        .get(index)
        .cloned()
        .context(MissingRnnOutputSnafu { node: rnn_node, index })?;

    let squeezed = GraphBuilder::new(graph).make_squeeze(&output, &[0]).context(GraphSnafu)?;
    graph.replace_all_inputs(&exit.id, &squeezed);
    tracing::debug!(var = name, exit = %exit.id, squeezed = %squeezed, "state output connected");
    Ok(())
}
