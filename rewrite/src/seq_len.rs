//! Sequence lengths: found in the source graph, or synthesized from the input shape.

use rnnfold_ir::builder::SLICE_INPUTS_OPSET;
use rnnfold_ir::{DType, Graph, GraphBuilder, GraphMatcher, OpPattern, ValueId, ops};
use snafu::{OptionExt, ResultExt};

use crate::context::{OnnxInput, UnitRnnContext};
use crate::error::{GraphSnafu, MissingOperandSnafu, Result, SequenceLengthPatternSnafu};

/// Width ONNX requires for `sequence_lens`.
pub const SEQUENCE_LENS_DTYPE: DType = DType::Int32;

/// `Select(GreaterEqual(time, Enter(seq_len_node)), zeros, new_value)`.
pub fn seq_len_pattern() -> OpPattern {
    OpPattern::new("Select|SelectV2").with_inputs(vec![
        OpPattern::new("GreaterEqual").with_inputs(vec![
            OpPattern::any(),
            OpPattern::new("Enter").with_inputs(vec![OpPattern::any().named("seq_len_node")]),
        ]),
        OpPattern::any(),
        OpPattern::any(),
    ])
}

/// Find the per-batch lengths the loop masks its state with.
///
/// `Ok(None)` when the state is not masked. A masking select that does not
/// compare against an entered length is an error, since skipping it would
/// drop the mask.
pub fn find_sequence_length_source(graph: &Graph, context: &UnitRnnContext) -> Result<Option<ValueId>> {
    let Some(state_variable) = context.state_variables.values().next() else {
        return Ok(None);
    };
    let Some(producer) = graph.get_node_by_output(&state_variable.next_iteration_input.id) else {
        return Ok(None);
    };
    let node = &graph[producer];
    if !ops::is_select_op(node) {
        tracing::debug!(scope = %context.rnn_scope, "no sequence length given");
        return Ok(None);
    }

    let result = GraphMatcher::new(seq_len_pattern())
        .match_op(graph, producer)
        .context(SequenceLengthPatternSnafu { node: node.name.clone() })?;
    let source = result.get_tensor("seq_len_node").context(SequenceLengthPatternSnafu { node: node.name.clone() })?;
    tracing::debug!(scope = %context.rnn_scope, seq_len = source, "sequence length found");
    Ok(Some(source.to_string()))
}

/// Populate the `sequence_lens` operand.
///
/// An explicit source is cast to int32 when its dtype is known to differ.
/// Otherwise every batch entry gets the full time dimension of `X`.
pub fn process_seq_length(graph: &mut Graph, context: &mut UnitRnnContext) -> Result<()> {
    let lens = match &context.seq_len_source {
        Some(source) => match graph.get_dtype(source) {
            Some(dtype) if dtype != SEQUENCE_LENS_DTYPE => {
                tracing::debug!(from = %dtype, to = %SEQUENCE_LENS_DTYPE, "casting sequence lengths");
                GraphBuilder::new(graph).make_cast(source, SEQUENCE_LENS_DTYPE).context(GraphSnafu)?
            }
            _ => source.clone(),
        },
        None => {
            let x = context.onnx_input(OnnxInput::X).context(MissingOperandSnafu { role: OnnxInput::X })?;
            synthesize_sequence_lens(graph, x)?
        }
    };
    context.onnx_input_ids.insert(OnnxInput::SequenceLens, lens);
    Ok(())
}

/// Lengths for a `[time, batch, input]` tensor: `batch` copies of `time`, as int32.
///
/// Before opset 10 `Slice` cannot take int64 data, so the shape takes a
/// float detour and the repeat count is cast back to int64 for `Tile`.
pub fn synthesize_sequence_lens(graph: &mut Graph, x: &str) -> Result<ValueId> {
    let float_detour = graph.opset() < SLICE_INPUTS_OPSET;
    let lens = build_sequence_lens(&mut GraphBuilder::new(graph), x, float_detour).context(GraphSnafu)?;
    tracing::debug!(x, lens = %lens, float_detour, "sequence lengths synthesized");
    Ok(lens)
}

fn build_sequence_lens(b: &mut GraphBuilder<'_>, x: &str, float_detour: bool) -> rnnfold_ir::Result<ValueId> {
    let mut shape = b.make_shape(x)?;
    if float_detour {
        shape = b.make_cast(&shape, DType::Float32)?;
    }
    let mut batch = b.make_slice(&shape, &[0], &[1], &[2])?;
    if float_detour {
        batch = b.make_cast(&batch, DType::Int64)?;
    }
    let time = b.make_slice(&shape, &[0], &[0], &[1])?;
    let tiled = b.make_tile(&time, &batch)?;
    b.make_cast(&tiled, SEQUENCE_LENS_DTYPE)
}
