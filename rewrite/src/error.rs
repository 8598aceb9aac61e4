use snafu::Snafu;

use rnnfold_ir::{NodeId, Shape, ValueId};

use crate::context::OnnxInput;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that abort a rewrite.
///
/// Candidates that merely do not fit are not errors; they are reported as
/// [`SkipReason`](crate::context::SkipReason)s.
#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A masking select feeds a state variable but its condition is not a
    /// recognized sequence-length comparison.
    #[snafu(display("select node {node} masks the loop state but no sequence length can be found"))]
    SequenceLengthPattern { node: String },

    /// A rewrite stage needed an operand role that nothing populated.
    #[snafu(display("operand {role} has not been resolved"))]
    MissingOperand { role: OnnxInput },

    /// Output handling ran before the fused node was created.
    #[snafu(display("no fused rnn node in context for scope {scope}"))]
    MissingRnnNode { scope: String },

    /// Fused node output does not have the `[time, directions, batch, hidden]` layout.
    #[snafu(display("rnn output {value} has shape {shape:?}, expected rank 4"))]
    RnnOutputShape { value: ValueId, shape: Option<Shape> },

    /// Rewrite was called on a context whose check selected no state-variable handler.
    #[snafu(display("no state-variable handler selected for scope {scope}"))]
    MissingStateHandler { scope: String },

    /// A connector was asked for a state variable the selected handler did not resolve.
    #[snafu(display("state variable {name} was not resolved"))]
    UnresolvedStateVariable { name: String },

    /// Fused node has fewer outputs than a connector expects.
    #[snafu(display("rnn node {node} has no output {index}"))]
    MissingRnnOutput { node: NodeId, index: usize },

    #[snafu(display("graph operation failed: {source}"))]
    Graph { source: rnnfold_ir::Error },
}
