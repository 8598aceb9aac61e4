use snafu::Snafu;

use crate::graph::NodeId;
use crate::types::ValueId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Two producers for the same value.
    #[snafu(display("value {value} already has a producer"))]
    DuplicateValue { value: ValueId },

    /// A value is referenced but nothing produces it.
    #[snafu(display("no node or initializer produces value {value}"))]
    UnknownValue { value: ValueId },

    /// Node id does not refer to a live node.
    #[snafu(display("node {node} does not exist"))]
    UnknownNode { node: NodeId },

    /// Node was asked for an output it does not have.
    #[snafu(display("node {node} has {count} outputs, output {index} requested"))]
    OutputIndexOutOfRange { node: String, index: usize, count: usize },

    /// Shape is required but not (fully) known.
    #[snafu(display("shape of {value} is not fully known"))]
    UnknownShape { value: ValueId },

    /// Evaluator met an operator or operand form it cannot fold.
    #[snafu(display("cannot fold {op_type} node {node}: {reason}"))]
    UnsupportedFold { op_type: String, node: String, reason: &'static str },

    /// Attribute missing or of the wrong kind.
    #[snafu(display("node {node} has no usable attribute {attr}"))]
    MissingAttribute { node: String, attr: &'static str },
}
