//! Per-candidate state threaded through the rewrite pipeline.

use std::collections::BTreeMap;

use rnnfold_ir::{Attributes, MatchResult, NodeId, ValueId};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::loop_props::{LoopProperties, LoopRegion, LoopVariable};

/// Operand roles of the ONNX unit RNN operators, in positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum OnnxInput {
    X,
    W,
    R,
    B,
    #[strum(serialize = "sequence_lens")]
    SequenceLens,
    #[strum(serialize = "initial_h")]
    InitialH,
    #[strum(serialize = "initial_c")]
    InitialC,
    P,
}

/// Why a candidate loop was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The while-context scope has no enclosing rnn scope.
    ScopeUnresolved,
    /// The loop parser rejected the region.
    LoopParseFailed,
    /// The cell template did not match exactly once.
    CellMatch { matches: usize },
    EmptyWeights,
    /// No state-variable handler resolved all of its variables.
    NoStateVariableHandler,
    /// Only loops with a single scan input are supported.
    ScanInputArity { found: usize },
    AttributeParseFailed,
    /// The variant's final validity check failed.
    InvalidUnitRnn,
}

/// Outcome of the read-only feasibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feasibility {
    Rewrite,
    Skip(SkipReason),
}

impl Feasibility {
    pub fn is_rewrite(&self) -> bool {
        matches!(self, Feasibility::Rewrite)
    }
}

/// Everything learned about one candidate loop.
///
/// Created fresh for each candidate, filled in by the feasibility check and
/// carried into the rewrite only when the check passes.
#[derive(Debug, Clone, Default)]
pub struct UnitRnnContext {
    pub while_context_scope: String,
    pub loop_cond: Option<NodeId>,
    pub rnn_scope: String,
    pub loop_properties: LoopProperties,

    pub cell_match: Option<MatchResult>,
    /// Raw weights and biases by variant-defined role.
    pub weights: BTreeMap<String, ValueId>,
    pub state_variables: BTreeMap<String, LoopVariable>,
    /// Index of the state-variable handler that resolved.
    pub state_variable_handler: Option<usize>,
    /// Per-batch sequence lengths found in the source graph.
    pub seq_len_source: Option<ValueId>,
    pub input_size: Option<i64>,
    pub hidden_size: Option<i64>,

    pub attributes: Attributes,
    pub onnx_input_ids: BTreeMap<OnnxInput, ValueId>,
    pub rnn_node: Option<NodeId>,
}

impl UnitRnnContext {
    pub fn new(region: &LoopRegion) -> Self {
        Self {
            while_context_scope: region.while_context_scope.clone(),
            loop_cond: Some(region.loop_cond),
            ..Default::default()
        }
    }

    pub fn onnx_input(&self, role: OnnxInput) -> Option<&ValueId> {
        self.onnx_input_ids.get(&role)
    }

    /// Operands in positional order. Missing optional operands become empty
    /// names; trailing ones are dropped.
    pub fn positional_inputs(&self) -> Vec<ValueId> {
        let Some(last) = self.onnx_input_ids.keys().next_back() else {
            return Vec::new();
        };
        OnnxInput::iter()
            .take_while(|role| role <= last)
            .map(|role| self.onnx_input_ids.get(&role).cloned().unwrap_or_default())
            .collect()
    }
}
