//! Symbolic description of a `while` loop, as produced by a loop parser.
//!
//! A loop carries two kinds of variables through its `Enter -> Merge ->
//! Switch -> Identity ... NextIteration` cycle. State variables hold a tensor
//! across iterations (`h`, `c`). Scan variables are tensor arrays written once
//! per iteration and gathered after the loop exits. Tensor arrays read once
//! per iteration are the scan inputs.
//!
//! ```text
//!   enter_input ─▶ Enter ─▶ Merge ─▶ Switch ─┬─(true)─▶ Identity ─▶ body ─▶ next_iteration_input
//!                            ▲               └─(false)─▶ Exit ─▶ exit_output
//!                            └──────────── NextIteration ◀────────────────────┘
//! ```

use rnnfold_ir::{DType, Graph, NodeId, Shape, ValueId, ops};

/// A value together with its static shape and dtype, as recorded in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValueInfo {
    pub id: ValueId,
    pub shape: Option<Shape>,
    pub dtype: Option<DType>,
}

impl TensorValueInfo {
    pub fn new(graph: &Graph, id: impl Into<ValueId>) -> Self {
        let id = id.into();
        let shape = graph.get_shape(&id).cloned();
        let dtype = graph.get_dtype(&id);
        Self { id, shape, dtype }
    }
}

/// One loop-carried variable.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopVariable {
    pub enter_name: String,
    /// Initial value, fed into the loop's `Enter`.
    pub enter_input_id: ValueId,
    /// Value computed by the body and fed to `NextIteration`.
    pub next_iteration_input: TensorValueInfo,
    /// Value the body reads for the current iteration.
    pub switch_true_identity_output: TensorValueInfo,
    /// Value visible after the loop. For tensor arrays this is the gathered result.
    pub exit_output: Option<TensorValueInfo>,
    pub is_tensor_array: bool,
    /// Write index of a tensor array variable.
    pub ta_index_id: Option<ValueId>,
}

/// Tensor array scattered before the loop and read once per iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorArrayInput {
    pub index_input_id: ValueId,
    /// Tensor scattered into the array.
    pub data_input_id: ValueId,
    /// Per-iteration read of the array.
    pub consumer: TensorValueInfo,
}

/// Variables of one loop, in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopProperties {
    state_variables: Vec<LoopVariable>,
    scan_variables: Vec<LoopVariable>,
    tensor_array_inputs: Vec<TensorArrayInput>,
}

impl LoopProperties {
    /// Register a variable. Tensor arrays become scan variables. A variable
    /// with the same next-iteration input as an existing one replaces it.
    pub fn add_variable(&mut self, var: LoopVariable) {
        let list = if var.is_tensor_array { &mut self.scan_variables } else { &mut self.state_variables };
        match list.iter_mut().find(|v| v.next_iteration_input.id == var.next_iteration_input.id) {
            Some(existing) => *existing = var,
            None => list.push(var),
        }
    }

    pub fn add_scan_input(&mut self, input: TensorArrayInput) {
        self.tensor_array_inputs.push(input);
    }

    pub fn state_variables(&self) -> &[LoopVariable] {
        &self.state_variables
    }

    pub fn scan_variables(&self) -> &[LoopVariable] {
        &self.scan_variables
    }

    pub fn tensor_array_inputs(&self) -> &[TensorArrayInput] {
        &self.tensor_array_inputs
    }

    /// State variables first, then scan variables.
    pub fn all_variables(&self) -> impl Iterator<Item = &LoopVariable> {
        self.state_variables.iter().chain(&self.scan_variables)
    }

    /// Every variable accepted by `predicate`.
    pub fn get_variables<F>(&self, predicate: F) -> Vec<&LoopVariable>
    where
        F: Fn(&LoopVariable) -> bool,
    {
        self.all_variables().filter(|v| predicate(v)).collect()
    }

    pub fn state_inputs(&self) -> Vec<&TensorValueInfo> {
        self.state_variables.iter().map(|v| &v.switch_true_identity_output).collect()
    }

    pub fn state_inputs_initial_values(&self) -> Vec<&ValueId> {
        self.state_variables.iter().map(|v| &v.enter_input_id).collect()
    }

    pub fn state_outputs(&self) -> Vec<&TensorValueInfo> {
        self.state_variables.iter().map(|v| &v.next_iteration_input).collect()
    }

    pub fn state_outputs_exits(&self) -> Vec<&TensorValueInfo> {
        self.state_variables.iter().filter_map(|v| v.exit_output.as_ref()).collect()
    }

    pub fn scan_outputs(&self) -> Vec<&TensorValueInfo> {
        self.scan_variables.iter().map(|v| &v.next_iteration_input).collect()
    }

    /// Gathered results of the scan outputs that are used after the loop.
    pub fn scan_outputs_exits(&self) -> Vec<&TensorValueInfo> {
        self.scan_variables.iter().filter_map(|v| v.exit_output.as_ref()).collect()
    }

    pub fn scan_inputs(&self) -> Vec<&TensorValueInfo> {
        self.tensor_array_inputs.iter().map(|i| &i.consumer).collect()
    }

    pub fn scan_inputs_initial_values(&self) -> Vec<&ValueId> {
        self.tensor_array_inputs.iter().map(|i| &i.data_input_id).collect()
    }
}

/// One candidate loop, identified by its `LoopCond` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopRegion {
    /// Name scope shared by the loop's control-flow nodes, with a trailing `/`.
    pub while_context_scope: String,
    pub loop_cond: NodeId,
}

impl LoopRegion {
    /// Every loop in `graph`, in node creation order.
    pub fn discover(graph: &Graph) -> Vec<LoopRegion> {
        graph
            .nodes()
            .filter(|(_, node)| ops::is_loop_cond_op(node))
            .map(|(id, node)| {
                let scope = match node.name.rfind('/') {
                    Some(pos) => node.name[..=pos].to_string(),
                    None => String::new(),
                };
                LoopRegion { while_context_scope: scope, loop_cond: id }
            })
            .collect()
    }
}

/// Extracts [`LoopProperties`] from the control-flow region of a loop.
///
/// Returns `None` when the region is not a regular loop (an unexpected exit
/// pattern, a variable without a `Merge`, ...).
pub trait LoopParser {
    fn parse(&self, graph: &Graph, region: &LoopRegion, rnn_scope: &str) -> Option<LoopProperties>;
}

impl<F> LoopParser for F
where
    F: Fn(&Graph, &LoopRegion, &str) -> Option<LoopProperties>,
{
    fn parse(&self, graph: &Graph, region: &LoopRegion, rnn_scope: &str) -> Option<LoopProperties> {
        self(graph, region, rnn_scope)
    }
}
