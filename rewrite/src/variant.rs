//! Extension points implemented by each concrete cell variant.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use rnnfold_ir::{Graph, MatchResult, NodeId, OpPattern, ValueId};
use strum::{Display, EnumIter};

use crate::cell;
use crate::context::UnitRnnContext;
use crate::error::Result;
use crate::loop_props::LoopVariable;

/// Source-framework cell families a template can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum RnnUnitType {
    BasicRnnCell,
    LstmCell,
    LstmBlockCell,
    GruCell,
    GruBlockCell,
    CudnnCompatibleGruCell,
}

/// Cell templates by unit type.
#[derive(Debug, Clone, Default)]
pub struct PatternRegistry {
    patterns: HashMap<RnnUnitType, OpPattern>,
}

impl PatternRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `pattern` for `unit_type`, returning the template it replaces.
    pub fn register(&mut self, unit_type: RnnUnitType, pattern: OpPattern) -> Option<OpPattern> {
        self.patterns.insert(unit_type, pattern)
    }

    pub fn with(mut self, unit_type: RnnUnitType, pattern: OpPattern) -> Self {
        self.register(unit_type, pattern);
        self
    }

    pub fn get(&self, unit_type: RnnUnitType) -> Option<&OpPattern> {
        self.patterns.get(&unit_type)
    }
}

/// Locates a state variable in the parsed loop.
pub type StateFinder = Arc<dyn Fn(&Graph, &UnitRnnContext) -> Option<LoopVariable> + Send + Sync>;

/// Wires the fused node's output for a state variable back into the graph.
pub type StateConnector = Arc<dyn Fn(&mut Graph, &UnitRnnContext) -> Result<()> + Send + Sync>;

#[derive(Clone)]
pub struct StateVariableEntry {
    pub name: String,
    pub finder: StateFinder,
    pub connector: StateConnector,
}

impl fmt::Debug for StateVariableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateVariableEntry").field("name", &self.name).finish_non_exhaustive()
    }
}

/// One way of finding the state variables of a cell: an ordered set of
/// named (finder, connector) pairs that must all resolve together.
#[derive(Debug, Clone, Default)]
pub struct StateVariableHandler {
    entries: Vec<StateVariableEntry>,
}

impl StateVariableHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F, C>(mut self, name: impl Into<String>, finder: F, connector: C) -> Self
    where
        F: Fn(&Graph, &UnitRnnContext) -> Option<LoopVariable> + Send + Sync + 'static,
        C: Fn(&mut Graph, &UnitRnnContext) -> Result<()> + Send + Sync + 'static,
    {
        self.entries.push(StateVariableEntry { name: name.into(), finder: Arc::new(finder), connector: Arc::new(connector) });
        self
    }

    pub fn entries(&self) -> &[StateVariableEntry] {
        &self.entries
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    /// Run every finder. All of them must succeed.
    pub fn resolve(&self, graph: &Graph, context: &UnitRnnContext) -> Option<BTreeMap<String, LoopVariable>> {
        let mut resolved = BTreeMap::new();
        for entry in &self.entries {
            let Some(var) = (entry.finder)(graph, context) else {
                tracing::debug!(var = %entry.name, "state variable not found");
                return None;
            };
            tracing::debug!(var = %entry.name, next_iteration_input = %var.next_iteration_input.id, "state variable found");
            resolved.insert(entry.name.clone(), var);
        }
        Some(resolved)
    }
}

/// A concrete cell family (LSTM, GRU, ...) plugged into the rewriter.
///
/// Methods called during the feasibility check receive `&Graph`; only the
/// rewrite-phase methods may mutate it.
pub trait UnitRnnVariant {
    fn unit_type(&self) -> RnnUnitType;

    /// Ordered candidates; the first that fully resolves is used.
    fn state_variable_handlers(&self) -> &[StateVariableHandler];

    /// Every match of the cell template in the loop body.
    fn find_cell(
        &self,
        graph: &Graph,
        context: &UnitRnnContext,
        registry: &PatternRegistry,
        allow_reorder: bool,
    ) -> Vec<MatchResult> {
        match registry.get(self.unit_type()) {
            Some(pattern) => cell::match_cell(graph, context, pattern, allow_reorder),
            None => {
                tracing::debug!(unit_type = %self.unit_type(), "no cell template registered");
                Vec::new()
            }
        }
    }

    /// Raw weight and bias values by role. Empty when the cell's weights
    /// cannot be resolved.
    fn get_weight_and_bias(&self, graph: &Graph, context: &UnitRnnContext) -> BTreeMap<String, ValueId>;

    /// Fill in `attributes`, `input_size` and `hidden_size`.
    fn parse_attributes(&self, _graph: &Graph, _context: &mut UnitRnnContext) -> bool {
        true
    }

    fn is_valid(&self, _graph: &Graph, _context: &UnitRnnContext) -> bool {
        true
    }

    /// Turn the raw weights into the `W`, `R`, `B` and `P` operands.
    fn process_weights_and_bias(&self, graph: &mut Graph, context: &mut UnitRnnContext) -> Result<()>;

    /// Turn the state variables' initial values into `initial_h`/`initial_c`.
    fn process_var_init_nodes(&self, graph: &mut Graph, context: &mut UnitRnnContext) -> Result<()>;

    fn create_rnn_node(&self, graph: &mut Graph, context: &UnitRnnContext) -> Result<NodeId>;
}
