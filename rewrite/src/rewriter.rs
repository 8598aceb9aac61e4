//! Feasibility check, rewrite, and the driver over all candidate loops.

use bon::Builder;
use rnnfold_ir::Graph;
use snafu::OptionExt;

use crate::config::RewriteConfig;
use crate::context::{Feasibility, OnnxInput, SkipReason, UnitRnnContext};
use crate::error::{MissingStateHandlerSnafu, Result};
use crate::loop_props::{LoopParser, LoopRegion};
use crate::variant::{PatternRegistry, UnitRnnVariant};
use crate::{output, seq_len, state};

/// Rnn scope of a while-context scope: `"rnn/while/"` -> `"rnn/"`.
///
/// `None` when the loop is not nested inside a scope.
pub fn get_rnn_scope_name(while_context_scope: &str) -> Option<String> {
    let parts: Vec<&str> = while_context_scope.split('/').collect();
    if parts.len() < 3 {
        return None;
    }
    let scope = parts[..parts.len() - 2].join("/");
    (!scope.is_empty()).then(|| scope + "/")
}

/// Result of processing one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriterResult {
    Ok,
    Skip(SkipReason),
}

/// Per-candidate outcomes of [`UnitRnnRewriter::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// While-context scope and outcome, in processing order.
    pub results: Vec<(String, RewriterResult)>,
    pub removed_nodes: usize,
}

impl RewriteReport {
    pub fn rewritten(&self) -> usize {
        self.results.iter().filter(|(_, r)| *r == RewriterResult::Ok).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&str, &SkipReason)> {
        self.results.iter().filter_map(|(scope, r)| match r {
            RewriterResult::Skip(reason) => Some((scope.as_str(), reason)),
            RewriterResult::Ok => None,
        })
    }
}

/// Replaces `dynamic_rnn` style loops with one fused unit RNN node each.
///
/// ```ignore
/// let rewriter = UnitRnnRewriter::builder().variant(LstmVariant::new()).parser(TfLoopParser).registry(registry).build();
/// let regions = LoopRegion::discover(&graph);
/// let report = rewriter.run(&mut graph, &regions)?;
/// ```
#[derive(Debug, Builder)]
pub struct UnitRnnRewriter<V, P> {
    variant: V,
    parser: P,
    #[builder(default)]
    registry: PatternRegistry,
    #[builder(default)]
    config: RewriteConfig,
}

impl<V: UnitRnnVariant, P: LoopParser> UnitRnnRewriter<V, P> {
    pub fn variant(&self) -> &V {
        &self.variant
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Decide whether the candidate in `context` can be rewritten, filling in
    /// the context along the way. Never mutates the graph.
    ///
    /// Errors only when the graph contradicts itself in a way that must not be
    /// skipped silently.
    #[tracing::instrument(skip_all, fields(scope = %context.while_context_scope))]
    pub fn check(&self, graph: &Graph, context: &mut UnitRnnContext) -> Result<Feasibility> {
        let Some(rnn_scope) = get_rnn_scope_name(&context.while_context_scope) else {
            return Ok(skip(SkipReason::ScopeUnresolved));
        };
        context.rnn_scope = rnn_scope;

        let region = LoopRegion {
            while_context_scope: context.while_context_scope.clone(),
            loop_cond: match context.loop_cond {
                Some(id) => id,
                None => return Ok(skip(SkipReason::LoopParseFailed)),
            },
        };
        let Some(props) = self.parser.parse(graph, &region, &context.rnn_scope) else {
            return Ok(skip(SkipReason::LoopParseFailed));
        };
        context.loop_properties = props;

        if let Feasibility::Skip(reason) = self.parse_unit_rnn(graph, context)? {
            return Ok(skip(reason));
        }

        if !self.variant.is_valid(graph, context) {
            return Ok(skip(SkipReason::InvalidUnitRnn));
        }
        tracing::debug!(rnn_scope = %context.rnn_scope, "unit rnn found");
        Ok(Feasibility::Rewrite)
    }

    pub fn needs_rewrite(&self, graph: &Graph, context: &mut UnitRnnContext) -> Result<bool> {
        Ok(self.check(graph, context)?.is_rewrite())
    }

    fn parse_unit_rnn(&self, graph: &Graph, context: &mut UnitRnnContext) -> Result<Feasibility> {
        let mut matches = self.variant.find_cell(graph, context, &self.registry, self.config.allow_reorder);
        if matches.len() != 1 {
            return Ok(Feasibility::Skip(SkipReason::CellMatch { matches: matches.len() }));
        }
        context.cell_match = matches.pop();

        let weights = self.variant.get_weight_and_bias(graph, context);
        if weights.is_empty() {
            return Ok(Feasibility::Skip(SkipReason::EmptyWeights));
        }
        context.weights = weights;

        let Some((index, vars)) = state::resolve_state_variables(graph, context, self.variant.state_variable_handlers())
        else {
            return Ok(Feasibility::Skip(SkipReason::NoStateVariableHandler));
        };
        context.state_variables = vars;
        context.state_variable_handler = Some(index);

        context.seq_len_source = seq_len::find_sequence_length_source(graph, context)?;

        let inputs = context.loop_properties.scan_inputs_initial_values();
        let [x] = inputs[..] else {
            return Ok(Feasibility::Skip(SkipReason::ScanInputArity { found: inputs.len() }));
        };
        let x = x.clone();
        context.onnx_input_ids.insert(OnnxInput::X, x);

        if !self.variant.parse_attributes(graph, context) {
            return Ok(Feasibility::Skip(SkipReason::AttributeParseFailed));
        }
        Ok(Feasibility::Rewrite)
    }

    /// Replace the candidate with a fused node. Only valid after [`check`](Self::check)
    /// returned [`Feasibility::Rewrite`] for the same context.
    #[tracing::instrument(skip_all, fields(scope = %context.rnn_scope))]
    pub fn rewrite(&self, graph: &mut Graph, context: &mut UnitRnnContext) -> Result<()> {
        let handler = context
            .state_variable_handler
            .and_then(|i| self.variant.state_variable_handlers().get(i))
            .cloned()
            .context(MissingStateHandlerSnafu { scope: context.rnn_scope.clone() })?;

        self.variant.process_weights_and_bias(graph, context)?;
        seq_len::process_seq_length(graph, context)?;
        self.variant.process_var_init_nodes(graph, context)?;

        let rnn_node = self.variant.create_rnn_node(graph, context)?;
        context.rnn_node = Some(rnn_node);
        tracing::debug!(node = %rnn_node, inputs = ?context.positional_inputs(), "rnn node created");

        output::process_outputs(graph, context, &handler)
    }

    /// Process every region in order, each with a fresh context.
    ///
    /// Candidates that do not fit are skipped and left as loops. Once all are
    /// processed, nodes no longer reaching a graph output are removed.
    #[tracing::instrument(skip_all, fields(regions = regions.len()))]
    pub fn run(&self, graph: &mut Graph, regions: &[LoopRegion]) -> Result<RewriteReport> {
        let mut report = RewriteReport::default();
        for region in regions {
            let mut context = UnitRnnContext::new(region);
            let result = match self.check(graph, &mut context)? {
                Feasibility::Rewrite => {
                    self.rewrite(graph, &mut context)?;
                    RewriterResult::Ok
                }
                Feasibility::Skip(reason) => RewriterResult::Skip(reason),
            };
            report.results.push((region.while_context_scope.clone(), result));
        }

        if self.config.delete_unused_nodes && !graph.outputs().is_empty() {
            let outputs = graph.outputs().to_vec();
            report.removed_nodes = graph.delete_unused_nodes(&outputs);
        }
        tracing::debug!(rewritten = report.rewritten(), total = regions.len(), "unit rnn rewrite finished");
        Ok(report)
    }
}

fn skip(reason: SkipReason) -> Feasibility {
    tracing::debug!(?reason, "candidate skipped");
    Feasibility::Skip(reason)
}

