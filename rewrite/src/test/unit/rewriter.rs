use rnnfold_ir::{DType, Evaluator, Graph};
use test_case::test_case;

use crate::config::RewriteConfig;
use crate::context::{Feasibility, OnnxInput, SkipReason, UnitRnnContext};
use crate::error::Error;
use crate::loop_props::LoopRegion;
use crate::rewriter::{RewriterResult, UnitRnnRewriter};
use crate::test::helpers::{
    BasicRnnVariant, FixtureParser, Masking, RnnLoop, RnnLoopFixture, h_handler, hc_handler, nodes_of, reaches,
    registry, single,
};
use crate::variant::{PatternRegistry, UnitRnnVariant};

type Rewriter = UnitRnnRewriter<BasicRnnVariant, FixtureParser>;

fn rewriter_for(fixture: &RnnLoop, variant: BasicRnnVariant) -> Rewriter {
    UnitRnnRewriter::builder().variant(variant).parser(FixtureParser(Some(fixture.props.clone()))).registry(registry()).build()
}

fn check(rewriter: &Rewriter, fixture: &RnnLoop) -> (Feasibility, UnitRnnContext) {
    let mut context = UnitRnnContext::new(&fixture.region);
    let feasibility = rewriter.check(&fixture.graph, &mut context).unwrap();
    (feasibility, context)
}

fn skip_reason(fixture: RnnLoopFixture, variant: BasicRnnVariant) -> SkipReason {
    let fixture = fixture.build_loop();
    match check(&rewriter_for(&fixture, variant), &fixture).0 {
        Feasibility::Skip(reason) => reason,
        Feasibility::Rewrite => panic!("candidate unexpectedly feasible"),
    }
}

// ============================================================================
// Feasibility
// ============================================================================

#[test]
fn test_check_populates_context() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let (feasibility, context) = check(&rewriter, &fixture);

    assert_eq!(feasibility, Feasibility::Rewrite);
    assert_eq!(context.rnn_scope, "rnn/");
    assert!(context.cell_match.is_some());
    assert_eq!(context.weights.keys().collect::<Vec<_>>(), ["bias", "kernel"]);
    assert_eq!(context.state_variables.keys().collect::<Vec<_>>(), ["h"]);
    assert_eq!(context.state_variable_handler, Some(0));
    assert_eq!(context.seq_len_source, None);
    assert_eq!(context.onnx_input(OnnxInput::X), Some(&fixture.x));
    assert_eq!(context.hidden_size, Some(2));
    assert_eq!(context.input_size, Some(4));
}

#[test]
fn test_check_does_not_mutate() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let before = fixture.graph.len();
    let mut context = UnitRnnContext::new(&fixture.region);
    assert!(rewriter.needs_rewrite(&fixture.graph, &mut context).unwrap());
    assert_eq!(fixture.graph.len(), before);
}

#[test]
fn test_second_handler_selected_alone() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let variant = BasicRnnVariant::with_handlers(vec![hc_handler(), h_handler()]);
    let rewriter = rewriter_for(&fixture, variant);
    let (feasibility, context) = check(&rewriter, &fixture);

    assert_eq!(feasibility, Feasibility::Rewrite);
    assert_eq!(context.state_variable_handler, Some(1));
    assert_eq!(context.state_variables.keys().collect::<Vec<_>>(), ["h"]);
    let selected: Vec<_> = rewriter.variant().state_variable_handlers()[1].names().collect();
    assert_eq!(selected, ["h"]);
}

#[test]
fn test_ambiguous_cell_leaves_match_unset() {
    let fixture = RnnLoopFixture::builder().duplicate_cell(true).build().build_loop();
    let (feasibility, context) = check(&rewriter_for(&fixture, BasicRnnVariant::default()), &fixture);
    assert_eq!(feasibility, Feasibility::Skip(SkipReason::CellMatch { matches: 2 }));
    assert!(context.cell_match.is_none());
}

#[test]
fn test_missing_template_matches_nothing() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let rewriter = UnitRnnRewriter::builder()
        .variant(BasicRnnVariant::default())
        .parser(FixtureParser(Some(fixture.props.clone())))
        .registry(PatternRegistry::new())
        .build();
    let (feasibility, context) = check(&rewriter, &fixture);
    assert_eq!(feasibility, Feasibility::Skip(SkipReason::CellMatch { matches: 0 }));
    assert!(context.cell_match.is_none());
}

#[test_case(RnnLoopFixture::builder().second_scan_input(true).build(), BasicRnnVariant::default(), SkipReason::ScanInputArity { found: 2 }; "two_scan_inputs")]
#[test_case(RnnLoopFixture::builder().kernel_as_input(true).build(), BasicRnnVariant::default(), SkipReason::EmptyWeights; "kernel_not_constant")]
#[test_case(RnnLoopFixture::builder().build(), BasicRnnVariant::with_handlers(vec![hc_handler()]), SkipReason::NoStateVariableHandler; "no_handler_resolves")]
#[test_case(RnnLoopFixture::builder().build(), BasicRnnVariant { reject_attributes: true, ..Default::default() }, SkipReason::AttributeParseFailed; "attributes_rejected")]
#[test_case(RnnLoopFixture::builder().build(), BasicRnnVariant { invalid: true, ..Default::default() }, SkipReason::InvalidUnitRnn; "variant_invalid")]
fn test_skip_reasons(fixture: RnnLoopFixture, variant: BasicRnnVariant, expected: SkipReason) {
    assert_eq!(skip_reason(fixture, variant), expected);
}

#[test]
fn test_top_level_loop_has_no_scope() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let region = LoopRegion { while_context_scope: "while/".into(), ..fixture.region.clone() };
    let mut context = UnitRnnContext::new(&region);
    assert_eq!(rewriter.check(&fixture.graph, &mut context), Ok(Feasibility::Skip(SkipReason::ScopeUnresolved)));
}

#[test]
fn test_parser_rejection() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let rewriter = UnitRnnRewriter::builder()
        .variant(BasicRnnVariant::default())
        .parser(FixtureParser(None))
        .registry(registry())
        .build();
    let (feasibility, _) = check(&rewriter, &fixture);
    assert_eq!(feasibility, Feasibility::Skip(SkipReason::LoopParseFailed));
}

#[test]
fn test_closure_parser() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let props = fixture.props.clone();
    let rewriter = UnitRnnRewriter::builder()
        .variant(BasicRnnVariant::default())
        .parser(move |_: &Graph, region: &LoopRegion, scope: &str| {
            (region.while_context_scope == "rnn/while/" && scope == "rnn/").then(|| props.clone())
        })
        .registry(registry())
        .build();
    let mut context = UnitRnnContext::new(&fixture.region);
    assert_eq!(rewriter.needs_rewrite(&fixture.graph, &mut context), Ok(true));
}

#[test]
fn test_unrecognized_mask_aborts() {
    let fixture = RnnLoopFixture::builder().masking(Masking::Unrecognized).build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let mut context = UnitRnnContext::new(&fixture.region);
    assert_eq!(
        rewriter.check(&fixture.graph, &mut context),
        Err(Error::SequenceLengthPattern { node: "rnn/while/Select_1".into() })
    );
}

// ============================================================================
// Rewrite
// ============================================================================

#[test_case(13, 1; "opset_13")]
#[test_case(9, 3; "opset_9")]
fn test_end_to_end_unmasked(opset: i64, casts: usize) {
    let RnnLoop { mut graph, region, props, x, exit_h, gather } =
        RnnLoopFixture::builder().opset(opset).build().build_loop();
    let rewriter = UnitRnnRewriter::builder()
        .variant(BasicRnnVariant::default())
        .parser(FixtureParser(Some(props)))
        .registry(registry())
        .build();

    let report = rewriter.run(&mut graph, std::slice::from_ref(&region)).unwrap();

    assert_eq!(report.results, [("rnn/while/".to_string(), RewriterResult::Ok)]);
    assert_eq!(report.rewritten(), 1);
    assert!(report.removed_nodes > 0);

    let rnn = single(&graph, "RNN");
    let inputs = graph[rnn].inputs.clone();
    assert_eq!(inputs.len(), 6);
    assert_eq!(inputs[0], x);

    // Synthesized lengths: Shape, two Slices, Tile and the casts.
    assert_eq!(nodes_of(&graph, "Shape").len(), 1);
    assert_eq!(nodes_of(&graph, "Slice").len(), 2);
    assert_eq!(nodes_of(&graph, "Tile").len(), 1);
    assert_eq!(nodes_of(&graph, "Cast").len(), casts);
    let lens = Evaluator::new(&graph).with_shape(&x, &[6, 3, 4]).eval(&inputs[4]).unwrap();
    assert_eq!(lens.dtype, DType::Int32);
    assert_eq!(lens.to_i64s(), Some(vec![6, 6, 6]));

    // Both outputs now come from the fused node.
    let outputs = graph.outputs().to_vec();
    assert_eq!(nodes_of(&graph, "Squeeze").len(), 2);
    for out in &outputs {
        assert!(reaches(&graph, out, "RNN"));
        assert!(!reaches(&graph, out, "Exit"));
    }
    let y = graph.find_node_by_name("outputs").unwrap();
    assert_eq!(graph.get_shape(&graph[y].inputs[0]).map(|s| s.to_vec()), Some(vec![-1, 3, 2]));

    for gone in [&exit_h, &gather] {
        assert!(graph.find_output_consumers(gone).is_empty());
        assert!(graph.get_node_by_output(gone).is_none());
    }
    for op_type in ["Enter", "Merge", "Switch", "Exit", "LoopCond", "NextIteration", "TensorArrayGatherV3"] {
        assert!(nodes_of(&graph, op_type).is_empty(), "{op_type} left behind");
    }
}

#[test_case(DType::Int32, false; "int32_lengths")]
#[test_case(DType::Int64, true; "int64_lengths")]
fn test_end_to_end_masked(dtype: DType, cast: bool) {
    let fixture = RnnLoopFixture::builder().masking(Masking::SequenceLength(dtype)).build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let RnnLoop { mut graph, region, .. } = fixture;

    let report = rewriter.run(&mut graph, &[region]).unwrap();
    assert_eq!(report.rewritten(), 1);

    let rnn = single(&graph, "RNN");
    let lens = graph[rnn].inputs[4].clone();
    assert_eq!(lens == "sequence_length", !cast);
    assert_eq!(nodes_of(&graph, "Cast").len(), usize::from(cast));
    assert!(nodes_of(&graph, "Shape").is_empty());
    assert!(nodes_of(&graph, "Select").is_empty());
}

#[test]
fn test_unused_sequence_output() {
    let fixture = RnnLoopFixture::builder().output_used(false).build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let RnnLoop { mut graph, region, .. } = fixture;

    rewriter.run(&mut graph, &[region]).unwrap();

    // Only Y_h is squeezed.
    let squeeze = single(&graph, "Squeeze");
    assert_eq!(graph[squeeze].inputs[0], format!("{}:1", graph[single(&graph, "RNN")].name));
}

#[test]
fn test_skipped_candidate_is_untouched() {
    let fixture = RnnLoopFixture::builder().second_scan_input(true).build().build_loop();
    let rewriter = UnitRnnRewriter::builder()
        .variant(BasicRnnVariant::default())
        .parser(FixtureParser(Some(fixture.props.clone())))
        .registry(registry())
        .config(RewriteConfig::builder().delete_unused_nodes(false).build())
        .build();
    let RnnLoop { mut graph, region, .. } = fixture;
    let before = graph.clone();

    let report = rewriter.run(&mut graph, &[region]).unwrap();

    assert_eq!(report.skipped().collect::<Vec<_>>(), [("rnn/while/", &SkipReason::ScanInputArity { found: 2 })]);
    assert!(nodes_of(&graph, "RNN").is_empty());
    assert_eq!(graph.node_ids(), before.node_ids());
}

#[test]
fn test_keep_unused_nodes() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let rewriter = UnitRnnRewriter::builder()
        .variant(BasicRnnVariant::default())
        .parser(FixtureParser(Some(fixture.props.clone())))
        .registry(registry())
        .config(RewriteConfig::builder().delete_unused_nodes(false).build())
        .build();
    let RnnLoop { mut graph, region, .. } = fixture;

    let report = rewriter.run(&mut graph, &[region]).unwrap();
    assert_eq!(report.removed_nodes, 0);
    assert_eq!(nodes_of(&graph, "LoopCond").len(), 1);
    assert_eq!(nodes_of(&graph, "RNN").len(), 1);
}

#[test]
fn test_rewrite_without_selected_handler_fails_before_mutation() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let (feasibility, mut context) = check(&rewriter, &fixture);
    assert_eq!(feasibility, Feasibility::Rewrite);
    context.state_variable_handler = None;

    let RnnLoop { mut graph, .. } = fixture;
    let before = graph.len();
    assert_eq!(
        rewriter.rewrite(&mut graph, &mut context),
        Err(Error::MissingStateHandler { scope: "rnn/".into() })
    );
    assert_eq!(graph.len(), before);
    assert!(nodes_of(&graph, "RNN").is_empty());
}

#[test]
fn test_run_stops_on_contradiction() {
    let fixture = RnnLoopFixture::builder().masking(Masking::Unrecognized).build().build_loop();
    let rewriter = rewriter_for(&fixture, BasicRnnVariant::default());
    let RnnLoop { mut graph, region, .. } = fixture;
    assert!(matches!(rewriter.run(&mut graph, &[region]), Err(Error::SequenceLengthPattern { .. })));
}
