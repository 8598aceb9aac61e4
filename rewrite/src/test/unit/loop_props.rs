use test_case::test_case;

use crate::loop_props::{LoopProperties, LoopRegion, LoopVariable, TensorValueInfo};
use crate::rewriter::get_rnn_scope_name;
use crate::test::helpers::RnnLoopFixture;

fn info(id: &str) -> TensorValueInfo {
    TensorValueInfo { id: id.into(), shape: None, dtype: None }
}

fn var(next: &str, identity: &str, tensor_array: bool) -> LoopVariable {
    LoopVariable {
        enter_name: format!("Enter_{next}"),
        enter_input_id: format!("init_{next}"),
        next_iteration_input: info(next),
        switch_true_identity_output: info(identity),
        exit_output: Some(info(&format!("exit_{next}"))),
        is_tensor_array: tensor_array,
        ta_index_id: None,
    }
}

#[test]
fn test_tensor_arrays_become_scan_variables() {
    let mut props = LoopProperties::default();
    props.add_variable(var("c", "c_prev", false));
    props.add_variable(var("write", "flow", true));
    props.add_variable(var("h", "h_prev", false));

    let ids = |infos: Vec<&TensorValueInfo>| infos.into_iter().map(|i| i.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(props.state_inputs()), ["c_prev", "h_prev"]);
    assert_eq!(ids(props.state_outputs()), ["c", "h"]);
    assert_eq!(ids(props.scan_outputs()), ["write"]);
    assert_eq!(ids(props.scan_outputs_exits()), ["exit_write"]);
    assert_eq!(props.state_inputs_initial_values(), ["init_c", "init_h"]);
    assert_eq!(props.all_variables().count(), 3);
}

#[test]
fn test_same_next_iteration_input_replaces() {
    let mut props = LoopProperties::default();
    props.add_variable(var("h", "h_prev", false));
    props.add_variable(var("h", "h_other", false));
    assert_eq!(props.state_variables().len(), 1);
    assert_eq!(props.state_variables()[0].switch_true_identity_output.id, "h_other");
}

#[test]
fn test_get_variables_filters_all_kinds() {
    let mut props = LoopProperties::default();
    props.add_variable(var("h", "h_prev", false));
    props.add_variable(var("write", "flow", true));

    assert_eq!(props.get_variables(|v| v.exit_output.is_some()).len(), 2);
    let arrays = props.get_variables(|v| v.is_tensor_array);
    assert_eq!(arrays.len(), 1);
    assert_eq!(arrays[0].next_iteration_input.id, "write");
}

#[test]
fn test_fixture_scan_input_lists() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let props = &fixture.props;
    assert_eq!(props.scan_inputs_initial_values(), ["inputs"]);
    assert_eq!(props.scan_inputs()[0].id, "rnn/while/TensorArrayReadV3:0");
    assert_eq!(props.scan_inputs()[0].shape.as_deref(), Some(&[3, 4][..]));
}

#[test]
fn test_discover_finds_loop_cond_scope() {
    let fixture = RnnLoopFixture::builder().build().build_loop();
    let regions = LoopRegion::discover(&fixture.graph);
    assert_eq!(regions.len(), 1);
    assert_eq!(regions[0].while_context_scope, "rnn/while/");
    assert_eq!(fixture.graph[regions[0].loop_cond].op_type, "LoopCond");
}

#[test_case("rnn/while/", Some("rnn/"); "single_layer")]
#[test_case("encoder/rnn/while/", Some("encoder/rnn/"); "nested")]
#[test_case("while/", None; "top_level_loop")]
#[test_case("", None; "empty")]
fn test_rnn_scope_name(while_scope: &str, expected: Option<&str>) {
    assert_eq!(get_rnn_scope_name(while_scope).as_deref(), expected);
}
