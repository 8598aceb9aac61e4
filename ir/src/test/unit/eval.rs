use rnnfold_dtype::DType;
use smallvec::smallvec;
use test_case::test_case;

use crate::builder::GraphBuilder;
use crate::error::Error;
use crate::eval::Evaluator;
use crate::graph::{Graph, NodeSpec, attrs};
use crate::types::{ConstValue, TensorData};

/// Tile(Slice(Shape(x))[0:1], Slice(Shape(x))[1:2]) cast to int32.
fn lengths_graph(opset: i64) -> (Graph, String) {
    let mut g = Graph::new(opset);
    let x = g.add_input("x", smallvec![-1, -1, 16], DType::Float32);
    let mut b = GraphBuilder::new(&mut g);
    let shape = b.make_shape(&x).unwrap();
    let time = b.make_slice(&shape, &[0], &[0], &[1]).unwrap();
    let batch = b.make_slice(&shape, &[0], &[1], &[2]).unwrap();
    let tiled = b.make_tile(&time, &batch).unwrap();
    let lens = b.make_cast(&tiled, DType::Int32).unwrap();
    (g, lens)
}

#[test_case(9; "attribute_slices")]
#[test_case(13; "input_slices")]
fn test_fold_sequence_lengths(opset: i64) {
    let (g, lens) = lengths_graph(opset);
    let data = Evaluator::new(&g).with_shape("x", &[5, 3, 16]).eval(&lens).unwrap();
    assert_eq!(data.dtype, DType::Int32);
    assert_eq!(data.dims, vec![3]);
    assert_eq!(data.to_i64s(), Some(vec![5, 5, 5]));
}

#[test]
fn test_unknown_shape_does_not_fold() {
    let (g, lens) = lengths_graph(13);
    let err = Evaluator::new(&g).eval(&lens).unwrap_err();
    assert_eq!(err, Error::UnknownShape { value: "x".into() });
}

#[test]
fn test_fold_squeeze_and_const_node() {
    let mut g = Graph::new(13);
    let data = TensorData { dtype: DType::Float32, dims: vec![1, 2], values: vec![ConstValue::Float(1.0); 2] };
    let spec = NodeSpec::builder().op_type("Const").attrs(attrs([("value", data.into())])).build();
    let c = g.make_node(spec).unwrap();
    let c_out = g[c].outputs[0].clone();
    let squeezed = GraphBuilder::new(&mut g).make_squeeze(&c_out, &[0]).unwrap();

    let folded = Evaluator::new(&g).eval(&squeezed).unwrap();
    assert_eq!(folded.dims, vec![2]);
    assert_eq!(folded.dtype, DType::Float32);
}

#[test]
fn test_unsupported_operator() {
    let mut g = Graph::default();
    let spec = NodeSpec::builder().op_type("LSTM").name("rnn").build();
    let id = g.make_node(spec).unwrap();
    let value = g[id].outputs[0].clone();
    assert!(matches!(Evaluator::new(&g).eval(&value), Err(Error::UnsupportedFold { .. })));
}
