//! Opset-aware helpers for operators whose encoding changed across opsets.
//!
//! `Slice` moved `starts`/`ends`/`axes` from attributes to inputs in opset 10,
//! `Squeeze` moved `axes` in opset 13. Callers describe the operation once and
//! the builder emits whichever form the graph's opset requires, along with the
//! output shape and dtype when they can be derived.

use rnnfold_dtype::DType;

use crate::error::Result;
use crate::graph::{Attributes, Graph, NodeSpec, attrs};
use crate::types::{Shape, TensorData, UNKNOWN_DIM, ValueId};

/// First opset where `Slice` takes its bounds as inputs.
pub const SLICE_INPUTS_OPSET: i64 = 10;
/// First opset where `Squeeze` takes its axes as an input.
pub const SQUEEZE_INPUTS_OPSET: i64 = 13;

pub struct GraphBuilder<'g> {
    graph: &'g mut Graph,
}

impl<'g> GraphBuilder<'g> {
    pub fn new(graph: &'g mut Graph) -> Self {
        Self { graph }
    }

    /// Slice `data` along `axes` with unit steps.
    pub fn make_slice(&mut self, data: &str, axes: &[i64], starts: &[i64], ends: &[i64]) -> Result<ValueId> {
        let shape = self.graph.get_shape(data).map(|s| slice_shape(s, axes, starts, ends));
        let dtype = self.graph.get_dtype(data);

        let (inputs, node_attrs) = if self.graph.opset() < SLICE_INPUTS_OPSET {
            let node_attrs = attrs([
                ("axes", axes.to_vec().into()),
                ("starts", starts.to_vec().into()),
                ("ends", ends.to_vec().into()),
            ]);
            (vec![data.to_string()], node_attrs)
        } else {
            let starts = self.graph.make_const("slice_starts", TensorData::int64s(starts));
            let ends = self.graph.make_const("slice_ends", TensorData::int64s(ends));
            let axes = self.graph.make_const("slice_axes", TensorData::int64s(axes));
            (vec![data.to_string(), starts, ends, axes], Attributes::new())
        };

        let spec = NodeSpec::builder()
            .op_type("Slice")
            .inputs(inputs)
            .attrs(node_attrs)
            .shapes(shape.into_iter().collect())
            .dtypes(dtype.into_iter().collect())
            .build();
        let id = self.graph.make_node(spec)?;
        Ok(self.graph[id].outputs[0].clone())
    }

    /// Remove the size-1 dimensions listed in `axes`.
    pub fn make_squeeze(&mut self, input: &str, axes: &[i64]) -> Result<ValueId> {
        let shape = self.graph.get_shape(input).map(|s| squeeze_shape(s, axes));
        let dtype = self.graph.get_dtype(input);

        let (inputs, node_attrs) = if self.graph.opset() < SQUEEZE_INPUTS_OPSET {
            (vec![input.to_string()], attrs([("axes", axes.to_vec().into())]))
        } else {
            let axes = self.graph.make_const("squeeze_axes", TensorData::int64s(axes));
            (vec![input.to_string(), axes], Attributes::new())
        };

        let spec = NodeSpec::builder()
            .op_type("Squeeze")
            .inputs(inputs)
            .attrs(node_attrs)
            .shapes(shape.into_iter().collect())
            .dtypes(dtype.into_iter().collect())
            .build();
        let id = self.graph.make_node(spec)?;
        Ok(self.graph[id].outputs[0].clone())
    }

    pub fn make_cast(&mut self, input: &str, to: DType) -> Result<ValueId> {
        let shape = self.graph.get_shape(input).cloned();
        let spec = NodeSpec::builder()
            .op_type("Cast")
            .inputs(vec![input.to_string()])
            .attrs(attrs([("to", to.into())]))
            .shapes(shape.into_iter().collect())
            .dtypes(vec![to])
            .build();
        let id = self.graph.make_node(spec)?;
        Ok(self.graph[id].outputs[0].clone())
    }

    pub fn make_shape(&mut self, input: &str) -> Result<ValueId> {
        let rank = self.graph.get_shape(input).map(|s| s.len() as i64);
        let spec = NodeSpec::builder()
            .op_type("Shape")
            .inputs(vec![input.to_string()])
            .shapes(rank.map(|r| Shape::from_slice(&[r])).into_iter().collect())
            .dtypes(vec![DType::Int64])
            .build();
        let id = self.graph.make_node(spec)?;
        Ok(self.graph[id].outputs[0].clone())
    }

    /// Repeat 1-D `input` by the counts held in `repeats`.
    pub fn make_tile(&mut self, input: &str, repeats: &str) -> Result<ValueId> {
        let rank = self.graph.get_shape(input).map(|s| s.len());
        let dtype = self.graph.get_dtype(input);
        let spec = NodeSpec::builder()
            .op_type("Tile")
            .inputs(vec![input.to_string(), repeats.to_string()])
            .shapes(rank.map(|r| Shape::from_elem(UNKNOWN_DIM, r)).into_iter().collect())
            .dtypes(dtype.into_iter().collect())
            .build();
        let id = self.graph.make_node(spec)?;
        Ok(self.graph[id].outputs[0].clone())
    }
}

fn normalize(index: i64, dim: i64) -> i64 {
    let index = if index < 0 { index + dim } else { index };
    index.clamp(0, dim)
}

/// Static output shape of a unit-step slice.
pub fn slice_shape(input: &Shape, axes: &[i64], starts: &[i64], ends: &[i64]) -> Shape {
    let rank = input.len() as i64;
    let mut out = input.clone();
    for ((&axis, &start), &end) in axes.iter().zip(starts).zip(ends) {
        let axis = if axis < 0 { axis + rank } else { axis };
        let Some(dim) = usize::try_from(axis).ok().and_then(|a| out.get_mut(a)) else { continue };
        if *dim == UNKNOWN_DIM {
            // Only non-negative bounds resolve without knowing the dim.
            if start >= 0 && end >= start && end != i64::MAX {
                *dim = end - start;
            }
            continue;
        }
        *dim = (normalize(end, *dim) - normalize(start, *dim)).max(0);
    }
    out
}

/// Static output shape of a squeeze over `axes`.
pub fn squeeze_shape(input: &Shape, axes: &[i64]) -> Shape {
    let rank = input.len() as i64;
    let axes: Vec<i64> = axes.iter().map(|&a| if a < 0 { a + rank } else { a }).collect();
    input.iter().enumerate().filter(|(i, _)| !axes.contains(&(*i as i64))).map(|(_, d)| *d).collect()
}
