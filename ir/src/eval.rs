//! Constant folding for shape-manipulation subgraphs.
//!
//! Folds a value by walking its producers. `Shape` only needs the static
//! shape of its operand, so a value derived from a runtime tensor's shape
//! (such as a synthesized `sequence_lens`) folds as soon as that shape is
//! known, either from the graph or from an override given to the evaluator.
//!
//! Supported: initializers, `Const`, `Identity`, `Shape`, `Cast`, `Slice`
//! (attribute and input forms, 1-D data), `Tile` (1-D) and `Squeeze`.

use std::collections::HashMap;

use rnnfold_dtype::DType;
use snafu::{OptionExt, ensure};

use crate::error::{MissingAttributeSnafu, Result, UnknownShapeSnafu, UnknownValueSnafu, UnsupportedFoldSnafu};
use crate::graph::{Graph, Node};
use crate::types::{AttributeValue, ConstValue, Shape, TensorData, UNKNOWN_DIM, ValueId};

pub struct Evaluator<'g> {
    graph: &'g Graph,
    shapes: HashMap<ValueId, Shape>,
    cache: HashMap<ValueId, TensorData>,
}

impl<'g> Evaluator<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph, shapes: HashMap::new(), cache: HashMap::new() }
    }

    /// Use `shape` for `value` instead of what the graph records.
    pub fn with_shape(mut self, value: impl Into<ValueId>, shape: &[i64]) -> Self {
        self.shapes.insert(value.into(), Shape::from_slice(shape));
        self
    }

    pub fn eval(&mut self, value: &str) -> Result<TensorData> {
        if let Some(data) = self.cache.get(value) {
            return Ok(data.clone());
        }
        let data = match self.graph.initializer(value) {
            Some(data) => data.clone(),
            None => {
                let graph = self.graph;
                let id = graph.get_node_by_output(value).context(UnknownValueSnafu { value })?;
                let node = graph.try_node(id)?;
                self.eval_node(node)?
            }
        };
        self.cache.insert(value.to_string(), data.clone());
        Ok(data)
    }

    fn static_shape(&self, value: &str) -> Result<Vec<i64>> {
        let shape = self.shapes.get(value).or_else(|| self.graph.get_shape(value)).context(UnknownShapeSnafu { value })?;
        ensure!(shape.iter().all(|&d| d != UNKNOWN_DIM), UnknownShapeSnafu { value });
        Ok(shape.to_vec())
    }

    fn input<'n>(&self, node: &'n Node, index: usize) -> Result<&'n str> {
        node.inputs.get(index).map(String::as_str).context(UnsupportedFoldSnafu {
            op_type: node.op_type.clone(),
            node: node.name.clone(),
            reason: "missing input",
        })
    }

    fn eval_node(&mut self, node: &Node) -> Result<TensorData> {
        let unsupported = |reason: &'static str| {
            UnsupportedFoldSnafu { op_type: node.op_type.clone(), node: node.name.clone(), reason }.fail()
        };

        match node.op_type.as_str() {
            "Const" => match node.attr("value") {
                Some(AttributeValue::Tensor(data)) => Ok(data.clone()),
                _ => MissingAttributeSnafu { node: node.name.clone(), attr: "value" }.fail(),
            },
            "Identity" => self.eval(self.input(node, 0)?),
            "Shape" => {
                let dims = self.static_shape(self.input(node, 0)?)?;
                Ok(TensorData::int64s(&dims))
            }
            "Cast" => {
                let to = node
                    .attr_int("to")
                    .and_then(|c| DType::from_onnx_code(c as i32))
                    .context(MissingAttributeSnafu { node: node.name.clone(), attr: "to" })?;
                let data = self.eval(self.input(node, 0)?)?;
                match data.cast(to) {
                    Some(cast) => Ok(cast),
                    None => unsupported("non-numeric cast"),
                }
            }
            "Slice" => {
                let data = self.eval(self.input(node, 0)?)?;
                let (starts, ends, axes) = if node.inputs.len() >= 3 {
                    let starts = self.eval_ints(self.input(node, 1)?)?;
                    let ends = self.eval_ints(self.input(node, 2)?)?;
                    let axes = match node.inputs.get(3) {
                        Some(axes) => self.eval_ints(axes)?,
                        None => vec![0],
                    };
                    (starts, ends, axes)
                } else {
                    let get = |attr: &'static str| {
                        node.attr_ints(attr).map(<[i64]>::to_vec).context(MissingAttributeSnafu { node: node.name.clone(), attr })
                    };
                    (get("starts")?, get("ends")?, get("axes").unwrap_or_else(|_| vec![0]))
                };
                if data.dims.len() != 1 || axes != [0] || starts.len() != 1 || ends.len() != 1 {
                    return unsupported("only 1-D slices fold");
                }
                let len = data.len() as i64;
                let clamp = |i: i64| (if i < 0 { i + len } else { i }).clamp(0, len) as usize;
                let (start, end) = (clamp(starts[0]), clamp(ends[0]));
                let values = if start < end { data.values[start..end].to_vec() } else { vec![] };
                Ok(TensorData { dtype: data.dtype, dims: vec![values.len()], values })
            }
            "Tile" => {
                let data = self.eval(self.input(node, 0)?)?;
                let repeats = self.eval_ints(self.input(node, 1)?)?;
                if data.dims.len() != 1 || repeats.len() != 1 || repeats[0] < 0 {
                    return unsupported("only 1-D tiles fold");
                }
                let values: Vec<ConstValue> =
                    std::iter::repeat_n(data.values.iter().copied(), repeats[0] as usize).flatten().collect();
                Ok(TensorData { dtype: data.dtype, dims: vec![values.len()], values })
            }
            "Squeeze" => {
                let data = self.eval(self.input(node, 0)?)?;
                let axes = match node.inputs.get(1) {
                    Some(axes) => Some(self.eval_ints(axes)?),
                    None => node.attr_ints("axes").map(<[i64]>::to_vec),
                };
                let rank = data.dims.len() as i64;
                let dims = data
                    .dims
                    .iter()
                    .enumerate()
                    .filter(|&(i, &d)| match &axes {
                        Some(axes) => !axes.iter().any(|&a| (if a < 0 { a + rank } else { a }) == i as i64),
                        None => d != 1,
                    })
                    .map(|(_, &d)| d)
                    .collect();
                Ok(TensorData { dims, ..data })
            }
            _ => unsupported("operator not supported"),
        }
    }

    fn eval_ints(&mut self, value: &str) -> Result<Vec<i64>> {
        let data = self.eval(value)?;
        data.to_i64s().context(UnsupportedFoldSnafu {
            op_type: "<index operand>".to_string(),
            node: value.to_string(),
            reason: "expected integer values",
        })
    }
}
