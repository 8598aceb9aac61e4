//! Value-level types shared by the graph, the builder and the evaluator.

use rnnfold_dtype::DType;
use smallvec::SmallVec;

/// Identifier of a value flowing along a graph edge (a node output or an initializer).
pub type ValueId = String;

/// Static shape of a value. Unknown dimensions are `-1`.
pub type Shape = SmallVec<[i64; 4]>;

/// Marker for a dimension whose size is only known at runtime.
pub const UNKNOWN_DIM: i64 = -1;

/// Constant scalar stored in an initializer or folded by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

/// Cast to the target width and back to the storage type (for proper truncation/extension).
macro_rules! cast_via {
    ($v:expr, $target:ty, $storage:ty) => {
        ($v as $target) as $storage
    };
}

#[inline]
fn cast_int(v: i64, to: DType) -> Option<ConstValue> {
    use DType::*;
    Some(match to {
        Bool => ConstValue::Bool(v != 0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v as u64),
        Float16 | Float32 | Float64 => ConstValue::Float(v as f64),
        String => return None,
    })
}

#[inline]
fn cast_uint(v: u64, to: DType) -> Option<ConstValue> {
    use DType::*;
    Some(match to {
        Bool => ConstValue::Bool(v != 0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v as i64),
        UInt8 => ConstValue::UInt(cast_via!(v, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v, u32, u64)),
        UInt64 => ConstValue::UInt(v),
        Float16 | Float32 | Float64 => ConstValue::Float(v as f64),
        String => return None,
    })
}

#[inline]
fn cast_float(v: f64, to: DType) -> Option<ConstValue> {
    use DType::*;
    Some(match to {
        Bool => ConstValue::Bool(v != 0.0),
        Int8 => ConstValue::Int(cast_via!(v, i8, i64)),
        Int16 => ConstValue::Int(cast_via!(v, i16, i64)),
        Int32 => ConstValue::Int(cast_via!(v, i32, i64)),
        Int64 => ConstValue::Int(v as i64),
        UInt8 => ConstValue::UInt(cast_via!(v as i64, u8, u64)),
        UInt16 => ConstValue::UInt(cast_via!(v as i64, u16, u64)),
        UInt32 => ConstValue::UInt(cast_via!(v as i64, u32, u64)),
        UInt64 => ConstValue::UInt((v as i64) as u64),
        Float16 | Float32 => ConstValue::Float(v as f32 as f64),
        Float64 => ConstValue::Float(v),
        String => return None,
    })
}

impl ConstValue {
    /// Cast this constant to `dtype` with `Cast` operator semantics.
    ///
    /// Lossy conversions are allowed: narrowing truncates, float to int
    /// truncates toward zero. Returns `None` for non-numeric targets.
    pub fn cast(&self, dtype: DType) -> Option<Self> {
        match *self {
            ConstValue::Bool(v) => cast_int(v as i64, dtype),
            ConstValue::Int(v) => cast_int(v, dtype),
            ConstValue::UInt(v) => cast_uint(v, dtype),
            ConstValue::Float(v) => cast_float(v, dtype),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            ConstValue::Int(v) => Some(v),
            ConstValue::UInt(v) => i64::try_from(v).ok(),
            ConstValue::Bool(v) => Some(v as i64),
            ConstValue::Float(_) => None,
        }
    }
}

/// Dense constant tensor, used for initializers and folded values.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    pub dtype: DType,
    pub dims: Vec<usize>,
    pub values: Vec<ConstValue>,
}

impl TensorData {
    /// 1-D int64 tensor, the form ONNX expects for axes/starts/ends inputs.
    pub fn int64s(values: &[i64]) -> Self {
        Self { dtype: DType::Int64, dims: vec![values.len()], values: values.iter().map(|&v| ConstValue::Int(v)).collect() }
    }

    pub fn scalar(dtype: DType, value: ConstValue) -> Self {
        Self { dtype, dims: vec![], values: vec![value] }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn shape(&self) -> Shape {
        self.dims.iter().map(|&d| d as i64).collect()
    }

    /// All values as `i64`, or `None` when any value is a float.
    pub fn to_i64s(&self) -> Option<Vec<i64>> {
        self.values.iter().map(ConstValue::as_i64).collect()
    }

    /// Element-wise cast, keeping dims.
    pub fn cast(&self, dtype: DType) -> Option<Self> {
        let values = self.values.iter().map(|v| v.cast(dtype)).collect::<Option<Vec<_>>>()?;
        Some(Self { dtype, dims: self.dims.clone(), values })
    }
}

/// Node attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Int(i64),
    Ints(Vec<i64>),
    Float(f32),
    Floats(Vec<f32>),
    String(String),
    Strings(Vec<String>),
    Tensor(TensorData),
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<Vec<i64>> for AttributeValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Ints(v)
    }
}

impl From<f32> for AttributeValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec<f32>> for AttributeValue {
    fn from(v: Vec<f32>) -> Self {
        Self::Floats(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<String>> for AttributeValue {
    fn from(v: Vec<String>) -> Self {
        Self::Strings(v)
    }
}

impl From<TensorData> for AttributeValue {
    fn from(v: TensorData) -> Self {
        Self::Tensor(v)
    }
}

impl From<DType> for AttributeValue {
    fn from(v: DType) -> Self {
        Self::Int(v.onnx_code() as i64)
    }
}
