//! Tensor element types as they appear in ONNX graphs.
//!
//! The discriminants follow `TensorProto.DataType`, so a [`DType`] converts to
//! and from the integer codes stored in `Cast`'s `to` attribute without a
//! lookup table.


#[cfg(feature = "proptest")]
pub mod proptest_gen;


/// Element type of a tensor value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::Display, strum::EnumCount, strum::EnumIter, strum::FromRepr)]
#[repr(i32)]
pub enum DType {
    #[strum(serialize = "float32")]
    Float32 = 1,
    #[strum(serialize = "uint8")]
    UInt8 = 2,
    #[strum(serialize = "int8")]
    Int8 = 3,
    #[strum(serialize = "uint16")]
    UInt16 = 4,
    #[strum(serialize = "int16")]
    Int16 = 5,
    #[strum(serialize = "int32")]
    Int32 = 6,
    #[strum(serialize = "int64")]
    Int64 = 7,
    #[strum(serialize = "string")]
    String = 8,
    #[strum(serialize = "bool")]
    Bool = 9,
    #[strum(serialize = "float16")]
    Float16 = 10,
    #[strum(serialize = "float64")]
    Float64 = 11,
    #[strum(serialize = "uint32")]
    UInt32 = 12,
    #[strum(serialize = "uint64")]
    UInt64 = 13,
}

impl DType {
    /// The `TensorProto.DataType` code, as written into a `Cast` node's `to` attribute.
    pub const fn onnx_code(self) -> i32 {
        self as i32
    }

    pub fn from_onnx_code(code: i32) -> Option<Self> {
        Self::from_repr(code)
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Numeric types are the ones a `Cast` node may produce or consume.
    pub const fn is_numeric(&self) -> bool {
        self.is_int() || self.is_float() || self.is_bool()
    }
}
