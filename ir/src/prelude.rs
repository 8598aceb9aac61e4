//! Common imports for code that rewrites graphs:
//!
//! ```rust,ignore
//! use rnnfold_ir::prelude::*;
//! ```

pub use crate::builder::GraphBuilder;
pub use crate::graph::{Attributes, Graph, Node, NodeId, NodeSpec, attrs};
pub use crate::ops::{is_select_op, is_tensor_array_write_op};
pub use crate::pattern::{GraphMatcher, MatchResult, OpPattern};
pub use crate::types::{AttributeValue, ConstValue, Shape, TensorData, ValueId};

pub use rnnfold_dtype::DType;
pub use smallvec::smallvec;
