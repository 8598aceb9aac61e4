//! Graph representation for the rnnfold rewriter.
//!
//! This crate holds the mutable dataflow graph that rewrites operate on and
//! the primitives they build from.
//!
//! # Module Organization
//!
//! - [`graph`] - Nodes, values, shape/dtype bookkeeping and rewiring
//! - [`builder`] - Opset-aware construction of `Slice`, `Squeeze` and friends
//! - [`pattern`] - Op-type patterns and the [`GraphMatcher`]
//! - [`eval`] - Constant folding for shape-manipulation subgraphs
//! - [`ops`] - Op-type predicates
//! - [`types`] - Values, constants, attributes
//! - [`error`] - Error types and result handling

pub mod builder;
pub mod error;
pub mod eval;
pub mod graph;
pub mod ops;
pub mod pattern;
pub mod prelude;
pub mod types;

#[cfg(test)]
pub mod test;

pub use builder::GraphBuilder;
pub use error::{Error, Result};
pub use eval::Evaluator;
pub use graph::{Attributes, Graph, Node, NodeId, NodeSpec, attrs};
pub use pattern::{GraphMatcher, MatchResult, OpPattern};
pub use types::{AttributeValue, ConstValue, Shape, TensorData, UNKNOWN_DIM, ValueId};

pub use rnnfold_dtype::DType;
