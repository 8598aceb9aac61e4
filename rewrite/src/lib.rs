//! Fuses `dynamic_rnn` style loops into ONNX unit RNN operators.
//!
//! A candidate loop is first checked without touching the graph: its
//! variables are parsed, the loop body is matched against a cell template,
//! and the cell's weights, state variables and sequence lengths are
//! resolved. Only a candidate that passes every step is rewritten into a
//! single `LSTM`/`GRU`/`RNN` node whose outputs replace the loop's.
//!
//! # Module Organization
//!
//! - [`rewriter`] - Feasibility check, rewrite and the driver over all loops
//! - [`variant`] - Extension points for concrete cells and the template registry
//! - [`loop_props`] - Parsed loop variables and the [`LoopParser`] interface
//! - [`context`] - Per-candidate state, operand roles and skip reasons
//! - [`cell`] - Cell template matching over the loop body
//! - [`state`] - State-variable resolution
//! - [`seq_len`] - Sequence-length detection and synthesis
//! - [`output`] - Reconnecting the fused node's outputs
//! - [`config`] - Rewriter settings
//! - [`error`] - Error types and result handling

pub mod cell;
pub mod config;
pub mod context;
pub mod error;
pub mod loop_props;
pub mod output;
pub mod rewriter;
pub mod seq_len;
pub mod state;
pub mod variant;


pub use config::RewriteConfig;
pub use context::{Feasibility, OnnxInput, SkipReason, UnitRnnContext};
pub use error::{Error, Result};
pub use loop_props::{LoopParser, LoopProperties, LoopRegion, LoopVariable, TensorArrayInput, TensorValueInfo};
pub use rewriter::{RewriteReport, RewriterResult, UnitRnnRewriter, get_rnn_scope_name};
pub use state::find_state_variable_with_select;
pub use variant::{PatternRegistry, RnnUnitType, StateVariableHandler, UnitRnnVariant};
