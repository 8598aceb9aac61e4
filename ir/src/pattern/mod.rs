//! Structural pattern matching over graph nodes.
//!
//! An [`OpPattern`] describes a node by its op type, optionally binds it to a
//! name, and optionally constrains the producers of its inputs. A
//! [`GraphMatcher`] roots the pattern at candidate nodes and reports the
//! bindings of each successful match as a [`MatchResult`].
//!
//! ```ignore
//! // Select(GreaterEqual(*, Enter(seq_len_node)), *, *)
//! let pattern = OpPattern::new("Select|SelectV2").with_inputs(vec![
//!     OpPattern::new("GreaterEqual").with_inputs(vec![
//!         OpPattern::any(),
//!         OpPattern::new("Enter").with_inputs(vec![OpPattern::any().named("seq_len_node")]),
//!     ]),
//!     OpPattern::any(),
//!     OpPattern::any(),
//! ]);
//! let result = GraphMatcher::new(pattern).match_op(&graph, select);
//! ```

pub mod matcher;
pub mod op_pattern;

pub use matcher::{Binding, BindingStore, GraphMatcher, MatchResult};
pub use op_pattern::OpPattern;
