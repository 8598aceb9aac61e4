//! Rewriter configuration.
//!
//! Built explicitly with the bon builder or read from environment variables.

use bon::bon;

/// Settings for [`UnitRnnRewriter`](crate::UnitRnnRewriter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteConfig {
    /// Let cell templates match commutative operands in any order.
    pub allow_reorder: bool,
    /// Drop nodes that no longer reach a graph output once all candidates are processed.
    pub delete_unused_nodes: bool,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self { allow_reorder: true, delete_unused_nodes: true }
    }
}

#[bon]
impl RewriteConfig {
    #[builder]
    pub fn builder(
        #[builder(default = true)] allow_reorder: bool,
        #[builder(default = true)] delete_unused_nodes: bool,
    ) -> Self {
        Self { allow_reorder, delete_unused_nodes }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `RNNFOLD_STRICT_CELL_ORDER` - Match cell templates with operands in declared order only
    /// * `RNNFOLD_KEEP_UNUSED` - Keep the replaced loop nodes in the graph
    pub fn from_env() -> Self {
        let allow_reorder = std::env::var("RNNFOLD_STRICT_CELL_ORDER").is_err();
        let delete_unused_nodes = std::env::var("RNNFOLD_KEEP_UNUSED").is_err();

        Self { allow_reorder, delete_unused_nodes }
    }
}
