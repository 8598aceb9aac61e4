/// Pattern describing one node and, optionally, the producers of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpPattern {
    /// Accepted op types; `None` accepts any op and also graph inputs and initializers.
    op_types: Option<Vec<String>>,
    /// Bind the matched node to this name.
    name: Option<String>,
    /// Patterns for the inputs, in order. `None` leaves the inputs unconstrained.
    inputs: Option<Vec<OpPattern>>,
}

impl OpPattern {
    /// Pattern from an op-type expression: `"*"` or alternatives such as `"Select|SelectV2"`.
    pub fn new(op_type: &str) -> Self {
        if op_type == "*" {
            return Self::any();
        }
        Self { op_types: Some(op_type.split('|').map(str::to_string).collect()), name: None, inputs: None }
    }

    /// Wildcard pattern.
    pub fn any() -> Self {
        Self { op_types: None, name: None, inputs: None }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<OpPattern>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn inputs(&self) -> Option<&[OpPattern]> {
        self.inputs.as_deref()
    }

    pub fn is_wildcard(&self) -> bool {
        self.op_types.is_none()
    }

    pub fn accepts(&self, op_type: &str) -> bool {
        self.op_types.as_ref().is_none_or(|types| types.iter().any(|t| t == op_type))
    }

    /// Number of pattern nodes in this tree, used to bound matcher work in logs.
    pub fn size(&self) -> usize {
        1 + self.inputs.iter().flatten().map(OpPattern::size).sum::<usize>()
    }
}
