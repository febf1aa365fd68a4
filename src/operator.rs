//! Script operators and the host methods that implement them.

/// Operators a host type can overload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Unm,
    Eq,
    Lt,
    Le,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Mod,
        Operator::Unm,
        Operator::Eq,
        Operator::Lt,
        Operator::Le,
    ];

    /// Metatable event name.
    pub fn metamethod(self) -> &'static str {
        match self {
            Operator::Add => "__add",
            Operator::Sub => "__sub",
            Operator::Mul => "__mul",
            Operator::Div => "__div",
            Operator::Mod => "__mod",
            Operator::Unm => "__unm",
            Operator::Eq => "__eq",
            Operator::Lt => "__lt",
            Operator::Le => "__le",
        }
    }

    /// Name of the static host method implementing the operator.
    pub fn method_name(self) -> &'static str {
        match self {
            Operator::Add => "op_Addition",
            Operator::Sub => "op_Subtraction",
            Operator::Mul => "op_Multiply",
            Operator::Div => "op_Division",
            Operator::Mod => "op_Modulus",
            Operator::Unm => "op_UnaryNegation",
            Operator::Eq => "op_Equality",
            Operator::Lt => "op_LessThan",
            Operator::Le => "op_LessThanOrEqual",
        }
    }

    pub fn is_unary(self) -> bool {
        self == Operator::Unm
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, Operator::Eq | Operator::Lt | Operator::Le)
    }
}
