//! Syntax tree for the condition language.
//!
//! The parser produces a [`Condition`] tree that mirrors the source text one to one:
//! parenthesized groups are kept as [`Condition::Group`] so the compiler can reproduce
//! them, and literals keep their original spelling so numbers survive byte for byte.

use std::fmt;

use aws_sdk_dynamodb::types::AttributeValue;

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `path op literal`
    Compare {
        /// Attribute being compared.
        path: Path,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand literal.
        value: Literal,
    },
    /// `path between low and high`
    Between {
        /// Attribute being tested.
        path: Path,
        /// Lower bound (inclusive).
        low: Literal,
        /// Upper bound (inclusive).
        high: Literal,
    },
    /// `path in (a, b, ...)`
    In {
        /// Attribute being tested.
        path: Path,
        /// Candidate values, at least one.
        values: Vec<Literal>,
    },
    /// `attribute_exists(path)`, `begins_with(path, literal)`, ...
    Function {
        /// Function being called.
        name: FunctionName,
        /// First argument, always a path.
        path: Path,
        /// Second argument for the two-argument functions.
        argument: Option<Literal>,
    },
    /// `size(path) op literal`
    Size {
        /// Attribute whose size is measured.
        path: Path,
        /// Comparison operator.
        op: CompareOp,
        /// Right-hand literal.
        value: Literal,
    },
    /// `left and right`, `left or right`
    Logical {
        /// Connective.
        op: LogicalOp,
        /// Left operand.
        left: Box<Condition>,
        /// Right operand.
        right: Box<Condition>,
    },
    /// `( condition )`
    Group(Box<Condition>),
}

/// A dot-separated attribute path such as `data.property`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// Path segments in order, never empty.
    pub segments: Vec<String>,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// A literal value as written in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    /// Double-quoted text, quotes stripped.
    String(String),
    /// `true` or `false`.
    Bool(bool),
    /// A bare numeric token, kept exactly as written.
    Number(String),
}

impl Literal {
    /// Converts the literal into the value sent on the wire.
    pub fn to_attribute_value(&self) -> AttributeValue {
        match self {
            Self::String(s) => AttributeValue::S(s.clone()),
            Self::Bool(b) => AttributeValue::Bool(*b),
            Self::Number(n) => AttributeValue::N(n.clone()),
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl CompareOp {
    /// Wire spelling of the operator.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boolean connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `and`
    And,
    /// `or`
    Or,
}

impl LogicalOp {
    /// Wire spelling of the connective.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

/// Built-in functions of the condition language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionName {
    /// `attribute_exists(path)`
    AttributeExists,
    /// `attribute_not_exists(path)`
    AttributeNotExists,
    /// `attribute_type(path, type)`
    AttributeType,
    /// `begins_with(path, prefix)`
    BeginsWith,
    /// `contains(path, operand)`
    Contains,
    /// `size(path)`, only valid on the left of a comparison.
    Size,
}

impl FunctionName {
    /// Looks up a function by name, ignoring ASCII case.
    pub fn from_identifier(ident: &str) -> Option<Self> {
        let name = match ident.to_ascii_lowercase().as_str() {
            "attribute_exists" => Self::AttributeExists,
            "attribute_not_exists" => Self::AttributeNotExists,
            "attribute_type" => Self::AttributeType,
            "begins_with" => Self::BeginsWith,
            "contains" => Self::Contains,
            "size" => Self::Size,
            _ => return None,
        };
        Some(name)
    }

    /// Wire spelling of the function.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttributeExists => "attribute_exists",
            Self::AttributeNotExists => "attribute_not_exists",
            Self::AttributeType => "attribute_type",
            Self::BeginsWith => "begins_with",
            Self::Contains => "contains",
            Self::Size => "size",
        }
    }

    /// Whether the function takes a literal after the path.
    pub fn takes_argument(self) -> bool {
        matches!(
            self,
            Self::AttributeType | Self::BeginsWith | Self::Contains
        )
    }
}

impl fmt::Display for FunctionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
