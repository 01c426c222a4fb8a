use std::fmt;

/// A field identifier as written by the user: a metadata name, a semantic
/// role or a custom field name. Which one it is gets decided per tracker
/// during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef(pub String);

impl FieldRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A node of the query expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Leaf node: a single comparison against one field
    Comparison { field: FieldRef, condition: Condition },
    /// Logical conjunction (AND)
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction (OR)
    Or(Box<Expr>, Box<Expr>),
    /// Logical negation (NOT)
    Not(Box<Expr>),
}

/// The operator-and-operand part of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Binary comparison, e.g. `= 'open'` or `>= 3`
    Compare(CompOp, Literal),
    /// Closed range check: `BETWEEN(low, high)`
    Between(Literal, Literal),
    /// Membership check: `IN(v1, v2, ...)`
    In(Vec<Literal>),
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompOp {
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=
}

/// A literal value. Date literals are lexically strings and are
/// interpreted against the field kind when the comparison is built.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
}

impl Expr {
    /// Binding strength, used by the canonical serializer to decide where
    /// parentheses are required for an unambiguous re-parse.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Or(..) => 1,
            Expr::And(..) => 2,
            Expr::Not(..) => 3,
            Expr::Comparison { .. } => 4,
        }
    }

    fn fmt_child(&self, f: &mut fmt::Formatter<'_>, parent: u8, is_right: bool) -> fmt::Result {
        // The parser is left-associative, so a right-hand child of equal
        // precedence must keep its parentheses to reproduce the same tree.
        let needs_parens =
            self.precedence() < parent || (is_right && self.precedence() == parent);
        if needs_parens {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Comparison { field, condition } => write!(f, "{} {}", field.0, condition),
            Expr::And(left, right) => {
                left.fmt_child(f, self.precedence(), false)?;
                write!(f, " AND ")?;
                right.fmt_child(f, self.precedence(), true)
            }
            Expr::Or(left, right) => {
                left.fmt_child(f, self.precedence(), false)?;
                write!(f, " OR ")?;
                right.fmt_child(f, self.precedence(), true)
            }
            Expr::Not(inner) => {
                write!(f, "NOT ")?;
                inner.fmt_child(f, self.precedence(), false)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Compare(op, value) => write!(f, "{} {}", op, value),
            Condition::Between(low, high) => write!(f, "BETWEEN({}, {})", low, high),
            Condition::In(values) => {
                write!(f, "IN(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for CompOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompOp::Eq => "=",
            CompOp::NotEq => "!=",
            CompOp::Gt => ">",
            CompOp::Lt => "<",
            CompOp::Gte => ">=",
            CompOp::Lte => "<=",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Prefer single quotes; fall back to double quotes when the
            // value itself contains one.
            Literal::String(s) => {
                if s.contains('\'') {
                    write!(f, "\"{}\"", s)
                } else {
                    write!(f, "'{}'", s)
                }
            }
            Literal::Int(n) => write!(f, "{}", n),
            // {:?} keeps the decimal point so the value re-lexes as a float
            Literal::Float(x) => write!(f, "{:?}", x),
        }
    }
}
