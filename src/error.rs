//! Error taxonomy for query compilation and execution.

use crate::parser::SyntaxError;

/// Errors raised while compiling or executing a query. All of them are
/// terminal for the current request; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The query text did not parse.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// The referenced field exists on none of the selected trackers.
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// The field was found but its kind does not support the operator.
    #[error("operator {operator} cannot be applied to field '{field}'")]
    IncompatibleOperator { field: String, operator: String },

    /// The literal cannot be interpreted as the kind the field requires.
    #[error("invalid literal {value}: expected {expected}")]
    InvalidLiteral { value: String, expected: &'static str },

    /// Every selected tracker was skipped during compilation.
    #[error("no applicable tracker for this query")]
    NoApplicableTracker,

    /// The database call exceeded the engine client's timeout.
    #[error("query execution timed out")]
    ExecutionTimeout,

    /// Any other engine failure. Details are logged, not surfaced, so
    /// storage internals never leak to the caller.
    #[error("query execution failed")]
    Execution,
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
