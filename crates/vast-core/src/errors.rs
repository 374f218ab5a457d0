use crate::query::Operator;
use thiserror::Error;

/// Filter expression validation failures.
///
/// Every variant is a user-input error: the compiler never returns a partial
/// query alongside one of these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Unconsumed text. Did you forget to quote your query? {consumed:?} != {input:?}")]
    UnconsumedText { consumed: String, input: String },

    #[error("Unknown operator. Did you forget to quote your query? {0:?}")]
    UnknownOperator(String),

    #[error("Value cannot be blank. Did you forget to quote your query? ({field:?}, {op:?})")]
    BlankValue { field: String, op: String },

    #[error("Field cannot be blank. Did you forget to quote your query? ({op:?}, {value:?})")]
    BlankField { op: String, value: String },

    #[error("Wildcard only makes sense with equals: {field} {op} <wildcard>")]
    WildcardOperatorMismatch { field: String, op: Operator },

    #[error("Invalid numeric value for {field}: {value:?}")]
    InvalidNumber { field: String, value: String },
}

/// Core domain errors - no I/O dependencies
#[derive(Error, Debug)]
pub enum VastError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type Result<T> = std::result::Result<T, VastError>;
