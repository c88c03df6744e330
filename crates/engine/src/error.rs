//! Engine error taxonomy.
//!
//! Commit-time errors (cycle, reference, range syntax, validation) abort the
//! operation and leave prior state intact. Evaluation errors are also written
//! into the failing cell's display as a short code.

use thiserror::Error;

use crate::cell_ref::CellRef;

pub const CODE_CIRCULAR: &str = "#CIRC!";
pub const CODE_REFERENCE: &str = "#REF!";
pub const CODE_ARGUMENTS: &str = "#ARGS!";
pub const CODE_DIV_ZERO: &str = "#DIV/0!";
pub const CODE_VALUE: &str = "#VALUE!";
pub const CODE_ERROR: &str = "#ERROR!";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("circular reference detected at {cell}")]
    Cycle { cell: CellRef },

    #[error("invalid cell reference: {0}")]
    Reference(String),

    #[error("{0}")]
    Argument(String),

    #[error("division by zero")]
    DivideByZero,

    #[error("invalid value: {0}")]
    Value(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("invalid range: {0}")]
    RangeSyntax(String),

    #[error("validation failed for {cell}: {message}")]
    Validation { cell: CellRef, message: String },

    #[error("no sheet at index {0}")]
    NoSuchSheet(usize),
}

impl EngineError {
    /// Short code written into a cell's display when this error is absorbed.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Cycle { .. } => CODE_CIRCULAR,
            EngineError::Reference(_) | EngineError::RangeSyntax(_) => CODE_REFERENCE,
            EngineError::Argument(_) => CODE_ARGUMENTS,
            EngineError::DivideByZero => CODE_DIV_ZERO,
            EngineError::Value(_) => CODE_VALUE,
            EngineError::Evaluation(_)
            | EngineError::Validation { .. }
            | EngineError::NoSuchSheet(_) => CODE_ERROR,
        }
    }

    /// Whether the error aborts a commit instead of being rendered into a cell.
    pub fn is_commit_error(&self) -> bool {
        matches!(
            self,
            EngineError::Cycle { .. }
                | EngineError::Reference(_)
                | EngineError::RangeSyntax(_)
                | EngineError::Validation { .. }
        )
    }
}

/// True if `display` is one of the error codes the engine writes.
pub fn is_error_code(display: &str) -> bool {
    matches!(
        display,
        CODE_CIRCULAR | CODE_REFERENCE | CODE_ARGUMENTS | CODE_DIV_ZERO | CODE_VALUE | CODE_ERROR
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let a1 = CellRef::new(1, 1);
        assert_eq!(EngineError::Cycle { cell: a1 }.code(), "#CIRC!");
        assert_eq!(EngineError::Reference("ZZ0".into()).code(), "#REF!");
        assert_eq!(EngineError::RangeSyntax("A1:A0".into()).code(), "#REF!");
        assert_eq!(EngineError::Argument("SUM requires 1".into()).code(), "#ARGS!");
        assert_eq!(EngineError::DivideByZero.code(), "#DIV/0!");
        assert_eq!(EngineError::Value("x".into()).code(), "#VALUE!");
        assert_eq!(EngineError::Evaluation("x".into()).code(), "#ERROR!");
    }

    #[test]
    fn test_is_error_code() {
        assert!(is_error_code("#DIV/0!"));
        assert!(is_error_code("#CIRC!"));
        assert!(!is_error_code("#N/A"));
        assert!(!is_error_code("42"));
    }

    #[test]
    fn test_display_messages() {
        let err = EngineError::Cycle { cell: CellRef::new(2, 3) };
        assert_eq!(err.to_string(), "circular reference detected at C2");
        assert!(err.is_commit_error());
        assert!(!EngineError::DivideByZero.is_commit_error());
    }
}
