//! Errors raised compiling and executing SAE programs.

use thiserror::Error;

/// Errors from the SAE compiler and VM.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SaeError {
    /// Compilation failed on a specific token.
    #[error("compile error at position {position}: {token}")]
    Compile {
        /// The offending token.
        token: String,
        /// Its position (token index) in the program.
        position: usize,
    },

    /// An operator tried to pop more values than were on the stack.
    #[error("stack underflow")]
    StackUnderflow,

    /// An operator received a value it cannot operate on.
    #[error("invalid type for operator {operator}: {message}")]
    InvalidTypeForOperator {
        /// The operator that failed.
        operator: String,
        /// Why the operand was rejected.
        message: String,
    },
}

impl From<splot_core::CoreError> for SaeError {
    fn from(e: splot_core::CoreError) -> Self {
        SaeError::InvalidTypeForOperator {
            operator: "coerce".to_owned(),
            message: e.to_string(),
        }
    }
}
