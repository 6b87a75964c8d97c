//! Code generation error types

use inkwell::builder::BuilderError;
use thiserror::Error;

/// Errors raised while lowering the AST to LLVM IR
///
/// A failed construct is abandoned and its partially built function removed
/// from the module; the driver reports the message and moves on.
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("Undefined identifier: {0}")]
    UndefinedIdentifier(String),

    #[error("Unknown function referenced: {0}")]
    UnknownFunction(String),

    #[error("Incorrect number of arguments passed")]
    IncorrectArgumentCount,

    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("invalid binary operator")]
    InvalidBinaryOperator,

    /// The finished function did not pass the IR verifier
    #[error("function verification failed: {0}")]
    InvalidFunction(String),

    /// The builder cursor is not positioned in any basic block
    #[error("builder has no insertion point")]
    NoInsertPoint,

    /// A call produced no value (never the case for double-returning
    /// functions)
    #[error("call did not produce a value")]
    VoidCall,

    #[error(transparent)]
    Builder(#[from] BuilderError),
}
