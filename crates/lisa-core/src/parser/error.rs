//! Parser error types for the Lisa compiler

use crate::lexer::{Location, Token};
use thiserror::Error;

/// A parse diagnostic carrying the offending lexeme and source position
///
/// Renders as `"<lexeme>": <message> (line L, column C)`, the single-line
/// form every front-end diagnostic uses.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The kind of error
    pub kind: ParseErrorKind,
    /// Lexeme of the token that triggered the error
    pub lexeme: String,
    /// Source location of that token
    pub loc: Location,
}

impl ParseError {
    /// Create a new parse error at the given token
    #[must_use]
    pub fn new(kind: ParseErrorKind, token: &Token) -> Self {
        Self {
            kind,
            lexeme: token.lexeme.clone(),
            loc: token.loc,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "\"{}\": {} (line {}, column {})",
            self.lexeme, self.kind, self.loc.line, self.loc.column
        )
    }
}

impl std::error::Error for ParseError {}

/// The kind of parse error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The lexer produced an error token; the lexeme names the failure
    #[error("token error")]
    BadToken,

    #[error("Illegal token when expecting an expression")]
    ExpectedExpression,

    #[error("invalid number literal")]
    InvalidNumber,

    /// A specific symbol was required
    #[error("Expected '{0}'")]
    ExpectedSymbol(&'static str),

    /// A specific token was required inside a named construct
    #[error("Expected '{expected}' in {context}")]
    ExpectedIn {
        expected: &'static str,
        context: &'static str,
    },

    #[error("Expected function name in prototype")]
    ExpectedFunctionName,

    #[error("Expected identifier in argument list")]
    ExpectedParamName,

    #[error("Expected ',' between arguments")]
    ExpectedParamSeparator,

    #[error("Expected ')' or ',' in argument list")]
    ExpectedArgSeparator,

    #[error("Expected expression in {0}")]
    ExpectedBody(&'static str),

    #[error("Expected loop variable after 'for'")]
    ExpectedLoopVariable,
}
