//! Lisa Core - compilation engine for the Lisa scripting language
//!
//! Source text is translated into a native object file through a fixed
//! pipeline: character stream → token stream → AST → LLVM IR → optimized
//! IR → target object. This crate provides every stage:
//! - Lexer: tokens on demand with one-token lookahead
//! - AST: the tagged expression tree plus prototypes and functions
//! - Parser: recursive descent with precedence climbing
//! - Codegen: SSA lowering, per-function optimization, object emission
//! - Driver: the top-level dispatch loop

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lexer module - tokenization of Lisa source code
pub mod lexer;

/// Abstract Syntax Tree - parsed representation of Lisa source code
pub mod ast;

/// Parser module - converts tokens into AST
pub mod parser;

/// Code generation module - lowers the AST to LLVM IR
pub mod codegen;

/// Driver module - dispatches top-level constructs through the pipeline
pub mod driver;

/// Convenience re-export of the lexer
pub use lexer::Lexer;

/// Convenience re-export of the parser
pub use parser::Parser;

/// Convenience re-export of the code generator
pub use codegen::Codegen;
