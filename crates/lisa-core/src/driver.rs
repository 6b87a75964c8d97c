//! Top-level compilation driver
//!
//! Peeks the token stream and dispatches each construct to the parser and
//! the code generator. A failed construct is reported to stderr and skipped
//! by advancing one token; the module keeps every successfully emitted
//! function. The pipeline is pull-based: the driver pulls a top-level
//! construct, which pulls tokens, which pull characters.

use std::path::Path;

use inkwell::context::Context;

use crate::codegen::{emit_object, Codegen, EmitError};
use crate::lexer::{Lexer, TokenKind};
use crate::parser::Parser;

/// Drive one source file through the front end into `codegen`'s module
///
/// Returns the number of top-level constructs that failed to parse or
/// lower; per-construct failures never abort the batch.
pub fn compile_source(lexer: &mut Lexer<'_>, codegen: &mut Codegen<'_>, debug: bool) -> usize {
    let mut failures = 0;
    loop {
        let handled = match lexer.peek_token().kind {
            TokenKind::Eof => break,
            TokenKind::Fn => handle_definition(lexer, codegen, debug),
            TokenKind::Extern => handle_extern(lexer, codegen, debug),
            _ => handle_top_level_expr(lexer, codegen, debug),
        };
        if !handled {
            failures += 1;
        }
    }
    failures
}

/// Compile `source` and write a native object file to `output`
///
/// The codegen session (module, builder, pass manager) lives exactly as
/// long as this one compilation.
pub fn compile_to_object(source: &str, output: &Path, debug: bool) -> Result<usize, EmitError> {
    let context = Context::create();
    let mut codegen = Codegen::new(&context);
    let mut lexer = Lexer::new(source);
    let failures = compile_source(&mut lexer, &mut codegen, debug);
    emit_object(codegen.module(), output)?;
    Ok(failures)
}

fn handle_definition(lexer: &mut Lexer<'_>, codegen: &mut Codegen<'_>, debug: bool) -> bool {
    match Parser::new(lexer).definition() {
        Ok(function) => match codegen.emit_function(&function) {
            Ok(ir) => {
                if debug {
                    eprintln!("-> Read function definition:");
                    ir.print_to_stderr();
                }
                true
            }
            Err(error) => {
                eprintln!("Code Gen Error: {error}");
                false
            }
        },
        Err(error) => {
            eprintln!("Error: {error}");
            lexer.next_token();
            false
        }
    }
}

fn handle_extern(lexer: &mut Lexer<'_>, codegen: &mut Codegen<'_>, debug: bool) -> bool {
    match Parser::new(lexer).extern_prototype() {
        Ok(proto) => {
            let ir = codegen.emit_prototype(&proto);
            if debug {
                eprintln!("-> Read extern:");
                ir.print_to_stderr();
            }
            true
        }
        Err(error) => {
            eprintln!("Error: {error}");
            lexer.next_token();
            false
        }
    }
}

fn handle_top_level_expr(lexer: &mut Lexer<'_>, codegen: &mut Codegen<'_>, debug: bool) -> bool {
    match Parser::new(lexer).top_level_expr() {
        Ok(function) => match codegen.emit_function(&function) {
            Ok(ir) => {
                if debug {
                    eprintln!("-> Read top-level expression:");
                    ir.print_to_stderr();
                }
                true
            }
            Err(error) => {
                eprintln!("Code Gen Error: {error}");
                false
            }
        },
        Err(error) => {
            eprintln!("Error: {error}");
            lexer.next_token();
            false
        }
    }
}
