//! Lisa CLI - compile Lisa source files to native object files
//!
//! `lisa [-d] [-h] [-v] <input_file>` writes the object next to the input,
//! with the last extension replaced by `.o`.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "lisa")]
#[command(about = "The Lisa compiler", long_about = None)]
struct Cli {
    /// Print generated IR to stderr
    #[arg(short = 'd')]
    debug: bool,

    /// Display version information
    #[arg(short = 'v', long = "version")]
    version: bool,

    /// Lisa source file
    input: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("Lisa Compiler v{}", lisa_core::VERSION);
        return Ok(());
    }

    let Some(input) = cli.input else {
        eprintln!("Missing input file");
        process::exit(1);
    };

    let source = std::fs::read_to_string(&input)
        .with_context(|| format!("could not read {}", input.display()))?;
    let output = input.with_extension("o");

    lisa_core::driver::compile_to_object(&source, &output, cli.debug)
        .with_context(|| format!("could not write {}", output.display()))?;

    Ok(())
}
