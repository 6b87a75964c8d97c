//! Object-file emission through the LLVM target machine

use std::path::Path;

use inkwell::module::Module;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;
use thiserror::Error;

/// Errors raised while configuring the target or writing the object file
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("unknown target triple {triple}: {message}")]
    UnknownTarget { triple: String, message: String },

    #[error("could not create a target machine for {0}")]
    NoTargetMachine(String),

    #[error("TargetMachine can't emit a file of this type: {0}")]
    Write(String),
}

/// Write `module` as a native object file for the host target
///
/// Stamps the module with the host triple and data layout first, so the
/// emitted object matches what the linker expects.
pub fn emit_object(module: &Module<'_>, path: &Path) -> Result<(), EmitError> {
    Target::initialize_all(&InitializationConfig::default());

    let triple = TargetMachine::get_default_triple();
    let triple_name = triple.as_str().to_string_lossy().into_owned();
    let target = Target::from_triple(&triple).map_err(|e| EmitError::UnknownTarget {
        triple: triple_name.clone(),
        message: e.to_string(),
    })?;
    let machine = target
        .create_target_machine(
            &triple,
            "generic",
            "",
            OptimizationLevel::Default,
            RelocMode::Default,
            CodeModel::Default,
        )
        .ok_or(EmitError::NoTargetMachine(triple_name))?;

    module.set_triple(&triple);
    module.set_data_layout(&machine.get_target_data().get_data_layout());
    machine
        .write_to_file(module, FileType::Object, path)
        .map_err(|e| EmitError::Write(e.to_string()))
}
