//! Lowering from the Lisa AST to LLVM IR
//!
//! The code generator walks each top-level construct and emits SSA into a
//! module owned by the session: every mutable local gets a stack slot in the
//! entry block of its function, `if` merges through a phi node, loops chain
//! header/body/after blocks, and each finished function is verified and run
//! through the per-function optimization pipeline (instruction combining,
//! reassociation, GVN, CFG simplification).
//!
//! All user values are `double`; comparisons produce `1.0` or `0.0`.

mod error;
mod object;

pub use error::CodegenError;
pub use object::{emit_object, EmitError};

use std::collections::HashMap;

use inkwell::basic_block::BasicBlock;
use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::passes::PassManager;
use inkwell::types::BasicMetadataTypeEnum;
use inkwell::values::{BasicMetadataValueEnum, FloatValue, FunctionValue, PointerValue};
use inkwell::FloatPredicate;

use crate::ast::{Expr, Function, Prototype};

/// Result type for lowering operations
pub type CodegenResult<T> = Result<T, CodegenError>;

/// One compilation session: module, builder cursor, pass manager, and the
/// per-function symbol table of stack slots
pub struct Codegen<'ctx> {
    context: &'ctx Context,
    builder: Builder<'ctx>,
    module: Module<'ctx>,
    fpm: PassManager<FunctionValue<'ctx>>,
    /// Variable name -> entry-block alloca; cleared on function entry,
    /// at most one live slot per name
    variables: HashMap<String, PointerValue<'ctx>>,
}

impl<'ctx> Codegen<'ctx> {
    /// Create a session with the optimization pipeline initialized
    #[must_use]
    pub fn new(context: &'ctx Context) -> Self {
        let module = context.create_module("lisa");
        let builder = context.create_builder();

        let fpm = PassManager::create(&module);
        fpm.add_instruction_combining_pass();
        fpm.add_reassociate_pass();
        fpm.add_gvn_pass();
        fpm.add_cfg_simplification_pass();
        fpm.initialize();

        Self {
            context,
            builder,
            module,
            fpm,
            variables: HashMap::new(),
        }
    }

    /// The module accumulated so far
    #[must_use]
    pub fn module(&self) -> &Module<'ctx> {
        &self.module
    }

    /// Declare a function with external linkage: `double` return, one
    /// `double` per parameter, argument names taken from the prototype
    pub fn emit_prototype(&self, proto: &Prototype) -> FunctionValue<'ctx> {
        let f64_type = self.context.f64_type();
        let params: Vec<BasicMetadataTypeEnum<'ctx>> =
            vec![f64_type.into(); proto.params.len()];
        let fn_type = f64_type.fn_type(&params, false);
        let function = self
            .module
            .add_function(&proto.name, fn_type, Some(Linkage::External));
        for (param, name) in function.get_param_iter().zip(&proto.params) {
            param.into_float_value().set_name(name);
        }
        function
    }

    /// Emit a function definition
    ///
    /// Looks up an existing declaration (an `extern` may have come first) or
    /// creates one, builds the entry block with one stack slot per
    /// parameter, emits the body, returns the last expression's value, then
    /// verifies and optimizes. On any failure the partially built function
    /// is removed from the module.
    pub fn emit_function(&mut self, function: &Function) -> CodegenResult<FunctionValue<'ctx>> {
        let fn_value = match self.module.get_function(&function.proto.name) {
            Some(existing) => existing,
            None => self.emit_prototype(&function.proto),
        };

        let entry = self.context.append_basic_block(fn_value, "entry");
        self.builder.position_at_end(entry);

        self.variables.clear();
        for param in fn_value.get_param_iter() {
            let value = param.into_float_value();
            let name = value.get_name().to_string_lossy().into_owned();
            let slot = self.entry_block_alloca(fn_value, &name)?;
            self.builder.build_store(slot, value)?;
            self.variables.insert(name, slot);
        }

        if let Err(error) = self.emit_body(&function.body) {
            unsafe { fn_value.delete() };
            return Err(error);
        }

        if !fn_value.verify(false) {
            unsafe { fn_value.delete() };
            return Err(CodegenError::InvalidFunction(function.proto.name.clone()));
        }
        self.fpm.run_on(&fn_value);
        Ok(fn_value)
    }

    /// Emit the body expressions in order; the last one becomes the return
    /// value unless it already is a `return`
    fn emit_body(&mut self, body: &[Expr]) -> CodegenResult<()> {
        for (index, expr) in body.iter().enumerate() {
            let value = self.emit_expr(expr)?;
            if index + 1 == body.len() && !matches!(expr, Expr::Return(_)) {
                self.builder.build_return(Some(&value))?;
            }
        }
        Ok(())
    }

    /// Lower one expression to a `double` value
    fn emit_expr(&mut self, expr: &Expr) -> CodegenResult<FloatValue<'ctx>> {
        match expr {
            Expr::Number(value) => Ok(self.context.f64_type().const_float(*value)),
            Expr::Variable(name) => self.emit_variable(name),
            Expr::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs),
            Expr::If {
                cond,
                then_body,
                else_body,
            } => self.emit_if(cond, then_body, else_body),
            Expr::For {
                var,
                start,
                end,
                step,
                body,
            } => self.emit_for(var, start, end, step.as_deref(), body),
            Expr::While { cond, body } => self.emit_while(cond, body),
            Expr::Return(value) => self.emit_return(value),
            Expr::Call { callee, args } => self.emit_call(callee, args),
        }
    }

    fn emit_variable(&mut self, name: &str) -> CodegenResult<FloatValue<'ctx>> {
        let slot = self
            .variables
            .get(name)
            .copied()
            .ok_or_else(|| CodegenError::UndefinedIdentifier(name.to_string()))?;
        let loaded = self
            .builder
            .build_load(slot, name)?;
        Ok(loaded.into_float_value())
    }

    fn emit_binary(&mut self, op: char, lhs: &Expr, rhs: &Expr) -> CodegenResult<FloatValue<'ctx>> {
        // Assignment: the left operand must name a variable. The slot is
        // created on first assignment; the value of the whole expression is
        // the stored value.
        if op == ':' {
            let Expr::Variable(name) = lhs else {
                return Err(CodegenError::InvalidAssignmentTarget);
            };
            let value = self.emit_expr(rhs)?;
            match self.variables.get(name).copied() {
                Some(slot) => {
                    self.builder.build_store(slot, value)?;
                }
                None => {
                    let function = self.current_function()?;
                    let slot = self.entry_block_alloca(function, name)?;
                    self.builder.build_store(slot, value)?;
                    self.variables.insert(name.clone(), slot);
                }
            }
            return Ok(value);
        }

        let l = self.emit_expr(lhs)?;
        let r = self.emit_expr(rhs)?;
        let f64_type = self.context.f64_type();
        match op {
            '+' => Ok(self.builder.build_float_add(l, r, "addtmp")?),
            '-' => Ok(self.builder.build_float_sub(l, r, "subtmp")?),
            '*' => Ok(self.builder.build_float_mul(l, r, "multmp")?),
            '/' => Ok(self.builder.build_float_div(l, r, "divtmp")?),
            '<' => {
                let cmp = self
                    .builder
                    .build_float_compare(FloatPredicate::ULT, l, r, "cmptmp")?;
                Ok(self
                    .builder
                    .build_unsigned_int_to_float(cmp, f64_type, "booltmp")?)
            }
            '>' => {
                let cmp = self
                    .builder
                    .build_float_compare(FloatPredicate::UGT, l, r, "cmptmp")?;
                Ok(self
                    .builder
                    .build_unsigned_int_to_float(cmp, f64_type, "booltmp")?)
            }
            '=' => {
                let cmp = self
                    .builder
                    .build_float_compare(FloatPredicate::UEQ, l, r, "cmptmp")?;
                Ok(self
                    .builder
                    .build_unsigned_int_to_float(cmp, f64_type, "booltmp")?)
            }
            _ => Err(CodegenError::InvalidBinaryOperator),
        }
    }

    /// Lower an `if`: compare the condition against `0.0`, branch into
    /// `ifbody`/`elsebody`, merge at `ifcont` through a phi. The value of
    /// each branch is its last expression; an empty else body lowers to a
    /// bare branch supplying the `0.0` incoming.
    fn emit_if(
        &mut self,
        cond: &Expr,
        then_body: &[Expr],
        else_body: &[Expr],
    ) -> CodegenResult<FloatValue<'ctx>> {
        let f64_type = self.context.f64_type();
        let zero = f64_type.const_float(0.0);

        let cond_value = self.emit_expr(cond)?;
        let cond_bit =
            self.builder
                .build_float_compare(FloatPredicate::ONE, cond_value, zero, "ifcond")?;

        let function = self.current_function()?;
        let then_block = self.context.append_basic_block(function, "ifbody");
        let else_block = self.context.append_basic_block(function, "elsebody");
        let merge_block = self.context.append_basic_block(function, "ifcont");
        self.builder
            .build_conditional_branch(cond_bit, then_block, else_block)?;

        self.builder.position_at_end(then_block);
        let mut then_value = zero;
        for expr in then_body {
            then_value = self.emit_expr(expr)?;
        }
        self.builder.build_unconditional_branch(merge_block)?;
        let then_end = self.current_block()?;

        self.builder.position_at_end(else_block);
        let mut else_value = zero;
        for expr in else_body {
            else_value = self.emit_expr(expr)?;
        }
        self.builder.build_unconditional_branch(merge_block)?;
        let else_end = self.current_block()?;

        self.builder.position_at_end(merge_block);
        let phi = self.builder.build_phi(f64_type, "iftmp")?;
        phi.add_incoming(&[(&then_value, then_end), (&else_value, else_end)]);
        Ok(phi.as_basic_value().into_float_value())
    }

    /// Lower a `for`: store the start value into a fresh entry-block slot,
    /// shadow any outer binding of the induction variable for the body,
    /// advance by the step (default `1.0`) and loop while `end` differs from
    /// the advanced value. The value of the whole loop is `0.0`.
    fn emit_for(
        &mut self,
        var: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        body: &[Expr],
    ) -> CodegenResult<FloatValue<'ctx>> {
        let function = self.current_function()?;
        let slot = self.entry_block_alloca(function, var)?;
        let start_value = self.emit_expr(start)?;
        self.builder.build_store(slot, start_value)?;

        let loop_block = self.context.append_basic_block(function, "loop");
        self.builder.build_unconditional_branch(loop_block)?;
        self.builder.position_at_end(loop_block);

        let shadowed = self.variables.insert(var.to_string(), slot);
        let outcome = self.emit_for_tail(var, slot, end, step, body, loop_block);
        match shadowed {
            Some(outer) => {
                self.variables.insert(var.to_string(), outer);
            }
            None => {
                self.variables.remove(var);
            }
        }
        outcome
    }

    /// Body, step, and back-edge of a `for` loop, with the induction
    /// variable already bound
    fn emit_for_tail(
        &mut self,
        var: &str,
        slot: PointerValue<'ctx>,
        end: &Expr,
        step: Option<&Expr>,
        body: &[Expr],
        loop_block: BasicBlock<'ctx>,
    ) -> CodegenResult<FloatValue<'ctx>> {
        let f64_type = self.context.f64_type();
        for expr in body {
            self.emit_expr(expr)?;
        }

        let step_value = match step {
            Some(expr) => self.emit_expr(expr)?,
            None => f64_type.const_float(1.0),
        };
        let end_value = self.emit_expr(end)?;

        let current = self
            .builder
            .build_load(slot, var)?
            .into_float_value();
        let next = self.builder.build_float_add(current, step_value, "nextvar")?;
        self.builder.build_store(slot, next)?;

        // The loop runs while `end` differs from the already-incremented
        // induction value, so `for i in 0 ~ n` sees i = 0 .. n-1.
        let loop_cond =
            self.builder
                .build_float_compare(FloatPredicate::ONE, end_value, next, "loopcond")?;

        let function = self.current_function()?;
        let after_block = self.context.append_basic_block(function, "afterloop");
        self.builder
            .build_conditional_branch(loop_cond, loop_block, after_block)?;
        self.builder.position_at_end(after_block);

        Ok(f64_type.const_zero())
    }

    /// Lower a `while`: a `whilecond` header re-evaluates the condition on
    /// every iteration, the body branches back to it. The value of the whole
    /// loop is `0.0`.
    fn emit_while(&mut self, cond: &Expr, body: &[Expr]) -> CodegenResult<FloatValue<'ctx>> {
        let f64_type = self.context.f64_type();
        let function = self.current_function()?;
        let header_block = self.context.append_basic_block(function, "whilecond");
        let body_block = self.context.append_basic_block(function, "whilebody");
        let after_block = self.context.append_basic_block(function, "afterwhile");

        self.builder.build_unconditional_branch(header_block)?;
        self.builder.position_at_end(header_block);
        let cond_value = self.emit_expr(cond)?;
        let cond_bit = self.builder.build_float_compare(
            FloatPredicate::ONE,
            cond_value,
            f64_type.const_float(0.0),
            "loopcond",
        )?;
        self.builder
            .build_conditional_branch(cond_bit, body_block, after_block)?;

        self.builder.position_at_end(body_block);
        for expr in body {
            self.emit_expr(expr)?;
        }
        self.builder.build_unconditional_branch(header_block)?;

        self.builder.position_at_end(after_block);
        Ok(f64_type.const_zero())
    }

    fn emit_return(&mut self, value: &Expr) -> CodegenResult<FloatValue<'ctx>> {
        let result = self.emit_expr(value)?;
        self.builder.build_return(Some(&result))?;
        Ok(result)
    }

    /// Lower a call: the callee must already exist in the module (a later
    /// definition may satisfy an earlier `extern`), with matching arity
    fn emit_call(&mut self, callee: &str, args: &[Expr]) -> CodegenResult<FloatValue<'ctx>> {
        let function = self
            .module
            .get_function(callee)
            .ok_or_else(|| CodegenError::UnknownFunction(callee.to_string()))?;
        if function.count_params() as usize != args.len() {
            return Err(CodegenError::IncorrectArgumentCount);
        }
        let mut arg_values: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(args.len());
        for arg in args {
            arg_values.push(self.emit_expr(arg)?.into());
        }
        let call = self.builder.build_call(function, &arg_values, "calltmp")?;
        call.try_as_basic_value()
            .left()
            .map(inkwell::values::BasicValueEnum::into_float_value)
            .ok_or(CodegenError::VoidCall)
    }

    /// Stack slot allocated in the entry block of `function`
    fn entry_block_alloca(
        &self,
        function: FunctionValue<'ctx>,
        name: &str,
    ) -> CodegenResult<PointerValue<'ctx>> {
        let temp = self.context.create_builder();
        let entry = function
            .get_first_basic_block()
            .ok_or(CodegenError::NoInsertPoint)?;
        match entry.get_first_instruction() {
            Some(first) => temp.position_before(&first),
            None => temp.position_at_end(entry),
        }
        Ok(temp.build_alloca(self.context.f64_type(), name)?)
    }

    fn current_block(&self) -> CodegenResult<BasicBlock<'ctx>> {
        self.builder
            .get_insert_block()
            .ok_or(CodegenError::NoInsertPoint)
    }

    fn current_function(&self) -> CodegenResult<FunctionValue<'ctx>> {
        self.current_block()?
            .get_parent()
            .ok_or(CodegenError::NoInsertPoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{Lexer, TokenKind};
    use crate::parser::Parser;
    use inkwell::values::AnyValue;

    /// Feed every top-level construct of `source` through the code
    /// generator, collecting lowering errors
    fn compile<'ctx>(context: &'ctx Context, source: &str) -> (Codegen<'ctx>, Vec<CodegenError>) {
        let mut codegen = Codegen::new(context);
        let mut lexer = Lexer::new(source);
        let mut errors = Vec::new();
        loop {
            match lexer.peek_token().kind {
                TokenKind::Eof => break,
                TokenKind::Fn => {
                    let function = Parser::new(&mut lexer).definition().unwrap();
                    if let Err(e) = codegen.emit_function(&function) {
                        errors.push(e);
                    }
                }
                TokenKind::Extern => {
                    let proto = Parser::new(&mut lexer).extern_prototype().unwrap();
                    codegen.emit_prototype(&proto);
                }
                _ => {
                    let function = Parser::new(&mut lexer).top_level_expr().unwrap();
                    if let Err(e) = codegen.emit_function(&function) {
                        errors.push(e);
                    }
                }
            }
        }
        (codegen, errors)
    }

    fn function_ir(codegen: &Codegen<'_>, name: &str) -> String {
        codegen
            .module()
            .get_function(name)
            .unwrap()
            .print_to_string()
            .to_string()
    }

    #[test]
    fn constant_arithmetic_folds() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn a() { 1 + 2 }");
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "a");
        assert!(ir.contains("ret double 3.000000e+00"), "got:\n{ir}");
    }

    #[test]
    fn comparison_lowers_to_unordered_fcmp() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn lt(a, b) { a < b }");
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "lt");
        assert!(ir.contains("fcmp ult"), "got:\n{ir}");
        assert!(ir.contains("uitofp"), "got:\n{ir}");
    }

    #[test]
    fn if_with_side_effects_keeps_phi() {
        let context = Context::create();
        let (codegen, errors) = compile(
            &context,
            "extern foo(x) fn c(x) { if x < 0 { foo(1) } else { foo(2) } }",
        );
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "c");
        assert!(ir.contains("phi double"), "got:\n{ir}");
        assert!(ir.contains("call double @foo"), "got:\n{ir}");
    }

    #[test]
    fn if_without_else_verifies() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn d(x) { if x { 42 } }");
        assert!(errors.is_empty());
        assert!(codegen.module().get_function("d").is_some());
    }

    #[test]
    fn abs_function_emits_branches() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn c(x) { if x < 0 { 0 - x } else { x } }");
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "c");
        assert!(ir.contains("fcmp"), "got:\n{ir}");
    }

    #[test]
    fn sum_loop_emits_backedge() {
        let context = Context::create();
        let (codegen, errors) = compile(
            &context,
            "fn s(n) { sum : 0 for i in 0 ~ n { sum : sum + i } sum }",
        );
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "s");
        assert!(ir.contains("loop:"), "got:\n{ir}");
        assert!(ir.contains("fcmp one"), "got:\n{ir}");
        assert!(ir.contains("fadd"), "got:\n{ir}");
    }

    #[test]
    fn while_loop_emits_header() {
        let context = Context::create();
        let (codegen, errors) = compile(
            &context,
            "fn w(n) { i : 0 while i < n { i : i + 1 } i }",
        );
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "w");
        assert!(ir.contains("whilecond"), "got:\n{ir}");
        assert!(ir.contains("whilebody"), "got:\n{ir}");
    }

    #[test]
    fn extern_call_links_by_name() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "extern sin(x) fn g(x) { sin(x) + 1 }");
        assert!(errors.is_empty());
        let sin = codegen.module().get_function("sin").unwrap();
        assert_eq!(sin.count_basic_blocks(), 0); // declaration only
        assert_eq!(sin.count_params(), 1);
        let ir = function_ir(&codegen, "g");
        assert!(ir.contains("call double @sin"), "got:\n{ir}");
    }

    #[test]
    fn assignment_to_non_variable_is_rejected() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn bad() { 3 : 4 }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CodegenError::InvalidAssignmentTarget));
        assert!(codegen.module().get_function("bad").is_none());
    }

    #[test]
    fn assignment_to_variable_succeeds() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn ok() { x : 3 x }");
        assert!(errors.is_empty());
        assert!(codegen.module().get_function("ok").is_some());
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "extern sin(x) fn h() { sin(1, 2) }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CodegenError::IncorrectArgumentCount));
        assert!(codegen.module().get_function("h").is_none());
    }

    #[test]
    fn undefined_identifier_is_rejected() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn u() { q }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            CodegenError::UndefinedIdentifier(ref name) if name == "q"
        ));
        assert!(codegen.module().get_function("u").is_none());
    }

    #[test]
    fn unknown_callee_is_rejected() {
        let context = Context::create();
        let (_codegen, errors) = compile(&context, "fn v() { nosuch(1) }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CodegenError::UnknownFunction(_)));
    }

    #[test]
    fn logical_operator_has_no_lowering() {
        let context = Context::create();
        let (_codegen, errors) = compile(&context, "fn w(a, b) { a & b }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CodegenError::InvalidBinaryOperator));
    }

    #[test]
    fn repeated_extern_then_definition() {
        let context = Context::create();
        let (codegen, errors) = compile(
            &context,
            "extern f(x) extern f(x) fn g(y) { f(y) } fn f(x) { x }",
        );
        assert!(errors.is_empty());
        let f = codegen.module().get_function("f").unwrap();
        assert!(f.count_basic_blocks() > 0); // forward reference got a body
        let ir = function_ir(&codegen, "g");
        assert!(ir.contains("call double @f"), "got:\n{ir}");
    }

    #[test]
    fn explicit_return_is_used() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn r(x) { return x + 1 }");
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "r");
        assert!(ir.contains("ret double"), "got:\n{ir}");
    }

    #[test]
    fn top_level_expression_becomes_anonymous_function() {
        let context = Context::create();
        let mut codegen = Codegen::new(&context);
        let mut lexer = Lexer::new("4 * 10 + 2");
        let function = Parser::new(&mut lexer).top_level_expr().unwrap();
        let fn_value = codegen.emit_function(&function).unwrap();
        assert_eq!(fn_value.count_params(), 0);
        let ir = fn_value.print_to_string().to_string();
        assert!(ir.contains("ret double 4.200000e+01"), "got:\n{ir}");
    }

    #[test]
    fn loop_variable_shadowing_is_restored() {
        let context = Context::create();
        // The outer `i` must survive the loop that shadows it.
        let (codegen, errors) = compile(
            &context,
            "fn sh() { i : 100 for i in 0 ~ 3 { i } i }",
        );
        assert!(errors.is_empty());
        assert!(codegen.module().get_function("sh").is_some());
    }

    #[test]
    fn parameters_become_entry_allocas() {
        let context = Context::create();
        let (codegen, errors) = compile(&context, "fn id(x) { x : x + 0 x }");
        assert!(errors.is_empty());
        let ir = function_ir(&codegen, "id");
        assert!(ir.contains("alloca double"), "got:\n{ir}");
    }
}
