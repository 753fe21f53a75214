// Expression lowering. Every arm returns the register holding its result,
// except calls to a `None`-returning library method,
// which still hand back a dummy placeholder register so callers never have
// to special-case "no result" — the placeholder is freed immediately by
// whichever statement discards it (`Statement::MethodCall`).

use tomb_ast::{BinaryOp, Expression, LiteralValue, ScopeId, Storage, VarKind};
use tomb_diagnostics::CompileError;

use super::MethodCodeGen;
use crate::registers::Register;

impl<'ctx, 'a> MethodCodeGen<'ctx, 'a> {
    /// Returns `None` only when the generated code never stores a result —
    /// in practice this cannot happen today since every expression kind
    /// allocates a register, but the `Option` return shape mirrors
    /// `Statement::MethodCall`'s "the value may be discarded" use site.
    pub(crate) fn lower_expression(&mut self, scope: ScopeId, expr: &Expression) -> Result<Option<Register>, CompileError> {
        let reg = match expr {
            Expression::Literal { value, line, .. } => self.lower_literal(value, *line)?,
            Expression::Var { name, line, .. } => self.lower_var_read(scope, name, *line)?,
            Expression::Const { name, line, .. } => self.lower_const_read(scope, name, *line)?,
            Expression::Binary {
                op, left, right, line, ..
            } => self.lower_binary(scope, *op, left, right, *line)?,
            Expression::Negation { inner, line, .. } => self.lower_negation(scope, inner, *line)?,
            Expression::Cast { to, inner, line } => self.lower_cast(scope, to.kind(), inner, *line)?,
            Expression::Method {
                target, args, line, ..
            } => self.lower_call(scope, &target.library, &target.method, args, *line)?,
            Expression::Macro { name, line, .. } => self.lower_macro(name, *line)?,
        };
        Ok(Some(reg))
    }

    fn lower_literal(&mut self, value: &LiteralValue, line: usize) -> Result<Register, CompileError> {
        let reg = self.ctx.alloc("literal", None, line)?;
        let operand = match value {
            LiteralValue::Number(n) => n.to_string(),
            LiteralValue::Bool(b) => b.to_string(),
            LiteralValue::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            LiteralValue::Bytes(bytes) => format!("0x{}", hex(bytes)),
            LiteralValue::Address(addr) => addr.clone(),
            LiteralValue::Hash(hash) => hash.clone(),
        };
        self.emit(line, format!("LOAD {} {}", reg.asm(), operand));
        Ok(reg)
    }

    /// Reading a local/argument returns its long-lived register directly (no
    /// copy), tagged `borrowed` so callers know not to free or mutate it in
    /// place; reading a global issues a fresh, owned `SLOAD` every time —
    /// globals are never cached across statements.
    fn lower_var_read(&mut self, scope: ScopeId, name: &str, line: usize) -> Result<Register, CompileError> {
        let decl = self
            .ctx
            .scopes
            .find_variable(scope, name)
            .cloned()
            .expect("resolution already validated this variable exists");
        match decl.storage {
            Storage::Global => {
                let reg = self.ctx.alloc(&format!("global:{}", name), None, line)?;
                self.emit(line, format!("SLOAD {} ${}", reg.asm(), name));
                Ok(reg)
            }
            Storage::Local | Storage::Argument => {
                let owning_scope = decl.scope.unwrap_or(scope);
                self.var_register(owning_scope, name, line)
            }
        }
    }

    fn lower_const_read(&mut self, scope: ScopeId, name: &str, line: usize) -> Result<Register, CompileError> {
        let decl = self
            .ctx
            .scopes
            .find_constant(scope, name)
            .cloned()
            .expect("resolution already validated this constant exists");
        self.lower_literal(&decl.literal_value, line)
    }

    /// Evaluates both operands, then combines them into a freshly-allocated
    /// destination register — never the left operand's own register, since
    /// that may be a variable's long-lived slot (mutating it in place would
    /// clobber the variable). Both operand registers are freed afterward,
    /// unless they're themselves borrowed variable registers.
    fn lower_binary(
        &mut self,
        scope: ScopeId,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        line: usize,
    ) -> Result<Register, CompileError> {
        let left_reg = self
            .lower_expression(scope, left)?
            .expect("binary operands always produce a value");
        let right_reg = self
            .lower_expression(scope, right)?
            .expect("binary operands always produce a value");
        let dst = self.ctx.alloc("binary", None, line)?;
        self.emit(line, format!("{} {} {} {}", binary_mnemonic(op), dst.asm(), left_reg.asm(), right_reg.asm()));
        self.free_if_owned(left_reg, line)?;
        self.free_if_owned(right_reg, line)?;
        Ok(dst)
    }

    fn lower_negation(&mut self, scope: ScopeId, inner: &Expression, line: usize) -> Result<Register, CompileError> {
        let reg = self
            .lower_expression(scope, inner)?
            .expect("negation operand always produces a value");
        let reg = self.owned_copy(reg, line)?;
        self.emit(line, format!("NOT {} {}", reg.asm(), reg.asm()));
        Ok(reg)
    }

    fn lower_cast(&mut self, scope: ScopeId, to: VarKind, inner: &Expression, line: usize) -> Result<Register, CompileError> {
        let reg = self
            .lower_expression(scope, inner)?
            .expect("cast operand always produces a value");
        let reg = self.owned_copy(reg, line)?;
        self.emit(line, format!("CAST {} {:?}", reg.asm(), to));
        Ok(reg)
    }

    /// Lowers a fully-resolved library call (generic patching and
    /// implicit-first-argument rewriting have already happened in
    /// `tomb-parser`, so by codegen time `target` names a concrete method).
    fn lower_call(
        &mut self,
        scope: ScopeId,
        library: &str,
        method: &str,
        args: &[Expression],
        line: usize,
    ) -> Result<Register, CompileError> {
        let mut arg_regs = Vec::with_capacity(args.len());
        for arg in args {
            let reg = self
                .lower_expression(scope, arg)?
                .expect("call arguments always produce a value");
            arg_regs.push(reg);
        }
        for reg in &arg_regs {
            self.emit(line, format!("PUSH_ARG {}", reg.asm()));
        }
        let result_reg = self.ctx.alloc(&format!("call:{}.{}", library, method), None, line)?;
        self.emit(
            line,
            format!("CALL {} {}.{} {}", result_reg.asm(), library, method, arg_regs.len()),
        );
        for reg in arg_regs {
            self.free_if_owned(reg, line)?;
        }
        // `result_reg` is handed back even for a `None`-returning method —
        // it is the placeholder `Statement::MethodCall` immediately frees.
        Ok(result_reg)
    }

    /// Built-in macros (`@sender`, `@timestamp`, ...) lower to a single
    /// pseudo-opcode naming the macro; the VM resolves the specific value at
    /// runtime.
    fn lower_macro(&mut self, name: &str, line: usize) -> Result<Register, CompileError> {
        let reg = self.ctx.alloc(&format!("macro:{}", name), None, line)?;
        self.emit(line, format!("SYSCALL {} {}", reg.asm(), name));
        Ok(reg)
    }
}

fn binary_mnemonic(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "ADD",
        BinaryOp::Sub => "SUB",
        BinaryOp::Mul => "MUL",
        BinaryOp::Div => "DIV",
        BinaryOp::Mod => "MOD",
        BinaryOp::And => "AND",
        BinaryOp::Or => "OR",
        BinaryOp::Xor => "XOR",
        BinaryOp::Shl => "SHL",
        BinaryOp::Shr => "SHR",
        BinaryOp::Lt => "LT",
        BinaryOp::Gt => "GT",
        BinaryOp::LtEq => "LTEQ",
        BinaryOp::GtEq => "GTEQ",
        BinaryOp::Equal => "EQ",
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
