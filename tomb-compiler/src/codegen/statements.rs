// Statement lowering. Each arm emits its instructions and frees whatever
// registers it itself allocated; `lower_block` takes care of the
// scope-level frees at the block's closing brace.

use tomb_ast::{Expression, ScopeId, Statement, StatementBlock, Storage};
use tomb_diagnostics::CompileError;

use super::MethodCodeGen;

impl<'ctx, 'a> MethodCodeGen<'ctx, 'a> {
    pub(crate) fn lower_block(&mut self, block: &StatementBlock) -> Result<(), CompileError> {
        for stmt in &block.statements {
            self.lower_statement(block.scope, stmt)?;
        }
        self.free_scope(block.scope, block_end_line(block))
    }

    fn lower_statement(&mut self, scope: ScopeId, stmt: &Statement) -> Result<(), CompileError> {
        match stmt {
            Statement::Assign { var_name, expr, line } => self.lower_assign(scope, var_name, expr, *line),
            Statement::If {
                cond,
                body,
                else_body,
                line,
            } => self.lower_if(scope, cond, body, else_body.as_ref(), *line),
            Statement::While { cond, body, line } => self.lower_while(scope, cond, body, *line),
            Statement::DoWhile { body, cond, line } => self.lower_do_while(scope, body, cond, *line),
            Statement::Return { expr, line } => self.lower_return(scope, expr.as_ref(), *line),
            Statement::Throw { message, line } => {
                self.emit(*line, format!("LOAD r0 \"{}\"", escape(message)));
                self.emit(*line, "THROW r0".to_string());
                Ok(())
            }
            Statement::Emit {
                event_name,
                address,
                value,
                line,
            } => self.lower_emit(scope, event_name, address, value, *line),
            Statement::AsmBlock { lines, line } => {
                for l in lines {
                    self.emit(*line, l.clone());
                }
                Ok(())
            }
            Statement::MethodCall { expr, line } => {
                let reg = self.lower_expression(scope, expr)?;
                if let Some(reg) = reg {
                    self.free_if_owned(reg, *line)?;
                }
                Ok(())
            }
        }
    }

    /// `x := expr`: evaluate the right-hand side directly into `x`'s
    /// long-lived register for a local/argument, or through `SSTORE` for a
    /// global — globals have no dedicated slot, they are re-read and
    /// re-written on every access.
    fn lower_assign(&mut self, scope: ScopeId, var_name: &str, expr: &Expression, line: usize) -> Result<(), CompileError> {
        let decl = self.ctx.scopes.find_variable(scope, var_name).cloned();
        let value_reg = self
            .lower_expression(scope, expr)?
            .expect("assignment rhs always produces a value");
        match decl {
            Some(d) if d.storage == Storage::Global => {
                self.emit(line, format!("SSTORE ${} {}", var_name, value_reg.asm()));
                self.free_if_owned(value_reg, line)?;
            }
            Some(d) => {
                let owning_scope = d.scope.unwrap_or(scope);
                let target = self.var_register(owning_scope, var_name, line)?;
                if target != value_reg {
                    self.emit(line, format!("MOVE {} {}", target.asm(), value_reg.asm()));
                    self.free_if_owned(value_reg, line)?;
                }
            }
            None => {
                // Resolution already guarantees `var_name` exists by the time
                // codegen runs; this arm only protects against a future
                // lowering bug rather than bad input.
                self.emit(line, format!("SSTORE ${} {}", var_name, value_reg.asm()));
                self.free_if_owned(value_reg, line)?;
            }
        }
        Ok(())
    }

    fn lower_if(
        &mut self,
        scope: ScopeId,
        cond: &Expression,
        body: &StatementBlock,
        else_body: Option<&StatementBlock>,
        line: usize,
    ) -> Result<(), CompileError> {
        let cond_reg = self
            .lower_expression(scope, cond)?
            .expect("condition always produces a value");
        let else_label = self.ctx.new_label();
        let end_label = self.ctx.new_label();
        self.emit(line, format!("JMPIFNOT {} {}", cond_reg.asm(), else_label));
        self.free_if_owned(cond_reg, line)?;
        self.lower_block(body)?;
        if else_body.is_some() {
            self.emit(line, format!("JMP {}", end_label));
        }
        self.emit(line, format!("LABEL {}", else_label));
        if let Some(else_body) = else_body {
            self.lower_block(else_body)?;
            self.emit(line, format!("LABEL {}", end_label));
        }
        Ok(())
    }

    fn lower_while(&mut self, scope: ScopeId, cond: &Expression, body: &StatementBlock, line: usize) -> Result<(), CompileError> {
        let top_label = self.ctx.new_label();
        let end_label = self.ctx.new_label();
        self.emit(line, format!("LABEL {}", top_label));
        let cond_reg = self
            .lower_expression(scope, cond)?
            .expect("condition always produces a value");
        self.emit(line, format!("JMPIFNOT {} {}", cond_reg.asm(), end_label));
        self.free_if_owned(cond_reg, line)?;
        self.lower_block(body)?;
        self.emit(line, format!("JMP {}", top_label));
        self.emit(line, format!("LABEL {}", end_label));
        Ok(())
    }

    fn lower_do_while(&mut self, scope: ScopeId, body: &StatementBlock, cond: &Expression, line: usize) -> Result<(), CompileError> {
        let top_label = self.ctx.new_label();
        self.emit(line, format!("LABEL {}", top_label));
        self.lower_block(body)?;
        let cond_reg = self
            .lower_expression(scope, cond)?
            .expect("condition always produces a value");
        self.emit(line, format!("JMPIF {} {}", cond_reg.asm(), top_label));
        self.free_if_owned(cond_reg, line)?;
        Ok(())
    }

    fn lower_return(&mut self, scope: ScopeId, expr: Option<&Expression>, line: usize) -> Result<(), CompileError> {
        match expr {
            Some(expr) => {
                let reg = self
                    .lower_expression(scope, expr)?
                    .expect("a typed return always produces a value");
                self.emit(line, format!("RET {}", reg.asm()));
                self.free_if_owned(reg, line)?;
            }
            None => self.emit(line, "RET".to_string()),
        }
        Ok(())
    }

    /// `emit Name(address, value)`: the event's numeric value is looked up
    /// once at parse time and baked into the opcode operand, so codegen
    /// only has to push the two payload registers.
    fn lower_emit(
        &mut self,
        scope: ScopeId,
        event_name: &str,
        address: &Expression,
        value: &Expression,
        line: usize,
    ) -> Result<(), CompileError> {
        let event = self
            .event(event_name)
            .expect("resolution already validated the emitted event exists");
        let addr_reg = self
            .lower_expression(scope, address)?
            .expect("address always produces a value");
        let value_reg = self
            .lower_expression(scope, value)?
            .expect("value always produces a value");
        self.emit(line, format!("PUSH_ARG {}", addr_reg.asm()));
        self.emit(line, format!("PUSH_ARG {}", value_reg.asm()));
        self.emit(line, format!("EMIT {} {}", event.name, event.numeric_value));
        self.free_if_owned(addr_reg, line)?;
        self.free_if_owned(value_reg, line)?;
        Ok(())
    }
}

fn block_end_line(block: &StatementBlock) -> usize {
    block.statements.last().map(|s| s.line()).unwrap_or(0)
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
