// Code generator: lowers one method's `StatementBlock` to VM assembly text,
// post-order. Organized the way `tomb-parser`'s grammar is — one submodule
// for statements, one for expressions — sharing the `MethodCodeGen` cursor
// analog through `&mut self`.

use std::collections::HashMap;

use tomb_ast::{EventDeclaration, MethodInterface, ScopeId, StatementBlock};
use tomb_diagnostics::CompileError;

use crate::context::CompilerContext;
use crate::registers::Register;

mod expressions;
mod statements;

/// One emitted VM assembly line, tagged with the source line it came from —
/// the raw material for `ModuleArtifact::source_line_map`.
pub(crate) struct EmittedLine {
    pub text: String,
    pub source_line: usize,
}

/// Per-method lowering state: the running line buffer and the map from a
/// declared variable to its long-lived register. Scoped to a single
/// method — a fresh `MethodCodeGen` is
/// built for every method, constructor, task, trigger, or script `code`
/// block (`CompilerContext::begin_method` resets the shared register pool
/// to match).
pub(crate) struct MethodCodeGen<'ctx, 'a> {
    pub(crate) ctx: &'ctx mut CompilerContext<'a>,
    lines: Vec<EmittedLine>,
    var_registers: HashMap<(ScopeId, String), Register>,
    events: Vec<EventDeclaration>,
}

impl<'ctx, 'a> MethodCodeGen<'ctx, 'a> {
    fn new(ctx: &'ctx mut CompilerContext<'a>, events: Vec<EventDeclaration>) -> Self {
        Self {
            ctx,
            lines: Vec::new(),
            var_registers: HashMap::new(),
            events,
        }
    }

    pub(crate) fn emit(&mut self, line: usize, text: String) {
        self.lines.push(EmittedLine { text, source_line: line });
    }

    /// Get-or-allocate the long-lived register for a local/argument variable,
    /// keyed by its declaring scope so that two `local x` in non-overlapping
    /// (one already dead) scopes can reuse a slot while two *live* ones never
    /// collide. The handle comes back tagged `borrowed` — only `free_scope`
    /// (via its own copy kept in `var_registers`) is allowed to actually
    /// free this slot; every other caller must treat it as read-only and
    /// go through [`Self::free_if_owned`]/[`Self::owned_copy`].
    fn var_register(&mut self, scope: ScopeId, name: &str, line: usize) -> Result<Register, CompileError> {
        if let Some(reg) = self.var_registers.get(&(scope, name.to_string())) {
            return Ok(reg.as_borrowed());
        }
        let reg = self.ctx.alloc(&format!("var:{}", name), Some(name), line)?;
        self.emit(line, format!("ALIAS {} ${}", reg.asm(), name));
        self.var_registers.insert((scope, name.to_string()), reg);
        Ok(reg.as_borrowed())
    }

    /// Frees every register this method allocated for a variable declared
    /// directly in `scope` — called when that scope's syntactic extent ends
    /// (a block's closing `}`, or the method body itself): a scope's
    /// destruction implies all inner `VarDecl`s are dead.
    fn free_scope(&mut self, scope: ScopeId, line: usize) -> Result<(), CompileError> {
        let data = self.ctx.scopes.get(scope);
        let mut names: Vec<String> = data.parameters.iter().map(|p| p.name.clone()).collect();
        names.extend(data.variable_names().map(|s| s.to_string()));
        for name in names {
            if let Some(reg) = self.var_registers.remove(&(scope, name)) {
                self.ctx.dealloc(reg, line)?;
            }
        }
        Ok(())
    }

    /// Frees `reg` unless it's a borrowed alias of a variable's long-lived
    /// register — those are only ever freed by `free_scope`, when the
    /// owning scope ends.
    fn free_if_owned(&mut self, reg: Register, line: usize) -> Result<(), CompileError> {
        if reg.borrowed {
            Ok(())
        } else {
            self.ctx.dealloc(reg, line)
        }
    }

    /// If `reg` is a borrowed variable register, copies it into a fresh
    /// temporary and returns that instead — for any lowering that mutates
    /// its result register in place (`NOT`, `CAST`), so it never clobbers
    /// a variable's own storage. A non-borrowed register is returned
    /// unchanged since it's already a private temporary.
    fn owned_copy(&mut self, reg: Register, line: usize) -> Result<Register, CompileError> {
        if !reg.borrowed {
            return Ok(reg);
        }
        let copy = self.ctx.alloc("copy", None, line)?;
        self.emit(line, format!("MOVE {} {}", copy.asm(), reg.asm()));
        Ok(copy)
    }

    fn event(&self, name: &str) -> Option<EventDeclaration> {
        self.events.iter().find(|e| e.name == name).cloned()
    }
}

/// Lower one method interface to a flat listing of `(text, source_line)`
/// lines. `events` is the contract's event table (empty for scripts, which
/// can never `emit`).
pub fn lower_method(
    ctx: &mut CompilerContext<'_>,
    method: &MethodInterface,
    events: &[EventDeclaration],
) -> Result<Vec<(String, usize)>, CompileError> {
    ctx.begin_method();
    let body = method
        .body
        .as_ref()
        .expect("lower_method is only called on methods with a parsed body");
    let mut gen = MethodCodeGen::new(ctx, events.to_vec());
    gen.lower_block(body)?;
    gen.ctx.verify_registers(method.line)?;
    Ok(gen.lines.into_iter().map(|l| (l.text, l.source_line)).collect())
}

/// Lower a script's `code` block. Scripts never declare events and so can
/// never `emit` — the event table passed to the generator is always empty.
pub fn lower_script(ctx: &mut CompilerContext<'_>, body: &StatementBlock) -> Result<Vec<(String, usize)>, CompileError> {
    ctx.begin_method();
    let mut gen = MethodCodeGen::new(ctx, Vec::new());
    gen.lower_block(body)?;
    let end_line = body.statements.last().map(|s| s.line()).unwrap_or(1);
    gen.ctx.verify_registers(end_line)?;
    Ok(gen.lines.into_iter().map(|l| (l.text, l.source_line)).collect())
}
