// An explicit stand-in for a singleton "current compiler": a context struct
// threaded by mutable reference through code generation rather than reached
// via global state. One instance is constructed per `compile()` call and
// lives exactly as long as it.

use std::sync::Arc;

use tomb_ast::{ScopeArena, TypeRegistry};
use tomb_diagnostics::CompileError;

use crate::registers::{Register, RegisterPool, DEFAULT_REGISTER_COUNT};

pub struct CompilerContext<'a> {
    pub registry: Arc<TypeRegistry>,
    pub scopes: &'a ScopeArena,
    pub file_name: String,
    pool: RegisterPool,
    label_counter: u32,
}

impl<'a> CompilerContext<'a> {
    pub fn new(registry: Arc<TypeRegistry>, scopes: &'a ScopeArena, file_name: String) -> Self {
        Self {
            registry,
            scopes,
            file_name,
            pool: RegisterPool::new(DEFAULT_REGISTER_COUNT),
            label_counter: 0,
        }
    }

    /// Each method is lowered independently: the pool is reset before every
    /// method so one method's leftover state can never bleed into the next.
    pub fn begin_method(&mut self) {
        self.pool = RegisterPool::new(DEFAULT_REGISTER_COUNT);
    }

    pub fn alloc(&mut self, owner: &str, alias: Option<&str>, line: usize) -> Result<Register, CompileError> {
        self.pool.alloc(owner, alias, &self.file_name, line)
    }

    pub fn dealloc(&mut self, reg: Register, line: usize) -> Result<(), CompileError> {
        self.pool.dealloc(reg, &self.file_name, line)
    }

    pub fn verify_registers(&self, line: usize) -> Result<(), CompileError> {
        self.pool.verify_empty(&self.file_name, line)
    }

    /// Monotonic per-compilation label counter backing `AllocateLabel`.
    pub fn new_label(&mut self) -> String {
        self.label_counter += 1;
        format!("L{}", self.label_counter)
    }
}
