// Virtual-register pool for the code generator.
//
// A fixed-size array of slots, index 0 reserved by the VM. Allocation is a
// linear first-fit scan — N <= 32 in practice, so a linear scan is
// sufficient. Aliases are tracked inline in the slot rather than in a
// parallel array — a single array of option records, equally valid to a
// parallel-array layout.

use tomb_diagnostics::{codes, CompileError, Diagnostic, DiagnosticCategory, Span};

/// The VM's default register count. Index 0 is reserved, so `1..DEFAULT_REGISTER_COUNT`
/// are available to the allocator.
pub const DEFAULT_REGISTER_COUNT: usize = 32;

/// A handle to an allocated slot. Cheap to copy — the pool, not this value,
/// is the source of truth for whether the slot is still live, which is what
/// lets [`RegisterPool::dealloc`] detect a double-free explicitly rather
/// than relying on move semantics alone.
///
/// `borrowed` marks a handle that aliases a variable's long-lived register
/// (handed back by `lower_var_read`/`var_register`) rather than a one-off
/// temporary. It is codegen-level bookkeeping, not pool state: the pool
/// itself doesn't know or care which handles are borrowed, it only tracks
/// which slots are live. A borrowed handle must never be passed to
/// `dealloc` or mutated in place by a caller that doesn't own it —
/// `MethodCodeGen::free_if_owned`/`owned_copy` are the two call sites that
/// respect the flag. Equality and hashing ignore it: two handles to the
/// same slot are the same register regardless of how each was obtained.
#[derive(Debug, Clone, Copy)]
pub struct Register {
    pub index: usize,
    pub borrowed: bool,
}

impl Register {
    /// The VM assembly operand form, e.g. `r3`.
    pub fn asm(&self) -> String {
        format!("r{}", self.index)
    }

    /// The same slot, tagged as a borrowed alias of a variable's register.
    pub fn as_borrowed(self) -> Register {
        Register { borrowed: true, ..self }
    }
}

impl PartialEq for Register {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl Eq for Register {}

#[derive(Debug, Clone)]
struct RegisterSlot {
    owner: String,
    alias: Option<String>,
}

/// Fixed-size pool of `1..N` register slots. Slot 0 is never handed out.
#[derive(Debug)]
pub struct RegisterPool {
    slots: Vec<Option<RegisterSlot>>,
}

impl RegisterPool {
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![None; size],
        }
    }

    fn alias_is_live(&self, alias: &str) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|slot| slot.alias.as_deref() == Some(alias))
    }

    /// First-fit allocation. `alias`, if given, must not already be live on
    /// any other slot — a collision is a fatal `ShapeError`.
    pub fn alloc(
        &mut self,
        owner: &str,
        alias: Option<&str>,
        file: &str,
        line: usize,
    ) -> Result<Register, CompileError> {
        if let Some(name) = alias {
            if self.alias_is_live(name) {
                let span = Span::new(file.to_string(), line, 1, 1);
                return Err(Diagnostic::error(
                    DiagnosticCategory::ShapeError,
                    codes::DUPLICATE_ALIAS,
                    format!("alias `{}` already exists", name),
                    span,
                )
                .into());
            }
        }
        for (index, slot) in self.slots.iter_mut().enumerate().skip(1) {
            if slot.is_none() {
                *slot = Some(RegisterSlot {
                    owner: owner.to_string(),
                    alias: alias.map(|s| s.to_string()),
                });
                return Ok(Register { index, borrowed: false });
            }
        }
        let span = Span::new(file.to_string(), line, 1, 1);
        Err(Diagnostic::error(
            DiagnosticCategory::InternalError,
            codes::REGISTER_EXHAUSTED,
            format!("no free register (pool size {})", self.slots.len()),
            span,
        )
        .into())
    }

    /// Frees `reg`'s slot. Deallocating an already-free slot is a fatal
    /// `InternalError` rather than a silent no-op — it indicates a bug in
    /// the generator's own bookkeeping, not bad input.
    pub fn dealloc(&mut self, reg: Register, file: &str, line: usize) -> Result<(), CompileError> {
        match self.slots.get_mut(reg.index) {
            Some(slot @ Some(_)) => {
                *slot = None;
                Ok(())
            }
            _ => {
                let span = Span::new(file.to_string(), line, 1, 1);
                Err(Diagnostic::error(
                    DiagnosticCategory::InternalError,
                    codes::REGISTER_LEAK,
                    format!("double free of register r{}", reg.index),
                    span,
                )
                .into())
            }
        }
    }

    /// Every method must leave the pool fully free (`verify_registers`). A
    /// single leaked slot is reported, not the full set — "first offender"
    /// error-reporting style.
    pub fn verify_empty(&self, file: &str, line: usize) -> Result<(), CompileError> {
        for (index, slot) in self.slots.iter().enumerate().skip(1) {
            if let Some(slot) = slot {
                let span = Span::new(file.to_string(), line, 1, 1);
                return Err(Diagnostic::error(
                    DiagnosticCategory::InternalError,
                    codes::REGISTER_LEAK,
                    format!(
                        "register r{} (owner `{}`) not deallocated at end of method",
                        index, slot.owner
                    ),
                    span,
                )
                .into());
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_first_free_slot_skipping_zero() {
        let mut pool = RegisterPool::new(4);
        let r = pool.alloc("expr", None, "t.tomb", 1).unwrap();
        assert_eq!(r.index, 1);
    }

    #[test]
    fn rejects_duplicate_alias_while_live() {
        let mut pool = RegisterPool::new(4);
        pool.alloc("var:a", Some("a"), "t.tomb", 1).unwrap();
        let err = pool.alloc("var:b", Some("a"), "t.tomb", 2);
        assert!(err.is_err());
    }

    #[test]
    fn reuses_alias_after_free() {
        let mut pool = RegisterPool::new(4);
        let r = pool.alloc("var:a", Some("a"), "t.tomb", 1).unwrap();
        pool.dealloc(r, "t.tomb", 2).unwrap();
        assert!(pool.alloc("var:a2", Some("a"), "t.tomb", 3).is_ok());
    }

    #[test]
    fn double_free_is_an_internal_error() {
        let mut pool = RegisterPool::new(4);
        let r = pool.alloc("expr", None, "t.tomb", 1).unwrap();
        pool.dealloc(r, "t.tomb", 2).unwrap();
        let err = pool.dealloc(r, "t.tomb", 3);
        assert!(err.is_err());
    }

    #[test]
    fn verify_empty_catches_a_leak() {
        let mut pool = RegisterPool::new(4);
        let _leaked = pool.alloc("expr", None, "t.tomb", 1).unwrap();
        assert!(pool.verify_empty("t.tomb", 2).is_err());
        assert_eq!(pool.live_count(), 1);
    }

    #[test]
    fn exhaustion_is_reported_once_slots_run_out() {
        let mut pool = RegisterPool::new(2); // only slot 1 is usable
        pool.alloc("a", None, "t.tomb", 1).unwrap();
        assert!(pool.alloc("b", None, "t.tomb", 2).is_err());
    }
}
