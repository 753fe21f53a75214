// A trivial placeholder assembler: the VM's real binary encoder is owned by
// the VM subsystem and lives elsewhere; this one only needs to turn the
// text lines `lower_method`/`lower_script` produced into a byte buffer,
// compute each method's starting offset within it, and map those offsets
// back to source lines for diagnostics.
//
// The encoding is the line text itself, newline-terminated, UTF-8. That is
// enough to make offsets and the idempotence property (compiling identical
// source twice yields byte-identical bytecode) observable without
// depending on the VM's actual opcode table.

use std::collections::HashSet;

use tomb_diagnostics::{codes, CompileError, Diagnostic, DiagnosticCategory, Span};

pub struct AssembledMethod {
    pub offset: usize,
}

pub struct AssembledModule {
    pub bytecode: Vec<u8>,
    pub method_offsets: Vec<AssembledMethod>,
    /// `(byte_offset, source_line)` pairs in increasing offset order.
    pub source_line_map: Vec<(usize, usize)>,
}

/// `methods` is one `Vec<(text, source_line)>` per method, in declaration
/// order. Every `JMP`/`JMPIF`/`JMPIFNOT` target must name a `LABEL` that
/// exists somewhere in the same method — labels do not cross method
/// boundaries since `CompilerContext::begin_method` never resets the
/// counter but each method's control flow is self-contained.
pub fn assemble(file_name: &str, methods: &[Vec<(String, usize)>]) -> Result<AssembledModule, CompileError> {
    let mut bytecode = Vec::new();
    let mut method_offsets = Vec::with_capacity(methods.len());
    let mut source_line_map = Vec::new();

    for lines in methods {
        let labels: HashSet<&str> = lines
            .iter()
            .filter_map(|(text, _)| text.strip_prefix("LABEL ").map(|rest| rest.trim()))
            .collect();
        for (text, line) in lines {
            for prefix in ["JMP ", "JMPIF ", "JMPIFNOT "] {
                if let Some(rest) = text.strip_prefix(prefix) {
                    let target = rest.rsplit(' ').next().unwrap_or(rest).trim();
                    if !labels.contains(target) {
                        let span = Span::new(file_name.to_string(), *line, 1, 1);
                        return Err(Diagnostic::error(
                            DiagnosticCategory::InternalError,
                            codes::UNREACHABLE_STATE,
                            format!("jump to undefined label `{}`", target),
                            span,
                        )
                        .into());
                    }
                }
            }
        }

        method_offsets.push(AssembledMethod { offset: bytecode.len() });
        for (text, line) in lines {
            source_line_map.push((bytecode.len(), *line));
            bytecode.extend_from_slice(text.as_bytes());
            bytecode.push(b'\n');
        }
    }

    Ok(AssembledModule {
        bytecode,
        method_offsets,
        source_line_map,
    })
}
