// Entry point of the Tomb compiler: drives `tomb-parser`'s single-pass
// parser/resolver to completion, then lowers each finished module to VM
// assembly, assembles it to bytes, and attaches an ABI. One `TypeRegistry`
// is shared by the whole compilation — structs and libraries declared
// earlier in the source are visible to everything parsed after them
// within the single pass.

use std::sync::Arc;

use tomb_ast::{Module, TypeRegistry};
use tomb_diagnostics::CompileError;
use tomb_parser::{Parser, TopLevelItem};

pub mod abi;
pub mod assembler;
pub mod codegen;
pub mod context;
pub mod registers;
pub mod unparse;

use abi::Abi;
use context::CompilerContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleArtifactKind {
    Contract,
    Script,
    Description,
}

/// One compiled module as returned by [`compile`].
pub struct ModuleArtifact {
    pub name: String,
    pub kind: ModuleArtifactKind,
    pub bytecode: Vec<u8>,
    pub abi: Abi,
    pub source_line_map: Vec<(usize, usize)>,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub file_name: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            file_name: "<source>".to_string(),
        }
    }
}

/// Compiles `source` top to bottom. A parse or codegen error on one
/// top-level item is recorded and parsing resumes at the next item
/// (`Parser::recover_to_next_top_level_item`) rather than aborting the
/// whole compilation. Returns `Ok` only when every module compiled cleanly.
pub fn compile(source: &str, options: CompileOptions) -> Result<Vec<ModuleArtifact>, Vec<CompileError>> {
    let registry = Arc::new(TypeRegistry::new());
    let mut parser = match Parser::new(source, &options.file_name, registry.clone()) {
        Ok(p) => p,
        Err(e) => return Err(vec![e]),
    };

    let mut artifacts = Vec::new();
    let mut errors = Vec::new();

    while !parser.is_at_end() {
        match parser.parse_next_top_level_item() {
            Ok(TopLevelItem::Struct(_)) => {
                // Registration into the registry already happened inside
                // `parse_struct_decl`; nothing further to do here.
            }
            Ok(TopLevelItem::Module(Module::Script(script))) if script.hidden => {
                match compile_script(&registry, &parser, &options.file_name, &script, true) {
                    Ok(artifact) => {
                        parser.register_description_bytecode(&script.name, artifact.bytecode.clone());
                        artifacts.push(artifact);
                    }
                    Err(e) => errors.push(e),
                }
            }
            Ok(TopLevelItem::Module(Module::Script(script))) => {
                match compile_script(&registry, &parser, &options.file_name, &script, false) {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(e) => errors.push(e),
                }
            }
            Ok(TopLevelItem::Module(Module::Contract(contract))) => {
                match compile_contract(&registry, &parser, &options.file_name, &contract) {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(e) => errors.push(e),
                }
            }
            Err(e) => {
                errors.push(e);
                parser.recover_to_next_top_level_item();
            }
        }
    }

    if errors.is_empty() {
        Ok(artifacts)
    } else {
        Err(errors)
    }
}

fn compile_contract(
    registry: &Arc<TypeRegistry>,
    parser: &Parser<'_>,
    file_name: &str,
    contract: &tomb_ast::Contract,
) -> Result<ModuleArtifact, CompileError> {
    let mut ctx = CompilerContext::new(registry.clone(), parser.scopes(), file_name.to_string());
    let mut method_lines = Vec::with_capacity(contract.methods.len());
    for method in &contract.methods {
        let lines = codegen::lower_method(&mut ctx, method, &contract.events)?;
        method_lines.push(lines);
    }
    let assembled = assembler::assemble(file_name, &method_lines)?;
    let offsets: Vec<usize> = assembled.method_offsets.iter().map(|m| m.offset).collect();
    Ok(ModuleArtifact {
        name: contract.name.clone(),
        kind: ModuleArtifactKind::Contract,
        bytecode: assembled.bytecode,
        abi: abi::build_contract_abi(contract, &offsets),
        source_line_map: assembled.source_line_map,
    })
}

fn compile_script(
    registry: &Arc<TypeRegistry>,
    parser: &Parser<'_>,
    file_name: &str,
    script: &tomb_ast::Script,
    hidden: bool,
) -> Result<ModuleArtifact, CompileError> {
    let mut ctx = CompilerContext::new(registry.clone(), parser.scopes(), file_name.to_string());
    let lines = codegen::lower_script(&mut ctx, &script.main_block)?;
    let assembled = assembler::assemble(file_name, std::slice::from_ref(&lines))?;
    Ok(ModuleArtifact {
        name: script.name.clone(),
        kind: if hidden {
            ModuleArtifactKind::Description
        } else {
            ModuleArtifactKind::Script
        },
        bytecode: assembled.bytecode,
        abi: abi::build_script_abi(script),
        source_line_map: assembled.source_line_map,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Idempotence property: compiling identical source twice yields
    /// byte-identical bytecode and identical ABIs.
    pub(crate) fn compile_twice_and_compare(source: &str) -> Vec<ModuleArtifact> {
        let first = compile(source, CompileOptions::default()).expect("first compile should succeed");
        let second = compile(source, CompileOptions::default()).expect("second compile should succeed");
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.bytecode, b.bytecode, "bytecode must be identical across identical compiles");
            assert_eq!(a.name, b.name);
        }
        first
    }

    #[test]
    fn minimal_contract_with_constructor_compiles() {
        let source = r#"
contract Hello {
    constructor(owner: address) {
        return;
    }
}
"#;
        let artifacts = compile_twice_and_compare(source);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].kind, ModuleArtifactKind::Contract);
        assert_eq!(artifacts[0].abi.methods[0].name, "Initialize");
        assert!(artifacts[0].abi.events.is_empty());
    }

    #[test]
    fn script_with_arithmetic_compiles() {
        let source = r#"
script Add {
    code(a: number, b: number): number {
        return a + b;
    }
}
"#;
        let artifacts = compile(source, CompileOptions::default()).expect("compiles");
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].kind, ModuleArtifactKind::Script);
        let text = String::from_utf8(artifacts[0].bytecode.clone()).unwrap();
        assert!(text.contains("ADD"));
        assert!(text.contains("RET"));
    }
}
