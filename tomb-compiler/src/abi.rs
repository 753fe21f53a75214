// The ABI table attached to each `ModuleArtifact`: enough metadata for a
// caller to know what's callable, what it takes and returns, and where it
// starts in the bytecode, without re-parsing source.

use serde::Serialize;
use tomb_ast::{Contract, EventDeclaration, MethodInterface, MethodKind, Script, VarKind};

#[derive(Debug, Clone, Serialize)]
pub struct AbiParameter {
    pub name: String,
    pub kind: VarKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbiMethod {
    pub name: String,
    pub kind: MethodKind,
    pub return_type: Option<VarKind>,
    pub parameters: Vec<AbiParameter>,
    /// Byte offset of this method's first instruction within the module's
    /// `bytecode`, filled in once the assembler has laid out every method.
    pub offset: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AbiEvent {
    pub name: String,
    pub value: i64,
    pub payload_type: VarKind,
    pub description: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Abi {
    pub methods: Vec<AbiMethod>,
    pub events: Vec<AbiEvent>,
}

fn abi_method(method: &MethodInterface, offset: usize) -> AbiMethod {
    AbiMethod {
        name: method.name.clone(),
        kind: method.kind,
        return_type: method.return_type.as_ref().map(|t| t.kind()),
        parameters: method
            .parameters
            .iter()
            .map(|p| AbiParameter {
                name: p.name.clone(),
                kind: p.var_type.kind(),
            })
            .collect(),
        offset,
    }
}

fn abi_event(event: &EventDeclaration) -> AbiEvent {
    AbiEvent {
        name: event.name.clone(),
        value: event.numeric_value,
        payload_type: event.payload_type.kind(),
        description: event.description_bytes.clone(),
    }
}

/// `offsets[i]` is the byte offset of `contract.methods[i]`, computed by the
/// assembler from the length of every preceding method's encoded bytes.
pub fn build_contract_abi(contract: &Contract, offsets: &[usize]) -> Abi {
    let methods = contract
        .methods
        .iter()
        .zip(offsets.iter())
        .map(|(m, &offset)| abi_method(m, offset))
        .collect();
    let events = contract.events.iter().map(abi_event).collect();
    Abi { methods, events }
}

/// A script has exactly one implicit entry point at offset 0; it never
/// declares events.
pub fn build_script_abi(script: &Script) -> Abi {
    let method = AbiMethod {
        name: script.name.clone(),
        kind: MethodKind::Method,
        return_type: script.return_type.as_ref().map(|t| t.kind()),
        parameters: script
            .parameters
            .iter()
            .map(|p| AbiParameter {
                name: p.name.clone(),
                kind: p.var_type.kind(),
            })
            .collect(),
        offset: 0,
    };
    Abi {
        methods: vec![method],
        events: Vec::new(),
    }
}
