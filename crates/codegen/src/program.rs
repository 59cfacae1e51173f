//! Whole-contract assembly: dispatcher, function bodies and deployment code.

use crate::{
    abi,
    emitter::{Emitter, LabelId},
    error::Result,
    interface::InterfaceDescriptor,
    opcode::Opcode,
    selector::{Selector, ensure_unique},
    translator::{translate_constructor, translate_function},
};
use alloy_primitives::U256;
use cobra_data::ContractDefinition;

/// Generated code for one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Deployment code; its return data is `runtime`.
    pub creation: Vec<u8>,
    pub runtime: Vec<u8>,
    pub interface: InterfaceDescriptor,
}

pub fn generate(contract: &ContractDefinition) -> Result<Artifact> {
    let signatures: Vec<String> =
        contract.functions.iter().map(|function| function.signature.canonical()).collect();
    let selectors = ensure_unique(signatures.iter().map(String::as_str))?;
    let runtime = runtime_code(contract, &selectors)?;
    let creation = creation_code(contract, &runtime)?;
    log::debug!(
        "generated `{}`: {} byte(s) of runtime code, {} byte(s) of creation code",
        contract.name,
        runtime.len(),
        creation.len()
    );
    Ok(Artifact { creation, runtime, interface: InterfaceDescriptor::from_contract(contract) })
}

/// Runtime code: selector dispatch followed by one entry per function.
pub fn runtime_code(contract: &ContractDefinition, selectors: &[Selector]) -> Result<Vec<u8>> {
    let mut emitter = Emitter::new();
    let abort = emitter.new_label();
    let entries = emit_dispatcher(&mut emitter, selectors, abort)?;
    for (function, entry) in contract.functions.iter().zip(entries) {
        translate_function(contract, &mut emitter, function, entry, abort)?;
    }
    emitter.mark_jumpdest(abort)?;
    abi::revert_empty(&mut emitter)?;
    emitter.finish()
}

/// Compares the selector in calldata against each function's, leaving the selector on the stack
/// at the matching entry. Calldata shorter than a selector or an unknown selector reverts.
fn emit_dispatcher(emitter: &mut Emitter, selectors: &[Selector], abort: LabelId) -> Result<Vec<LabelId>> {
    emitter.push_u32(abi::ARGS_START)?;
    emitter.ops(&[Opcode::CALLDATASIZE, Opcode::LT])?;
    emitter.jump_if(abort)?;
    emitter.push_u32(0)?;
    emitter.op(Opcode::CALLDATALOAD)?;
    emitter.push_u32(0xe0)?;
    emitter.op(Opcode::SHR)?;

    let mut entries = Vec::with_capacity(selectors.len());
    for selector in selectors {
        let entry = emitter.new_label();
        emitter.op(Opcode::DUP1)?;
        emitter.push(U256::from(selector.as_u32()))?;
        emitter.op(Opcode::EQ)?;
        emitter.jump_if(entry)?;
        entries.push(entry);
    }
    emitter.op(Opcode::POP)?;
    emitter.jump(abort)?;
    Ok(entries)
}

/// Deployment code: runs the constructor, then returns the runtime code appended after it.
pub fn creation_code(contract: &ContractDefinition, runtime: &[u8]) -> Result<Vec<u8>> {
    let mut emitter = Emitter::new();
    let abort = emitter.new_label();
    let deploy = emitter.new_label();
    let runtime_start = emitter.new_label();

    emitter.begin_function();
    let payable = contract.constructor.as_ref().is_some_and(|constructor| constructor.payable);
    if !payable {
        emitter.op(Opcode::CALLVALUE)?;
        emitter.jump_if(abort)?;
    }
    emitter.init_heap()?;
    if let Some(constructor) = &contract.constructor {
        translate_constructor(contract, &mut emitter, constructor, deploy, abort)?;
    }

    emitter.mark_jumpdest(deploy)?;
    emitter.push_u32(runtime.len() as u32)?;
    emitter.op(Opcode::DUP1)?;
    emitter.push_label(runtime_start)?;
    emitter.push_u32(0)?;
    emitter.op(Opcode::CODECOPY)?;
    emitter.push_u32(0)?;
    emitter.op(Opcode::RETURN)?;

    emitter.mark_jumpdest(abort)?;
    abi::revert_empty(&mut emitter)?;
    emitter.link_function()?;
    emitter.mark(runtime_start)?;

    let mut code = emitter.finish()?;
    code.extend_from_slice(runtime);
    Ok(code)
}
