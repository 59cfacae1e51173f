//! Translator from typed statements to EVM instructions
//!
//! Statements are translated with an empty operand stack; every expression leaves exactly one
//! word on it. Locals live in static memory, one word each.

mod expressions;
mod statements;

use crate::{
    abi,
    emitter::{Emitter, LabelId},
    error::{CodegenError, Result},
    memory::{MemoryAddress, constants},
    opcode::Opcode,
};
use cobra_data::{
    Constructor, ContractDefinition, Function, IndexSlice, IndexVec, Local, LocalId, Mutability,
    Stmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Conditional,
    Loop,
}

/// Labels of an open `if` or `for`. For loops, `otherwise` is the increment and `join` the exit.
#[derive(Debug, Clone, Copy)]
struct ControlFrame {
    kind: FrameKind,
    otherwise: LabelId,
    join: LabelId,
}

/// Translation state for one function or constructor body
pub(crate) struct Translator<'a> {
    pub(crate) contract: &'a ContractDefinition,
    pub(crate) emitter: &'a mut Emitter,
    name: &'a str,
    locals: IndexVec<LocalId, MemoryAddress>,
    frames: Vec<ControlFrame>,
    /// Shared `REVERT` with empty data.
    abort: LabelId,
    /// Where a bare `return` goes; `STOP` when unset.
    return_to: Option<LabelId>,
}

impl<'a> Translator<'a> {
    fn new(
        contract: &'a ContractDefinition,
        emitter: &'a mut Emitter,
        name: &'a str,
        locals: &IndexSlice<LocalId, [Local]>,
        abort: LabelId,
    ) -> Self {
        let locals = locals.iter().map(|_| emitter.allocate_memory(constants::WORD_SIZE)).collect();
        Self { contract, emitter, name, locals, frames: Vec::new(), abort, return_to: None }
    }

    pub(crate) fn local_address(&self, local: LocalId) -> Result<MemoryAddress> {
        self.locals
            .get(local)
            .copied()
            .ok_or_else(|| CodegenError::InvalidIr(format!("unknown local {local} in `{}`", self.name)))
    }

    /// Points every string or bytes local from `first` on at the empty value, so reads on paths
    /// that never assigned it see `""` instead of scratch memory.
    fn init_dynamic_locals(&mut self, locals: &IndexSlice<LocalId, [Local]>, first: usize) -> Result<()> {
        for (local, decl) in locals.iter_enumerated().skip(first) {
            if decl.ty.is_dynamic() {
                let address = self.local_address(local)?;
                self.emitter.push_u32(constants::ZERO_SLOT)?;
                self.emitter.push_u32(address)?;
                self.emitter.op(Opcode::MSTORE)?;
            }
        }
        Ok(())
    }

    fn translate_body(&mut self, body: &[Stmt]) -> Result<()> {
        for stmt in body {
            self.translate_stmt(stmt)?;
        }
        if !self.frames.is_empty() {
            return Err(CodegenError::DanglingControlFrames {
                function: self.name.to_string(),
                open: self.frames.len(),
            });
        }
        Ok(())
    }

    fn push_frame(&mut self, kind: FrameKind, otherwise: LabelId, join: LabelId) {
        self.frames.push(ControlFrame { kind, otherwise, join });
    }

    fn pop_frame(&mut self, kind: FrameKind) -> Result<ControlFrame> {
        match self.frames.pop() {
            Some(frame) if frame.kind == kind => Ok(frame),
            _ => Err(CodegenError::InvalidIr(format!("unbalanced control flow in `{}`", self.name))),
        }
    }

    fn innermost_loop(&self) -> Result<ControlFrame> {
        self.frames.iter().rev().find(|frame| frame.kind == FrameKind::Loop).copied().ok_or_else(
            || CodegenError::InvalidIr(format!("loop control outside of a loop in `{}`", self.name)),
        )
    }
}

/// Emits an external function, entered with its selector still on the stack at `entry`.
pub(crate) fn translate_function(
    contract: &ContractDefinition,
    emitter: &mut Emitter,
    function: &Function,
    entry: LabelId,
    abort: LabelId,
) -> Result<()> {
    let signature = &function.signature;
    log::trace!("translating `{}`", signature.canonical());

    emitter.mark_jumpdest(entry)?;
    emitter.op(Opcode::POP)?;
    emitter.begin_function();

    if signature.mutability != Mutability::Payable {
        emitter.op(Opcode::CALLVALUE)?;
        emitter.jump_if(abort)?;
    }
    if !signature.params.is_empty() {
        emitter.push_u32(abi::ARGS_START + constants::WORD_SIZE * signature.params.len() as u32)?;
        emitter.ops(&[Opcode::CALLDATASIZE, Opcode::LT])?;
        emitter.jump_if(abort)?;
    }
    emitter.init_heap()?;

    let mut translator = Translator::new(contract, emitter, &signature.name, &function.locals, abort);
    for (index, param) in signature.params.iter().enumerate() {
        abi::decode_param(translator.emitter, index, &param.ty)?;
        let address = translator.local_address(LocalId::new(index as u32))?;
        translator.emitter.push_u32(address)?;
        translator.emitter.op(Opcode::MSTORE)?;
    }
    translator.init_dynamic_locals(&function.locals, signature.params.len())?;
    translator.translate_body(&function.body)?;

    if translator.emitter.is_reachable() {
        match &signature.returns {
            Some(ty) => {
                abi::push_zero_value(translator.emitter, ty)?;
                abi::return_value(translator.emitter, ty)?;
            }
            None => translator.emitter.op(Opcode::STOP)?,
        }
    }
    emitter.link_function()
}

/// Emits the constructor body; falling off the end or a bare `return` continues at `deploy`.
pub(crate) fn translate_constructor(
    contract: &ContractDefinition,
    emitter: &mut Emitter,
    constructor: &Constructor,
    deploy: LabelId,
    abort: LabelId,
) -> Result<()> {
    let mut translator = Translator::new(contract, emitter, "__init__", &constructor.locals, abort);
    translator.return_to = Some(deploy);
    translator.init_dynamic_locals(&constructor.locals, 0)?;
    translator.translate_body(&constructor.body)?;
    if translator.emitter.is_reachable() {
        translator.emitter.jump(deploy)?;
    }
    Ok(())
}
