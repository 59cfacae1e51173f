//! Instruction buffer with symbolic labels.
//!
//! Jump targets are emitted as two byte placeholders and patched once every label is bound, so a
//! forward jump costs the same as a backward one. The emitter also tracks the operand stack depth
//! along straight-line code and checks that every path into a label agrees on it.

use crate::{
    error::{CodegenError, Result},
    memory::{MemoryAddress, constants, word_aligned},
    opcode::{Opcode, OpcodeExt, push_opcode, push_operand},
};
use alloy_primitives::U256;
use cobra_data::{IndexVec, newtype_index};
use evm_glue::{assembler::assemble_minimized, assembly::Asm};

newtype_index! {
    pub struct LabelId;
}

/// EVM stack limit.
pub const MAX_STACK_DEPTH: usize = 1024;

/// Largest offset a two byte jump operand can address.
const MAX_OFFSET: u32 = 0xffff;

#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
}

impl Instruction {
    pub fn size(&self) -> u32 {
        self.opcode.size()
    }
}

#[derive(Debug, Clone)]
struct LabelState {
    offset: Option<u32>,
    depth: Option<usize>,
    /// Function the label was created in, `0` outside of any function.
    scope: u32,
    jumpdest: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fixup {
    /// Operand of a `JUMP`/`JUMPI`; the label must be a `JUMPDEST`.
    Jump(LabelId),
    /// Plain code offset, e.g. for `CODECOPY`.
    Offset(LabelId),
    /// First heap byte of the current function, known once its static memory is final.
    HeapBase,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    instruction: usize,
    fixup: Fixup,
    scope: u32,
}

#[derive(Debug, Clone)]
pub struct Emitter {
    instructions: Vec<Instruction>,
    offset: u32,
    labels: IndexVec<LabelId, LabelState>,
    pending: Vec<Pending>,
    depth: usize,
    reachable: bool,
    scope: u32,
    next_scope: u32,
    memory_top: MemoryAddress,
}

impl Default for Emitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            offset: 0,
            labels: IndexVec::new(),
            pending: Vec::new(),
            depth: 0,
            reachable: true,
            scope: 0,
            next_scope: 1,
            memory_top: constants::STATIC_START,
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Byte offset of the next instruction.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable
    }

    pub fn new_label(&mut self) -> LabelId {
        self.labels.push(LabelState { offset: None, depth: None, scope: self.scope, jumpdest: false })
    }

    /// Binds `label` to the current offset without emitting anything.
    pub fn mark(&mut self, label: LabelId) -> Result<()> {
        let state = &self.labels[label];
        if state.offset.is_some() {
            return Err(CodegenError::LabelRebound { label });
        }
        if self.reachable {
            self.merge_depth(label, self.depth)?;
        } else if let Some(depth) = state.depth {
            self.depth = depth;
        } else {
            self.labels[label].depth = Some(self.depth);
        }
        self.labels[label].offset = Some(self.offset);
        self.reachable = true;
        Ok(())
    }

    /// Binds `label` and emits the `JUMPDEST` it points at.
    pub fn mark_jumpdest(&mut self, label: LabelId) -> Result<()> {
        self.mark(label)?;
        self.labels[label].jumpdest = true;
        self.op(Opcode::JUMPDEST)
    }

    pub fn jump(&mut self, label: LabelId) -> Result<()> {
        self.push_placeholder(Fixup::Jump(label))?;
        self.op(Opcode::JUMP)?;
        self.merge_depth(label, self.depth)
    }

    /// Jumps to `label` when the top of the stack is non-zero, consuming it.
    pub fn jump_if(&mut self, label: LabelId) -> Result<()> {
        self.push_placeholder(Fixup::Jump(label))?;
        self.op(Opcode::JUMPI)?;
        self.merge_depth(label, self.depth)
    }

    /// Pushes the code offset of `label`.
    pub fn push_label(&mut self, label: LabelId) -> Result<()> {
        self.push_placeholder(Fixup::Offset(label))
    }

    /// Pushes `value` with the narrowest `PUSHn`, `PUSH0` for zero.
    pub fn push(&mut self, value: U256) -> Result<()> {
        let bytes = value.to_be_bytes_trimmed_vec();
        let opcode = push_opcode(&bytes)
            .ok_or_else(|| CodegenError::InvalidIr(format!("{}-byte push operand", bytes.len())))?;
        self.emit(Instruction { opcode })
    }

    pub fn push_u32(&mut self, value: u32) -> Result<()> {
        self.push(U256::from(value))
    }

    /// Pushes 32 raw bytes, used for text chunks and revert selectors.
    pub fn push_word(&mut self, word: [u8; 32]) -> Result<()> {
        self.push(U256::from_be_bytes(word))
    }

    pub fn op(&mut self, opcode: Opcode) -> Result<()> {
        debug_assert!(push_operand(&opcode).is_none(), "pushes go through `push`");
        self.emit(Instruction { opcode })
    }

    pub fn ops(&mut self, opcodes: &[Opcode]) -> Result<()> {
        opcodes.iter().try_for_each(|opcode| self.op(opcode.clone()))
    }

    /// Reserves `size` bytes of static memory for the current function.
    pub fn allocate_memory(&mut self, size: u32) -> MemoryAddress {
        let address = self.memory_top;
        self.memory_top += word_aligned(size);
        address
    }

    /// End of the static region allocated so far.
    pub fn memory_top(&self) -> MemoryAddress {
        self.memory_top
    }

    /// Starts a new function: fresh label scope and empty static memory.
    pub fn begin_function(&mut self) {
        self.scope = self.next_scope;
        self.next_scope += 1;
        self.memory_top = constants::STATIC_START;
    }

    /// Points the free memory pointer just past the function's static region.
    pub fn init_heap(&mut self) -> Result<()> {
        self.push_placeholder(Fixup::HeapBase)?;
        self.push_u32(constants::FREE_MEM_PTR)?;
        self.op(Opcode::MSTORE)
    }

    /// Resolves references to the current function's labels and its heap base, then closes its
    /// scope. References to labels outside the function wait for [`Emitter::finish`].
    pub fn link_function(&mut self) -> Result<()> {
        let scope = self.scope;
        let labels = &self.labels;
        let (local, rest): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|pending| match pending.fixup {
                Fixup::Jump(label) | Fixup::Offset(label) => labels[label].scope == scope,
                Fixup::HeapBase => pending.scope == scope,
            });
        self.pending = rest;
        for pending in local {
            self.resolve(pending)?;
        }
        self.scope = 0;
        Ok(())
    }

    /// Resolves all remaining fixups and assembles the bytecode.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        for pending in std::mem::take(&mut self.pending) {
            self.resolve(pending)?;
        }
        let asm: Vec<Asm> =
            self.instructions.into_iter().map(|instruction| Asm::Op(instruction.opcode)).collect();
        let (_, code) = assemble_minimized(&asm, true)
            .map_err(|err| CodegenError::Assembly(format!("{err:?}")))?;
        if code.len() != self.offset as usize {
            return Err(CodegenError::Assembly(format!(
                "assembled {} bytes, laid out {}",
                code.len(),
                self.offset
            )));
        }
        Ok(code)
    }

    fn resolve(&mut self, pending: Pending) -> Result<()> {
        let value = match pending.fixup {
            Fixup::Jump(label) | Fixup::Offset(label) => {
                let state = &self.labels[label];
                let offset = state.offset.ok_or(CodegenError::UnresolvedLabel { label })?;
                if matches!(pending.fixup, Fixup::Jump(_)) && !state.jumpdest {
                    return Err(CodegenError::InvalidJumpTarget { label });
                }
                offset
            }
            Fixup::HeapBase => self.memory_top,
        };
        if value > MAX_OFFSET {
            return Err(CodegenError::OffsetTooLarge { offset: value });
        }
        self.instructions[pending.instruction].opcode = Opcode::PUSH2((value as u16).to_be_bytes());
        Ok(())
    }

    fn push_placeholder(&mut self, fixup: Fixup) -> Result<()> {
        self.pending.push(Pending { instruction: self.instructions.len(), fixup, scope: self.scope });
        self.emit(Instruction { opcode: Opcode::PUSH2([0, 0]) })
    }

    fn merge_depth(&mut self, label: LabelId, depth: usize) -> Result<()> {
        match self.labels[label].depth {
            Some(expected) if expected != depth => {
                Err(CodegenError::StackMismatch { label, expected, found: depth })
            }
            Some(_) => Ok(()),
            None => {
                self.labels[label].depth = Some(depth);
                Ok(())
            }
        }
    }

    fn emit(&mut self, instruction: Instruction) -> Result<()> {
        let opcode = &instruction.opcode;
        let Some((inputs, outputs)) = opcode.stack_io() else {
            return Err(CodegenError::UnsupportedOpcode { opcode: opcode.mnemonic() });
        };
        if self.depth < inputs {
            return Err(CodegenError::StackUnderflow {
                opcode: opcode.mnemonic(),
                required: inputs,
                available: self.depth,
            });
        }
        self.depth = self.depth - inputs + outputs;
        if self.depth > MAX_STACK_DEPTH {
            return Err(CodegenError::StackOverflow { depth: self.depth });
        }
        let terminator = opcode.is_terminator();
        self.offset += instruction.size();
        self.instructions.push(instruction);
        if terminator {
            self.reachable = false;
        }
        Ok(())
    }
}
