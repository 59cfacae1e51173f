//! Storage slot derivation for mappings and fixed arrays.
//!
//! A mapping entry lives at `keccak256(pad32(key) ++ pad32(base))`, the same slots Solidity uses.
//! A fixed array of `n` elements takes `n` consecutive slots from its base.

use crate::{
    abi,
    emitter::Emitter,
    error::Result,
    memory::constants,
    opcode::Opcode::{ADD, DUP2, LT, MSTORE, SHA3},
};
use alloy_primitives::{U256, keccak256};

/// Where the slot being indexed comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotBase {
    /// Slot known at compile time, a top-level mapping field.
    Static(U256),
    /// Slot computed by the previous level of a nested mapping, below the key on the stack.
    OnStack,
}

/// `[key]` (or `[base key]` for [`SlotBase::OnStack`]) -> `[slot]`
pub fn mapping_slot_code(emitter: &mut Emitter, base: SlotBase) -> Result<()> {
    emitter.push_u32(constants::SCRATCH_START)?;
    emitter.op(MSTORE)?;
    if let SlotBase::Static(slot) = base {
        emitter.push(slot)?;
    }
    emitter.push_u32(constants::SCRATCH_SECOND_WORD)?;
    emitter.op(MSTORE)?;
    emitter.push_u32(2 * constants::WORD_SIZE)?;
    emitter.push_u32(constants::SCRATCH_START)?;
    emitter.op(SHA3)
}

/// `[index]` -> `[base + index]`, reverting when `index >= len`.
pub fn array_slot_code(emitter: &mut Emitter, base: U256, len: u32) -> Result<()> {
    let in_bounds = emitter.new_label();
    emitter.push_u32(len)?;
    emitter.ops(&[DUP2, LT])?;
    emitter.jump_if(in_bounds)?;
    abi::revert_empty(emitter)?;
    emitter.mark_jumpdest(in_bounds)?;
    emitter.push(base)?;
    emitter.op(ADD)
}

/// Slot of a mapping entry computed at compile time, for tests and tooling.
pub fn mapping_slot(key: U256, base: U256) -> U256 {
    let mut preimage = [0u8; 64];
    preimage[..32].copy_from_slice(&key.to_be_bytes::<32>());
    preimage[32..].copy_from_slice(&base.to_be_bytes::<32>());
    U256::from_be_bytes(keccak256(preimage).0)
}
