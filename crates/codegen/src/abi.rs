//! Code for the Solidity ABI: argument decoding, return and event encoding, revert reasons.
//!
//! A dynamic value lives in memory as a length word followed by its bytes, zero padded to a
//! whole word. Values on the stack are pointers to that length word.

use crate::{
    emitter::Emitter,
    error::Result,
    memory::{MemoryAddress, constants, word_aligned},
    opcode::Opcode::{self, *},
};
use cobra_data::InterfaceType;

/// Selector of `Error(string)`.
pub const ERROR_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Offset of the first argument in calldata.
pub const ARGS_START: u32 = 4;

const WORD: u32 = constants::WORD_SIZE;

/// [size] -> [size rounded up to whole words]
fn round_up_to_word(emitter: &mut Emitter) -> Result<()> {
    emitter.push_u32(WORD - 1)?;
    emitter.op(ADD)?;
    emitter.push_u32(WORD - 1)?;
    emitter.ops(&[NOT, AND])
}

/// Bump allocates on the heap. [size] -> [pointer]; `size` must be word aligned.
pub fn heap_alloc(emitter: &mut Emitter) -> Result<()> {
    emitter.push_u32(constants::FREE_MEM_PTR)?;
    emitter.ops(&[MLOAD, DUP1, SWAP2, ADD])?;
    emitter.push_u32(constants::FREE_MEM_PTR)?;
    emitter.op(MSTORE)
}

/// Reads argument `index` of type `ty` from calldata onto the stack.
pub fn decode_param(emitter: &mut Emitter, index: usize, ty: &InterfaceType) -> Result<()> {
    emitter.push_u32(ARGS_START + WORD * index as u32)?;
    emitter.op(CALLDATALOAD)?;
    match ty {
        InterfaceType::Bool => emitter.ops(&[ISZERO, ISZERO]),
        _ if ty.is_dynamic() => decode_dynamic(emitter),
        _ => Ok(()),
    }
}

/// [offset] -> [pointer], copying the length-prefixed payload at `offset` into the heap.
fn decode_dynamic(emitter: &mut Emitter) -> Result<()> {
    emitter.push_u32(ARGS_START)?;
    emitter.op(ADD)?;
    // [start len]
    emitter.ops(&[DUP1, CALLDATALOAD])?;
    emitter.op(DUP1)?;
    round_up_to_word(emitter)?;
    emitter.push_u32(WORD)?;
    emitter.op(ADD)?;
    heap_alloc(emitter)?;
    // [start ptr], with the length stored at ptr
    emitter.ops(&[SWAP1, DUP2, MSTORE])?;
    emitter.ops(&[DUP1, MLOAD])?;
    round_up_to_word(emitter)?;
    emitter.op(DUP3)?;
    emitter.push_u32(WORD)?;
    emitter.op(ADD)?;
    emitter.op(DUP3)?;
    emitter.push_u32(WORD)?;
    emitter.op(ADD)?;
    emitter.op(CALLDATACOPY)?;
    emitter.ops(&[SWAP1, POP])
}

/// Encodes the values held in consecutive words starting at `block` as a tuple of `types`,
/// leaving `[size offset]` ready for `RETURN` or `LOGn`.
pub fn encode_tuple(emitter: &mut Emitter, block: MemoryAddress, types: &[InterfaceType]) -> Result<()> {
    let head_size = WORD * types.len() as u32;
    if types.iter().all(InterfaceType::is_static) {
        emitter.push_u32(head_size)?;
        return emitter.push_u32(block);
    }

    let base = emitter.allocate_memory(WORD);
    let tail = emitter.allocate_memory(WORD);
    let load = |emitter: &mut Emitter, address: MemoryAddress| -> Result<()> {
        emitter.push_u32(address)?;
        emitter.op(MLOAD)
    };
    let store = |emitter: &mut Emitter, address: MemoryAddress| -> Result<()> {
        emitter.push_u32(address)?;
        emitter.op(MSTORE)
    };

    load(emitter, constants::FREE_MEM_PTR)?;
    store(emitter, base)?;
    emitter.push_u32(head_size)?;
    store(emitter, tail)?;

    for (i, ty) in types.iter().enumerate() {
        let value = block + WORD * i as u32;
        let head_word = |emitter: &mut Emitter| -> Result<()> {
            load(emitter, base)?;
            emitter.push_u32(WORD * i as u32)?;
            emitter.op(ADD)?;
            emitter.op(MSTORE)
        };
        if ty.is_static() {
            load(emitter, value)?;
            head_word(emitter)?;
            continue;
        }
        load(emitter, tail)?;
        head_word(emitter)?;
        // [total]: length word plus padded payload
        load(emitter, value)?;
        emitter.op(MLOAD)?;
        round_up_to_word(emitter)?;
        emitter.push_u32(WORD)?;
        emitter.op(ADD)?;
        emitter.op(DUP1)?;
        load(emitter, value)?;
        load(emitter, tail)?;
        load(emitter, base)?;
        emitter.ops(&[ADD, MCOPY])?;
        load(emitter, tail)?;
        emitter.op(ADD)?;
        store(emitter, tail)?;
    }

    load(emitter, tail)?;
    load(emitter, base)?;
    emitter.op(ADD)?;
    store(emitter, constants::FREE_MEM_PTR)?;
    load(emitter, tail)?;
    load(emitter, base)
}

/// Returns the value on top of the stack, ABI encoded.
pub fn return_value(emitter: &mut Emitter, ty: &InterfaceType) -> Result<()> {
    if ty.is_static() {
        emitter.push_u32(constants::SCRATCH_START)?;
        emitter.op(MSTORE)?;
        emitter.push_u32(WORD)?;
        emitter.push_u32(constants::SCRATCH_START)?;
        return emitter.op(RETURN);
    }
    let block = emitter.allocate_memory(WORD);
    emitter.push_u32(block)?;
    emitter.op(MSTORE)?;
    encode_tuple(emitter, block, std::slice::from_ref(ty))?;
    emitter.op(RETURN)
}

/// Pushes the zero value of `ty`: `0` for static types, the empty string pointer otherwise.
pub fn push_zero_value(emitter: &mut Emitter, ty: &InterfaceType) -> Result<()> {
    if ty.is_dynamic() { emitter.push_u32(constants::ZERO_SLOT) } else { emitter.push_u32(0) }
}

/// Writes `bytes` as a length-prefixed value at the pointer on top of the stack, keeping it there.
pub fn store_bytes(emitter: &mut Emitter, bytes: &[u8]) -> Result<()> {
    emitter.push_u32(bytes.len() as u32)?;
    emitter.ops(&[DUP2, MSTORE])?;
    for (i, chunk) in bytes.chunks(WORD as usize).enumerate() {
        emitter.push_word(word_from_chunk(chunk))?;
        emitter.op(DUP2)?;
        emitter.push_u32(WORD * (i as u32 + 1))?;
        emitter.ops(&[ADD, MSTORE])?;
    }
    Ok(())
}

/// Pushes a pointer to a fresh heap copy of `bytes`.
pub fn push_text(emitter: &mut Emitter, bytes: &[u8]) -> Result<()> {
    if bytes.is_empty() {
        return emitter.push_u32(constants::ZERO_SLOT);
    }
    emitter.push_u32(WORD + word_aligned(bytes.len() as u32))?;
    heap_alloc(emitter)?;
    store_bytes(emitter, bytes)
}

/// Reverts with `Error(reason)`, the payload built in a static buffer.
pub fn revert_with_reason(emitter: &mut Emitter, reason: &str) -> Result<()> {
    let bytes = reason.as_bytes();
    let size = 4 + 2 * WORD + word_aligned(bytes.len() as u32);
    let buffer = emitter.allocate_memory(size);

    let mut selector_word = [0u8; 32];
    selector_word[..4].copy_from_slice(&ERROR_SELECTOR);
    emitter.push_word(selector_word)?;
    store_at(emitter, buffer)?;
    emitter.push_u32(WORD)?;
    store_at(emitter, buffer + 4)?;
    emitter.push_u32(bytes.len() as u32)?;
    store_at(emitter, buffer + 4 + WORD)?;
    for (i, chunk) in bytes.chunks(WORD as usize).enumerate() {
        emitter.push_word(word_from_chunk(chunk))?;
        store_at(emitter, buffer + 4 + WORD * (i as u32 + 2))?;
    }
    emitter.push_u32(size)?;
    emitter.push_u32(buffer)?;
    emitter.op(REVERT)
}

/// Reverts with empty data.
pub fn revert_empty(emitter: &mut Emitter) -> Result<()> {
    emitter.push_u32(0)?;
    emitter.push_u32(0)?;
    emitter.op(Opcode::REVERT)
}

fn store_at(emitter: &mut Emitter, address: MemoryAddress) -> Result<()> {
    emitter.push_u32(address)?;
    emitter.op(MSTORE)
}

fn word_from_chunk(chunk: &[u8]) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[..chunk.len()].copy_from_slice(chunk);
    word
}
