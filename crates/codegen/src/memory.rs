//! Memory layout of generated code
//!
//! - `0x00-0x3f`: scratch space for hashing mapping keys
//! - `0x40-0x5f`: free memory pointer, the next unused heap byte
//! - `0x60-0x7f`: zero word; a pointer to it is the empty string
//! - `0x80+`: static allocations (locals, temporaries, revert buffers), fixed per function
//! - after the static region: heap for dynamic values, bump allocated

/// Type alias for EVM memory addresses
pub type MemoryAddress = u32;

pub mod constants {
    use super::MemoryAddress;

    pub const SCRATCH_START: MemoryAddress = 0x00;
    pub const SCRATCH_SECOND_WORD: MemoryAddress = 0x20;
    pub const FREE_MEM_PTR: MemoryAddress = 0x40;
    pub const ZERO_SLOT: MemoryAddress = 0x60;
    pub const STATIC_START: MemoryAddress = 0x80;
    pub const WORD_SIZE: MemoryAddress = 0x20;
}

/// Rounds `size` up to a whole number of words.
pub fn word_aligned(size: u32) -> u32 {
    size.div_ceil(constants::WORD_SIZE) * constants::WORD_SIZE
}
