//! Error types for code generation

use crate::{emitter::LabelId, selector::Selector};
use thiserror::Error;

/// Error type for code generation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("stack underflow at {opcode}: needs {required} item(s), {available} available")]
    StackUnderflow { opcode: String, required: usize, available: usize },

    #[error("stack depth {depth} exceeds the 1024 item limit")]
    StackOverflow { depth: usize },

    /// Two paths reach the same label with different stack depths.
    #[error("stack depth mismatch at label {label}: expected {expected}, found {found}")]
    StackMismatch { label: LabelId, expected: usize, found: usize },

    #[error("label {label} bound more than once")]
    LabelRebound { label: LabelId },

    #[error("label {label} is referenced but never bound")]
    UnresolvedLabel { label: LabelId },

    #[error("jump to label {label}, which is not a jump destination")]
    InvalidJumpTarget { label: LabelId },

    #[error("offset {offset:#x} does not fit in a two byte operand")]
    OffsetTooLarge { offset: u32 },

    #[error("selector {selector} is shared by `{first}` and `{second}`")]
    SelectorCollision { selector: Selector, first: String, second: String },

    #[error("{open} control frame(s) left open at the end of `{function}`")]
    DanglingControlFrames { function: String, open: usize },

    #[error("{opcode} is outside the generator's instruction set")]
    UnsupportedOpcode { opcode: String },

    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("invalid IR: {0}")]
    InvalidIr(String),
}

/// Result type for code generation operations
pub type Result<T> = std::result::Result<T, CodegenError>;
