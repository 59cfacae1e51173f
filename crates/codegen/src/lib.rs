//! EVM bytecode generator for analyzed contracts
//!
//! Turns a [`ContractDefinition`](cobra_data::ContractDefinition) into deployment code, runtime
//! code and an interface descriptor. The generated code follows the Solidity ABI: calls are
//! routed by 4-byte selector, arguments and return values use the standard head/tail encoding,
//! mapping entries live at `keccak256(key ++ slot)` and failed requirements revert with
//! `Error(string)` when they carry a reason.
//!
//! ## Memory Layout
//! - `0x00-0x3F`: scratch space for hashing mapping keys
//! - `0x40`: free memory pointer
//! - `0x60`: zero word, the empty dynamic value
//! - `0x80+`: locals and temporaries of the running function
//! - after that: heap for strings and byte arrays

pub mod abi;
pub mod emitter;
mod error;
pub mod interface;
pub mod memory;
pub mod opcode;
mod program;
pub mod selector;
pub mod storage;
mod translator;

#[cfg(test)]
mod tests;

pub use emitter::{Emitter, LabelId};
pub use error::{CodegenError, Result};
pub use interface::{EventEntry, FunctionEntry, InterfaceDescriptor, ParamEntry};
pub use program::{Artifact, creation_code, generate, runtime_code};
pub use selector::{Selector, event_topic, selector};
