//! Reference ABI encoding for building calldata and reading results in tests.

use revm::primitives::{Address, U256, keccak256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256),
    Address(Address),
    Bool(bool),
    Bytes(Vec<u8>),
    String(String),
}

impl AbiValue {
    pub fn uint(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes(_) | Self::String(_))
    }

    fn head_word(&self) -> [u8; 32] {
        match self {
            Self::Uint(value) => value.to_be_bytes::<32>(),
            Self::Address(address) => address.into_word().0,
            Self::Bool(value) => U256::from(*value as u8).to_be_bytes::<32>(),
            Self::Bytes(_) | Self::String(_) => unreachable!("dynamic values have no inline head"),
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::String(text) => text.as_bytes(),
            _ => &[],
        }
    }
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_call(signature: &str, args: &[AbiValue]) -> Vec<u8> {
    let mut calldata = selector(signature).to_vec();
    calldata.extend(encode_tuple(args));
    calldata
}

pub fn encode_tuple(values: &[AbiValue]) -> Vec<u8> {
    let mut head = Vec::new();
    let mut tail = Vec::new();
    let head_size = 32 * values.len();
    for value in values {
        if value.is_dynamic() {
            head.extend(U256::from(head_size + tail.len()).to_be_bytes::<32>());
            let payload = value.payload();
            tail.extend(U256::from(payload.len()).to_be_bytes::<32>());
            tail.extend(payload);
            tail.resize(tail.len() + (32 - payload.len() % 32) % 32, 0);
        } else {
            head.extend(value.head_word());
        }
    }
    head.extend(tail);
    head
}

/// Word at `index` of the return data.
pub fn decode_word(output: &[u8], index: usize) -> U256 {
    U256::from_be_slice(&output[32 * index..32 * (index + 1)])
}

/// Dynamic value whose head is at word `index`.
pub fn decode_bytes(output: &[u8], index: usize) -> Vec<u8> {
    let offset = decode_word(output, index).to::<usize>();
    let len = U256::from_be_slice(&output[offset..offset + 32]).to::<usize>();
    output[offset + 32..offset + 32 + len].to_vec()
}

pub fn decode_string(output: &[u8], index: usize) -> String {
    String::from_utf8(decode_bytes(output, index)).expect("utf-8 string")
}

/// Reason of an `Error(string)` revert, `None` for any other revert data.
pub fn decode_revert_reason(output: &[u8]) -> Option<String> {
    if output.len() < 4 || output[..4] != selector("Error(string)") {
        return None;
    }
    Some(decode_string(&output[4..], 0))
}
