//! Function selectors and event topics.

use crate::error::{CodegenError, Result};
use alloy_primitives::{B256, keccak256};
use serde::{Serialize, Serializer};
use std::{collections::HashMap, fmt};

/// First four bytes of the keccak-256 hash of a canonical signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    pub fn as_u32(self) -> u32 {
        u32::from_be_bytes(self.0)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.as_u32())
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    Selector([hash[0], hash[1], hash[2], hash[3]])
}

/// `topic0` of a log emitted for the event with this signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// Selectors of `signatures` in order, rejecting any two that hash to the same selector.
pub fn ensure_unique<'a>(signatures: impl IntoIterator<Item = &'a str>) -> Result<Vec<Selector>> {
    let mut seen: HashMap<Selector, &str> = HashMap::new();
    let mut selectors = Vec::new();
    for signature in signatures {
        let selector = selector(signature);
        if let Some(first) = seen.insert(selector, signature) {
            return Err(CodegenError::SelectorCollision {
                selector,
                first: first.to_string(),
                second: signature.to_string(),
            });
        }
        selectors.push(selector);
    }
    Ok(selectors)
}
