//! Value types visible at the contract interface and in storage.

use std::fmt;

/// Closed set of types a contract may declare.
///
/// `UInt256`, `Address` and `Bool` are single-word values. `Bytes` and `String` are dynamic:
/// at runtime they are a memory pointer to a length word followed by the padded payload.
/// `Mapping` and `FixedArray` only exist in storage and can never be used as values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InterfaceType {
    UInt256,
    Address,
    Bool,
    Bytes,
    String,
    Mapping(Box<InterfaceType>, Box<InterfaceType>),
    FixedArray(Box<InterfaceType>, u32),
}

impl InterfaceType {
    pub fn mapping(key: InterfaceType, value: InterfaceType) -> Self {
        Self::Mapping(Box::new(key), Box::new(value))
    }

    pub fn fixed_array(element: InterfaceType, len: u32) -> Self {
        Self::FixedArray(Box::new(element), len)
    }

    /// Fits in a single 32-byte word.
    pub fn is_static(&self) -> bool {
        matches!(self, Self::UInt256 | Self::Address | Self::Bool)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Bytes | Self::String)
    }

    /// Can be held in a local, passed as an argument or returned.
    pub fn is_value(&self) -> bool {
        self.is_static() || self.is_dynamic()
    }

    /// Number of consecutive storage slots a field of this type reserves.
    pub fn slot_span(&self) -> u32 {
        match self {
            Self::FixedArray(_, len) => *len,
            _ => 1,
        }
    }

    /// Canonical name used in call and event signatures.
    pub fn abi_name(&self) -> String {
        match self {
            Self::UInt256 => "uint256".into(),
            Self::Address => "address".into(),
            Self::Bool => "bool".into(),
            Self::Bytes => "bytes".into(),
            Self::String => "string".into(),
            Self::FixedArray(element, len) => format!("{}[{len}]", element.abi_name()),
            Self::Mapping(key, value) => {
                format!("mapping({} => {})", key.abi_name(), value.abi_name())
            }
        }
    }
}

impl fmt::Display for InterfaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.abi_name())
    }
}
