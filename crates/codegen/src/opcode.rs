//! Stack effects and push helpers for the `evm_glue` opcodes the generator emits.

pub use evm_glue::opcodes::Opcode;

macro_rules! push_opcodes {
    ($($width:literal => $variant:ident),* $(,)?) => {
        /// The `PUSHn` carrying `operand`, `PUSH0` when it is empty. `None` past 32 bytes.
        pub fn push_opcode(operand: &[u8]) -> Option<Opcode> {
            match operand.len() {
                0 => Some(Opcode::PUSH0),
                $($width => operand.try_into().ok().map(Opcode::$variant),)*
                _ => None,
            }
        }

        /// Immediate bytes of a push, `None` for every other opcode.
        pub fn push_operand(opcode: &Opcode) -> Option<&[u8]> {
            match opcode {
                Opcode::PUSH0 => Some(&[][..]),
                $(Opcode::$variant(bytes) => Some(&bytes[..]),)*
                _ => None,
            }
        }
    };
}

push_opcodes! {
    1 => PUSH1, 2 => PUSH2, 3 => PUSH3, 4 => PUSH4, 5 => PUSH5, 6 => PUSH6, 7 => PUSH7,
    8 => PUSH8, 9 => PUSH9, 10 => PUSH10, 11 => PUSH11, 12 => PUSH12, 13 => PUSH13,
    14 => PUSH14, 15 => PUSH15, 16 => PUSH16, 17 => PUSH17, 18 => PUSH18, 19 => PUSH19,
    20 => PUSH20, 21 => PUSH21, 22 => PUSH22, 23 => PUSH23, 24 => PUSH24, 25 => PUSH25,
    26 => PUSH26, 27 => PUSH27, 28 => PUSH28, 29 => PUSH29, 30 => PUSH30, 31 => PUSH31,
    32 => PUSH32,
}

macro_rules! stack_window {
    ($name:ident: $($depth:literal => $variant:ident),* $(,)?) => {
        fn $name(opcode: &Opcode) -> Option<usize> {
            match opcode {
                $(Opcode::$variant => Some($depth),)*
                _ => None,
            }
        }
    };
}

stack_window! { dup_depth:
    1 => DUP1, 2 => DUP2, 3 => DUP3, 4 => DUP4, 5 => DUP5, 6 => DUP6, 7 => DUP7, 8 => DUP8,
    9 => DUP9, 10 => DUP10, 11 => DUP11, 12 => DUP12, 13 => DUP13, 14 => DUP14, 15 => DUP15,
    16 => DUP16,
}

stack_window! { swap_depth:
    1 => SWAP1, 2 => SWAP2, 3 => SWAP3, 4 => SWAP4, 5 => SWAP5, 6 => SWAP6, 7 => SWAP7,
    8 => SWAP8, 9 => SWAP9, 10 => SWAP10, 11 => SWAP11, 12 => SWAP12, 13 => SWAP13,
    14 => SWAP14, 15 => SWAP15, 16 => SWAP16,
}

/// Static facts the emitter needs about an opcode.
pub trait OpcodeExt {
    /// Items popped and pushed, `None` for opcodes the generator never emits.
    fn stack_io(&self) -> Option<(usize, usize)>;

    /// Execution never continues with the next instruction.
    fn is_terminator(&self) -> bool;

    /// Encoded size in bytes, immediate included.
    fn size(&self) -> u32;

    fn mnemonic(&self) -> String;
}

impl OpcodeExt for Opcode {
    fn stack_io(&self) -> Option<(usize, usize)> {
        let io = match self {
            Opcode::STOP | Opcode::JUMPDEST | Opcode::INVALID => (0, 0),
            Opcode::ADD
            | Opcode::MUL
            | Opcode::SUB
            | Opcode::DIV
            | Opcode::MOD
            | Opcode::EXP
            | Opcode::LT
            | Opcode::GT
            | Opcode::EQ
            | Opcode::AND
            | Opcode::OR
            | Opcode::XOR
            | Opcode::SHL
            | Opcode::SHR
            | Opcode::SHA3 => (2, 1),
            Opcode::ISZERO | Opcode::NOT | Opcode::CALLDATALOAD | Opcode::MLOAD | Opcode::SLOAD => {
                (1, 1)
            }
            Opcode::CALLER | Opcode::CALLVALUE | Opcode::CALLDATASIZE | Opcode::TIMESTAMP => (0, 1),
            Opcode::CALLDATACOPY | Opcode::CODECOPY | Opcode::MCOPY => (3, 0),
            Opcode::POP | Opcode::JUMP => (1, 0),
            Opcode::MSTORE | Opcode::SSTORE | Opcode::JUMPI | Opcode::RETURN | Opcode::REVERT => {
                (2, 0)
            }
            Opcode::LOG0 => (2, 0),
            Opcode::LOG1 => (3, 0),
            Opcode::LOG2 => (4, 0),
            Opcode::LOG3 => (5, 0),
            Opcode::LOG4 => (6, 0),
            other => {
                if push_operand(other).is_some() {
                    (0, 1)
                } else if let Some(n) = dup_depth(other) {
                    (n, n + 1)
                } else if let Some(n) = swap_depth(other) {
                    (n + 1, n + 1)
                } else {
                    return None;
                }
            }
        };
        Some(io)
    }

    fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::STOP | Opcode::JUMP | Opcode::RETURN | Opcode::REVERT | Opcode::INVALID
        )
    }

    fn size(&self) -> u32 {
        1 + push_operand(self).map_or(0, |operand| operand.len() as u32)
    }

    fn mnemonic(&self) -> String {
        let debug = format!("{self:?}");
        match debug.split_once('(') {
            Some((name, _)) => name.to_string(),
            None => debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_selection_follows_operand_width() {
        assert_eq!(push_opcode(&[]).map(|op| op.mnemonic()).as_deref(), Some("PUSH0"));
        assert_eq!(push_opcode(&[1, 2]).map(|op| op.mnemonic()).as_deref(), Some("PUSH2"));
        assert_eq!(push_opcode(&[0xff; 32]).map(|op| op.size()), Some(33));
        assert!(push_opcode(&[0; 33]).is_none());
        assert_eq!(push_operand(&Opcode::PUSH3([1, 2, 3])), Some(&[1u8, 2, 3][..]));
        assert_eq!(push_operand(&Opcode::ADD), None);
    }

    #[test]
    fn stack_effects() {
        assert_eq!(Opcode::DUP2.stack_io(), Some((2, 3)));
        assert_eq!(Opcode::SWAP1.stack_io(), Some((2, 2)));
        assert_eq!(Opcode::LOG1.stack_io(), Some((3, 0)));
        assert_eq!(Opcode::CODECOPY.stack_io(), Some((3, 0)));
        assert_eq!(Opcode::PUSH1([7]).stack_io(), Some((0, 1)));
        assert_eq!(Opcode::BALANCE.stack_io(), None);
    }

    #[test]
    fn mnemonics() {
        assert_eq!(Opcode::PUSH2([0, 1]).mnemonic(), "PUSH2");
        assert_eq!(Opcode::CALLDATALOAD.mnemonic(), "CALLDATALOAD");
        assert!(Opcode::RETURN.is_terminator());
        assert!(!Opcode::JUMPI.is_terminator());
    }
}
