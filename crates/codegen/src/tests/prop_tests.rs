//! Property tests: generated arithmetic matches 256-bit wrapping semantics.

use super::compile;
use crate::{Artifact, storage::mapping_slot};
use alloy_primitives::U256;
use proptest::prelude::*;
use std::sync::OnceLock;
use test_utils::{AbiValue, ContractHarness, decode_word, encode_call};

const MATH: &str = r#"
class Math:
    slots: mapping[uint256, uint256]

    @view
    def add(self, a: uint256, b: uint256) -> uint256:
        return a + b

    @view
    def sub(self, a: uint256, b: uint256) -> uint256:
        return a - b

    @view
    def mul(self, a: uint256, b: uint256) -> uint256:
        return a * b

    @view
    def div(self, a: uint256, b: uint256) -> uint256:
        return a // b

    @view
    def rem(self, a: uint256, b: uint256) -> uint256:
        return a % b

    @view
    def shl(self, a: uint256, b: uint256) -> uint256:
        return a << b

    @view
    def shr(self, a: uint256, b: uint256) -> uint256:
        return a >> b

    @view
    def lt(self, a: uint256, b: uint256) -> bool:
        return a < b

    @view
    def le(self, a: uint256, b: uint256) -> bool:
        return a <= b

    @view
    def ge(self, a: uint256, b: uint256) -> bool:
        return a >= b

    @view
    def ne(self, a: uint256, b: uint256) -> bool:
        return a != b

    def put(self, key: uint256, value: uint256):
        self.slots[key] = value
"#;

fn artifact() -> &'static Artifact {
    static ARTIFACT: OnceLock<Artifact> = OnceLock::new();
    ARTIFACT.get_or_init(|| compile(MATH))
}

fn eval(harness: &mut ContractHarness, name: &str, a: U256, b: U256) -> U256 {
    let outcome = harness.call(encode_call(
        &format!("{name}(uint256,uint256)"),
        &[AbiValue::Uint(a), AbiValue::Uint(b)],
    ));
    decode_word(outcome.output(), 0)
}

/// Edge values of the 256-bit range mixed with arbitrary words.
fn edge_case_u256() -> impl Strategy<Value = U256> {
    prop_oneof![
        Just(U256::ZERO),
        Just(U256::from(1)),
        Just(U256::from(2)),
        Just(U256::from(255)),
        Just(U256::from(256)),
        Just(U256::from(u64::MAX)),
        Just(U256::MAX),
        Just(U256::MAX - U256::from(1)),
        Just(U256::from(1) << 255),
        any::<[u8; 32]>().prop_map(U256::from_be_bytes::<32>),
        any::<u64>().prop_map(U256::from),
    ]
}

fn bool_word(value: bool) -> U256 {
    U256::from(value as u8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arithmetic_wraps(a in edge_case_u256(), b in edge_case_u256()) {
        let mut harness = ContractHarness::deploy(&artifact().creation).unwrap();
        prop_assert_eq!(eval(&mut harness, "add", a, b), a.wrapping_add(b));
        prop_assert_eq!(eval(&mut harness, "sub", a, b), a.wrapping_sub(b));
        prop_assert_eq!(eval(&mut harness, "mul", a, b), a.wrapping_mul(b));
    }

    #[test]
    fn division_by_zero_yields_zero(a in edge_case_u256(), b in edge_case_u256()) {
        let mut harness = ContractHarness::deploy(&artifact().creation).unwrap();
        let (quotient, remainder) =
            if b.is_zero() { (U256::ZERO, U256::ZERO) } else { (a / b, a % b) };
        prop_assert_eq!(eval(&mut harness, "div", a, b), quotient);
        prop_assert_eq!(eval(&mut harness, "rem", a, b), remainder);
    }

    #[test]
    fn shifts(a in edge_case_u256(), shift in 0u64..300) {
        let mut harness = ContractHarness::deploy(&artifact().creation).unwrap();
        let shift_word = U256::from(shift);
        let (left, right) = if shift >= 256 {
            (U256::ZERO, U256::ZERO)
        } else {
            (a << shift as usize, a >> shift as usize)
        };
        prop_assert_eq!(eval(&mut harness, "shl", a, shift_word), left);
        prop_assert_eq!(eval(&mut harness, "shr", a, shift_word), right);
    }

    #[test]
    fn comparisons(a in edge_case_u256(), b in edge_case_u256()) {
        let mut harness = ContractHarness::deploy(&artifact().creation).unwrap();
        prop_assert_eq!(eval(&mut harness, "lt", a, b), bool_word(a < b));
        prop_assert_eq!(eval(&mut harness, "le", a, b), bool_word(a <= b));
        prop_assert_eq!(eval(&mut harness, "ge", a, b), bool_word(a >= b));
        prop_assert_eq!(eval(&mut harness, "ne", a, b), bool_word(a != b));
    }

    #[test]
    fn mapping_writes_land_on_hashed_slots(key in edge_case_u256(), value in edge_case_u256()) {
        let mut harness = ContractHarness::deploy(&artifact().creation).unwrap();
        let outcome = harness.call(encode_call(
            "put(uint256,uint256)",
            &[AbiValue::Uint(key), AbiValue::Uint(value)],
        ));
        prop_assert!(outcome.is_success());
        prop_assert_eq!(harness.storage(mapping_slot(key, U256::ZERO)), value);
    }
}
