use super::{COUNTER, compile_ok};
use crate::{CompilerConfig, compile_batch, compile_with_config};
use alloy_primitives::{U256, keccak256};
use test_utils::{AbiValue, ContractHarness, decode_word, encode_call, selector};

#[test]
fn counter_end_to_end() {
    let compiled = compile_ok(COUNTER);
    let mut counter = ContractHarness::deploy(&compiled.bytecode).unwrap();
    counter.call(encode_call("increment()", &[]));
    assert_eq!(decode_word(counter.call(encode_call("get()", &[])).output(), 0), U256::from(1));
    counter.call(encode_call("increment()", &[]));
    assert_eq!(decode_word(counter.call(encode_call("get()", &[])).output(), 0), U256::from(2));
}

#[test]
fn compilation_is_deterministic() {
    let first = compile_ok(COUNTER);
    let second = compile_ok(COUNTER);
    assert_eq!(first, second);
    assert_eq!(first.to_artifact_json(), second.to_artifact_json());
}

#[test]
fn appending_a_field_keeps_existing_slots() {
    let before = compile_ok("class S:\n    a: uint256\n    b: address\n    c: bool\n");
    let after = compile_ok("class S:\n    a: uint256\n    b: address\n    c: bool\n    d: uint256\n");
    let slots = |compiled: &crate::CompiledContract| -> Vec<(String, String)> {
        compiled.storage_layout.iter().map(|entry| (entry.name.clone(), entry.slot.clone())).collect()
    };
    assert_eq!(slots(&before), [("a", "0"), ("b", "1"), ("c", "2")].map(|(n, s)| (n.to_string(), s.to_string())));
    assert_eq!(slots(&after)[..3], slots(&before)[..]);
    assert_eq!(slots(&after)[3], ("d".to_string(), "3".to_string()));
}

#[test]
fn mapping_slot_matches_keccak_of_key_and_base() {
    let source = r#"
class Slots:
    a: uint256
    b: uint256
    c: uint256
    d: uint256
    e: uint256
    table: mapping[uint256, uint256]

    def put(self, key: uint256, value: uint256):
        self.table[key] = value
"#;
    let compiled = compile_ok(source);
    let mut harness = ContractHarness::deploy(&compiled.bytecode).unwrap();
    harness.call(encode_call("put(uint256,uint256)", &[AbiValue::uint(1), AbiValue::uint(99)]));

    let mut preimage = [0u8; 64];
    preimage[31] = 1;
    preimage[63] = 5;
    let slot = U256::from_be_bytes(keccak256(preimage).0);
    assert_eq!(harness.storage(slot), U256::from(99));
}

#[test]
fn uint_values_echo_through_the_codec() {
    let source = r#"
class Echo:
    @view
    def echo(self, value: uint256) -> uint256:
        return value

    @view
    def who(self, account: address) -> address:
        return account
"#;
    let compiled = compile_ok(source);
    let mut harness = ContractHarness::deploy(&compiled.bytecode).unwrap();
    for value in [U256::ZERO, U256::from(42), U256::MAX] {
        let outcome = harness.call(encode_call("echo(uint256)", &[AbiValue::Uint(value)]));
        assert_eq!(outcome.output().len(), 32);
        assert_eq!(decode_word(outcome.output(), 0), value);
    }
}

#[test]
fn every_selector_reaches_its_own_function() {
    let source = r#"
class Many:
    @view
    def first(self) -> uint256:
        return 1

    @view
    def second(self) -> uint256:
        return 2

    @view
    def third(self, x: uint256) -> uint256:
        return 3

    @view
    def fourth(self, flag: bool) -> uint256:
        return 4
"#;
    let compiled = compile_ok(source);
    let mut harness = ContractHarness::deploy(&compiled.bytecode).unwrap();
    for (expected, function) in compiled.interface.functions.iter().enumerate() {
        assert_eq!(function.selector.0, selector(&function.signature));
        let mut calldata = function.selector.0.to_vec();
        calldata.extend([0u8; 32]);
        let outcome = harness.call(calldata);
        assert_eq!(decode_word(outcome.output(), 0), U256::from(expected + 1), "{}", function.signature);
    }
    assert!(harness.call(selector("fifth()").to_vec()).is_revert());
}

#[test]
fn constructor_initializes_fields() {
    let source = r#"
class Owned:
    owner: address = msg.sender
    created: uint256
    limit: uint256 = 10

    @payable
    def __init__(self):
        self.created = block.timestamp
        if msg.value > 0:
            self.limit = msg.value

    @view
    def get_limit(self) -> uint256:
        return self.limit
"#;
    let compiled = compile_ok(source);
    assert_eq!(compiled.interface.constructor_payable, Some(true));
    let mut harness = ContractHarness::deploy_with_value(&compiled.bytecode, U256::from(77)).unwrap();
    assert_eq!(decode_word(harness.call(encode_call("get_limit()", &[])).output(), 0), U256::from(77));
    assert_eq!(harness.storage(U256::ZERO), U256::from_be_bytes(test_utils::CALLER.into_word().0));
}

#[test]
fn runtime_only_output_skips_deployment_code() {
    let config = CompilerConfig::runtime_only();
    let compiled = compile_with_config(COUNTER, &config).unwrap();
    assert_eq!(compiled.bytecode, compiled.runtime_bytecode);
}

#[test]
fn batches_keep_order_and_isolate_failures() {
    let sources = [COUNTER, "class Broken:\n    def f(self):\n        while True:\n            pass\n", COUNTER];
    let results = compile_batch(&sources, &CompilerConfig::default());
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert_eq!(results[0].as_ref().unwrap(), results[2].as_ref().unwrap());
}

#[test]
fn abi_json_lists_functions_and_events() {
    let source = r#"
class Bank:
    balances: mapping[address, uint256]

    @event
    def Deposit(account: address, amount: uint256): ...

    @payable
    def deposit(self):
        self.balances[msg.sender] += msg.value
        self.event("Deposit", msg.sender, msg.value)

    @view
    def balance(self, account: address) -> uint256:
        return self.balances[account]
"#;
    let compiled = compile_ok(source);
    let abi = compiled.to_abi_json();
    let entries = abi.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["name"], "deposit");
    assert_eq!(entries[0]["stateMutability"], "payable");
    assert_eq!(entries[1]["inputs"][0]["type"], "address");
    assert_eq!(entries[1]["outputs"][0]["type"], "uint256");
    assert_eq!(entries[2]["type"], "event");
    assert_eq!(entries[2]["inputs"][1]["indexed"], false);

    let artifact = compiled.to_artifact_json();
    assert_eq!(artifact["contractName"], "Bank");
    assert_eq!(artifact["methodIdentifiers"]["balance(address)"], format!("0x{}", alloy_primitives::hex::encode(selector("balance(address)"))));
    assert!(artifact["bytecode"].as_str().unwrap().starts_with("0x"));
    assert_eq!(compiled.events[0].signature, "Deposit(address,uint256)");
}
