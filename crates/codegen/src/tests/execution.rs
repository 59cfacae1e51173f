//! Deploys generated code into revm and checks observable behavior.

use super::{compile, deploy};
use crate::{event_topic, storage::mapping_slot};
use alloy_primitives::{Address, U256, address};
use test_utils::{
    AbiValue, CALLER, ContractHarness, decode_revert_reason, decode_string, decode_word, encode_call,
    encode_tuple, selector,
};

const COUNTER: &str = r#"
class Counter:
    count: uint256 = 0

    @public
    def increment(self):
        self.count += 1

    @view
    def get(self) -> uint256:
        return self.count
"#;

const TOKEN: &str = r#"
class Token:
    total_supply: uint256
    owner: address
    balances: mapping[address, uint256]
    allowances: mapping[address, mapping[address, uint256]]

    @event
    def Transfer(sender: address, receiver: address, amount: uint256): ...

    def __init__(self):
        self.owner = msg.sender
        self.total_supply = 1000
        self.balances[msg.sender] = 1000

    @view
    def balanceOf(self, account: address) -> uint256:
        return self.balances[account]

    def transfer(self, to: address, amount: uint256) -> bool:
        require(self.balances[msg.sender] >= amount, "insufficient balance")
        self.balances[msg.sender] -= amount
        self.balances[to] += amount
        self.event("Transfer", msg.sender, to, amount)
        return True

    def approve(self, spender: address, amount: uint256) -> bool:
        self.allowances[msg.sender][spender] = amount
        return True

    @view
    def allowance(self, holder: address, spender: address) -> uint256:
        return self.allowances[holder].get(spender, 0)
"#;

const RECEIVER: Address = address!("00000000000000000000000000000000000000aa");

fn word(address: Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

fn call_uint(harness: &mut ContractHarness, signature: &str, args: &[AbiValue]) -> U256 {
    let outcome = harness.call(encode_call(signature, args));
    decode_word(outcome.output(), 0)
}

#[test]
fn counter_increments() {
    let mut counter = deploy(COUNTER);
    assert_eq!(call_uint(&mut counter, "get()", &[]), U256::ZERO);
    assert!(counter.call(encode_call("increment()", &[])).is_success());
    assert_eq!(call_uint(&mut counter, "get()", &[]), U256::from(1));
    assert!(counter.call(encode_call("increment()", &[])).is_success());
    assert_eq!(call_uint(&mut counter, "get()", &[]), U256::from(2));
    assert_eq!(counter.storage(U256::ZERO), U256::from(2));
}

#[test]
fn deployment_returns_the_runtime_code() {
    let artifact = compile(COUNTER);
    let harness = ContractHarness::deploy(&artifact.creation).unwrap();
    assert_eq!(harness.runtime_code(), artifact.runtime.as_slice());
    assert!(artifact.creation.ends_with(&artifact.runtime));
}

#[test]
fn non_payable_constructor_rejects_value() {
    let artifact = compile(COUNTER);
    assert!(ContractHarness::deploy_with_value(&artifact.creation, U256::from(1)).is_err());
}

#[test]
fn unknown_selectors_and_short_calldata_revert() {
    let mut counter = deploy(COUNTER);
    assert!(counter.call(encode_call("missing()", &[])).is_revert());
    assert!(counter.call(vec![0xd0, 0x9d]).is_revert());
    assert!(counter.call(Vec::new()).is_revert());
}

#[test]
fn non_payable_functions_reject_value() {
    let mut counter = deploy(COUNTER);
    let outcome = counter.call_with(CALLER, encode_call("increment()", &[]), U256::from(5));
    assert!(outcome.is_revert());
    assert_eq!(call_uint(&mut counter, "get()", &[]), U256::ZERO);
}

#[test]
fn token_transfer_moves_balances_and_logs() {
    let mut token = deploy(TOKEN);
    assert_eq!(call_uint(&mut token, "balanceOf(address)", &[AbiValue::Address(CALLER)]), U256::from(1000));

    let outcome = token.call(encode_call(
        "transfer(address,uint256)",
        &[AbiValue::Address(RECEIVER), AbiValue::uint(250)],
    ));
    assert_eq!(decode_word(outcome.output(), 0), U256::from(1));

    let logs = outcome.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, token.address);
    assert_eq!(logs[0].data.topics(), [event_topic("Transfer(address,address,uint256)")]);
    assert_eq!(
        logs[0].data.data.to_vec(),
        encode_tuple(&[AbiValue::Address(CALLER), AbiValue::Address(RECEIVER), AbiValue::uint(250)])
    );

    assert_eq!(call_uint(&mut token, "balanceOf(address)", &[AbiValue::Address(CALLER)]), U256::from(750));
    assert_eq!(call_uint(&mut token, "balanceOf(address)", &[AbiValue::Address(RECEIVER)]), U256::from(250));
    assert_eq!(token.storage(mapping_slot(word(CALLER), U256::from(2))), U256::from(750));
    assert_eq!(token.storage(U256::from(1)), word(CALLER));
}

#[test]
fn failed_requirement_reverts_with_reason() {
    let mut token = deploy(TOKEN);
    let outcome = token.call(encode_call(
        "transfer(address,uint256)",
        &[AbiValue::Address(RECEIVER), AbiValue::uint(1001)],
    ));
    assert_eq!(decode_revert_reason(outcome.revert_data()).as_deref(), Some("insufficient balance"));
    assert_eq!(call_uint(&mut token, "balanceOf(address)", &[AbiValue::Address(CALLER)]), U256::from(1000));
}

#[test]
fn nested_mappings_use_solidity_slots() {
    let mut token = deploy(TOKEN);
    token.call(encode_call("approve(address,uint256)", &[AbiValue::Address(RECEIVER), AbiValue::uint(77)]));
    let allowance = call_uint(
        &mut token,
        "allowance(address,address)",
        &[AbiValue::Address(CALLER), AbiValue::Address(RECEIVER)],
    );
    assert_eq!(allowance, U256::from(77));
    let slot = mapping_slot(word(RECEIVER), mapping_slot(word(CALLER), U256::from(3)));
    assert_eq!(token.storage(slot), U256::from(77));
    let missing = call_uint(
        &mut token,
        "allowance(address,address)",
        &[AbiValue::Address(RECEIVER), AbiValue::Address(CALLER)],
    );
    assert_eq!(missing, U256::ZERO);
}

#[test]
fn too_few_arguments_revert() {
    let mut token = deploy(TOKEN);
    let mut calldata = encode_call("balanceOf(address)", &[AbiValue::Address(CALLER)]);
    calldata.truncate(20);
    assert!(token.call(calldata).is_revert());
}

const TEXT: &str = r#"
class Text:
    table: mapping[uint256, uint256]

    @event
    def Note(sender: address, text: string): ...

    @view
    def echo(self, text: string) -> string:
        return text

    @view
    def greeting(self) -> string:
        return "hello from a contract that needs more than one word"

    @view
    def size(self, data: bytes) -> uint256:
        return len(data)

    @view
    def nothing(self) -> string:
        pass

    def note(self, text: string):
        self.event("Note", msg.sender, text)

    @view
    def maybe(self, flag: bool) -> string:
        x = self.table[5]
        if flag:
            s = "hi"
        return s

    @view
    def label(self, id: uint256, name: string, scale: uint256) -> string:
        require(id == 7)
        require(scale == 3)
        return name

    @view
    def weigh(self, id: uint256, name: string, scale: uint256) -> uint256:
        return id * scale + len(name)
"#;

#[test]
fn strings_round_trip_through_calldata() {
    let mut text = deploy(TEXT);
    for input in ["", "hi", "exactly thirty-two bytes long!!!", "a string that spans more than two words of calldata payload"] {
        let outcome = text.call(encode_call("echo(string)", &[AbiValue::String(input.into())]));
        assert_eq!(decode_word(outcome.output(), 0), U256::from(32));
        assert_eq!(decode_string(outcome.output(), 0), input);
        assert_eq!(outcome.output().len() % 32, 0);
    }
}

#[test]
fn string_literals_and_lengths() {
    let mut text = deploy(TEXT);
    let outcome = text.call(encode_call("greeting()", &[]));
    assert_eq!(decode_string(outcome.output(), 0), "hello from a contract that needs more than one word");

    let size = call_uint(&mut text, "size(bytes)", &[AbiValue::Bytes(vec![7; 45])]);
    assert_eq!(size, U256::from(45));

    let outcome = text.call(encode_call("nothing()", &[]));
    assert_eq!(decode_string(outcome.output(), 0), "");
}

#[test]
fn unassigned_string_locals_read_as_empty() {
    let mut text = deploy(TEXT);
    let outcome = text.call(encode_call("maybe(bool)", &[AbiValue::Bool(false)]));
    assert!(outcome.is_success());
    assert_eq!(decode_word(outcome.output(), 0), U256::from(32));
    assert_eq!(decode_string(outcome.output(), 0), "");

    let outcome = text.call(encode_call("maybe(bool)", &[AbiValue::Bool(true)]));
    assert_eq!(decode_string(outcome.output(), 0), "hi");
}

#[test]
fn mixed_static_and_dynamic_parameters() {
    let mut text = deploy(TEXT);
    let args = [AbiValue::uint(7), AbiValue::String("mixed".into()), AbiValue::uint(3)];
    let outcome = text.call(encode_call("label(uint256,string,uint256)", &args));
    assert!(outcome.is_success());
    assert_eq!(decode_string(outcome.output(), 0), "mixed");

    assert_eq!(call_uint(&mut text, "weigh(uint256,string,uint256)", &args), U256::from(26));

    let args = [
        AbiValue::uint(2),
        AbiValue::String("a string that spans more than two words of calldata payload".into()),
        AbiValue::uint(5),
    ];
    assert_eq!(call_uint(&mut text, "weigh(uint256,string,uint256)", &args), U256::from(69));
}

#[test]
fn events_encode_dynamic_fields() {
    let mut text = deploy(TEXT);
    let outcome = text.call(encode_call("note(string)", &[AbiValue::String("remember".into())]));
    let log = &outcome.logs()[0];
    assert_eq!(log.data.topics(), [event_topic("Note(address,string)")]);
    assert_eq!(
        log.data.data.to_vec(),
        encode_tuple(&[AbiValue::Address(CALLER), AbiValue::String("remember".into())])
    );
}

const LEDGER: &str = r#"
class Ledger:
    history: array[uint256, 4]
    deposits: mapping[address, uint256]
    last_seen: uint256

    def record(self, index: uint256, amount: uint256):
        self.history[index] = amount

    @view
    def total(self) -> uint256:
        acc = 0
        for i in range(len(self.history)):
            acc += self.history[i]
        return acc

    @view
    def sum_until_zero(self) -> uint256:
        acc = 0
        i = 0
        for step in range(10):
            if not (i < 4 and self.history[i] > 0):
                break
            acc += self.history[i]
            i += 1
        return acc

    @view
    def odd_sum(self, limit: uint256) -> uint256:
        acc = 0
        for i in range(limit):
            if i % 2 == 0:
                continue
            acc += i
        return acc

    @view
    def classify(self, x: uint256) -> uint256:
        if x < 10:
            return 1
        elif x < 100:
            return 2
        else:
            return 3

    @payable
    def deposit(self):
        self.deposits[msg.sender] += msg.value
        self.last_seen = block.timestamp

    @view
    def deposited(self, account: address) -> uint256:
        return self.deposits[account]

    @view
    def negate(self, flag: bool) -> bool:
        return not flag

    @view
    def same(self, flag: bool) -> bool:
        return flag
"#;

#[test]
fn fixed_arrays_and_loops() {
    let mut ledger = deploy(LEDGER);
    for (index, amount) in [(0, 5), (1, 7), (3, 11)] {
        let outcome =
            ledger.call(encode_call("record(uint256,uint256)", &[AbiValue::uint(index), AbiValue::uint(amount)]));
        assert!(outcome.is_success());
    }
    assert_eq!(call_uint(&mut ledger, "total()", &[]), U256::from(23));
    assert_eq!(ledger.storage(U256::from(3)), U256::from(11));
    // stops at the empty element 2
    assert_eq!(call_uint(&mut ledger, "sum_until_zero()", &[]), U256::from(12));
}

#[test]
fn array_index_out_of_bounds_reverts() {
    let mut ledger = deploy(LEDGER);
    let outcome = ledger.call(encode_call("record(uint256,uint256)", &[AbiValue::uint(4), AbiValue::uint(1)]));
    assert!(outcome.is_revert());
    assert!(outcome.revert_data().is_empty());
}

#[test]
fn short_circuit_guards_array_reads() {
    let mut ledger = deploy(LEDGER);
    for index in 0..4 {
        ledger.call(encode_call("record(uint256,uint256)", &[AbiValue::uint(index), AbiValue::uint(1)]));
    }
    assert_eq!(call_uint(&mut ledger, "sum_until_zero()", &[]), U256::from(4));
}

#[test]
fn continue_and_branches() {
    let mut ledger = deploy(LEDGER);
    assert_eq!(call_uint(&mut ledger, "odd_sum(uint256)", &[AbiValue::uint(10)]), U256::from(25));
    assert_eq!(call_uint(&mut ledger, "odd_sum(uint256)", &[AbiValue::uint(0)]), U256::ZERO);
    for (x, class) in [(3, 1), (10, 2), (99, 2), (100, 3)] {
        assert_eq!(call_uint(&mut ledger, "classify(uint256)", &[AbiValue::uint(x)]), U256::from(class));
    }
}

#[test]
fn payable_functions_see_value_and_time() {
    let mut ledger = deploy(LEDGER);
    ledger.set_timestamp(1_700_000_000);
    let outcome = ledger.call_with(CALLER, encode_call("deposit()", &[]), U256::from(300));
    assert!(outcome.is_success());
    assert_eq!(call_uint(&mut ledger, "deposited(address)", &[AbiValue::Address(CALLER)]), U256::from(300));
    assert_eq!(ledger.storage(U256::from(5)), U256::from(1_700_000_000u64));
}

#[test]
fn bool_arguments_are_normalized() {
    let mut ledger = deploy(LEDGER);
    let mut calldata = selector("same(bool)").to_vec();
    calldata.extend(U256::from(2).to_be_bytes::<32>());
    assert_eq!(decode_word(ledger.call(calldata).output(), 0), U256::from(1));
    assert_eq!(call_uint(&mut ledger, "negate(bool)", &[AbiValue::Bool(true)]), U256::ZERO);
    assert_eq!(call_uint(&mut ledger, "negate(bool)", &[AbiValue::Bool(false)]), U256::from(1));
}
