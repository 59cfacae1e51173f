use super::{analyze_ok, contract_with};
use alloy_primitives::U256;
use cobra_data::{BinaryOp, ExprKind, InterfaceType, Mutability, Stmt};
use test_utils::assert_strings_with_diff;

const COUNTER: &str = r#"
from pymon import Contract, public_function, view_function

class Counter(Contract):
    """A counter."""

    count: uint256 = 0
    owner: address = msg.sender

    @public_function
    def increment(self):
        self.count += 1

    @view_function
    def get(self) -> uint256:
        return self.count
"#;

#[test]
fn counter_lowers_to_expected_ir() {
    let contract = analyze_ok(COUNTER);
    let expected = r#"
contract Counter
  field count: uint256 @ slot 0
  field owner: address @ slot 1
  constructor:
    self.count = 0
    self.owner = msg.sender
  fn increment() nonpayable:
    self.count = (self.count + 1)
  fn get() view -> uint256:
    return self.count
"#;
    assert_strings_with_diff(&contract.to_string(), expected, "IR display", Some(("Source", COUNTER)));
}

#[test]
fn slots_are_assigned_in_declaration_order() {
    let contract = analyze_ok(&contract_with("extra: bool"));
    let slots: Vec<(String, U256)> =
        contract.fields.iter().map(|field| (field.name.clone(), field.slot)).collect();
    assert_eq!(
        slots,
        vec![
            ("total".to_string(), U256::from(0)),
            ("owner".to_string(), U256::from(1)),
            ("balances".to_string(), U256::from(2)),
            ("allowances".to_string(), U256::from(3)),
            ("history".to_string(), U256::from(4)),
            ("extra".to_string(), U256::from(8)),
        ]
    );
}

#[test]
fn signatures_and_mutability() {
    let contract = analyze_ok(&contract_with(
        "@payable\n\
         def deposit(self):\n\
         \x20   self.balances[msg.sender] += msg.value\n\
         \n\
         @view\n\
         def allowance(self, owner: address, spender: address) -> uint256:\n\
         \x20   return self.allowances[owner].get(spender, 0)\n\
         \n\
         def touch(self, note: string) -> string:\n\
         \x20   return note",
    ));
    let deposit = &contract.functions[contract.function_by_name("deposit").unwrap()];
    assert_eq!(deposit.signature.mutability, Mutability::Payable);

    let allowance = &contract.functions[contract.function_by_name("allowance").unwrap()];
    assert_eq!(allowance.signature.canonical(), "allowance(address,address)");
    assert_eq!(allowance.signature.mutability, Mutability::View);
    let Stmt::Return(Some(value)) = &allowance.body[0] else { panic!("expected return") };
    let ExprKind::MappingRead { keys, .. } = &value.kind else { panic!("expected mapping read") };
    assert_eq!(keys.len(), 2);

    let touch = &contract.functions[contract.function_by_name("touch").unwrap()];
    assert_eq!(touch.signature.mutability, Mutability::Mutating);
    assert_eq!(touch.signature.returns, Some(InterfaceType::String));
}

#[test]
fn locals_loops_and_events() {
    let contract = analyze_ok(&contract_with(
        "def sum_history(self) -> uint256:\n\
         \x20   acc = 0\n\
         \x20   for i in range(len(self.history)):\n\
         \x20       if i == 2:\n\
         \x20           continue\n\
         \x20       acc += self.history[i]\n\
         \x20   self.event(\"Moved\", msg.sender, acc)\n\
         \x20   return acc",
    ));
    let function = &contract.functions[contract.function_by_name("sum_history").unwrap()];
    let names: Vec<&str> = function.locals.iter().map(|local| local.name.as_str()).collect();
    assert_eq!(names, ["acc", "i"]);
    let Stmt::For { end, body, .. } = &function.body[1] else { panic!("expected loop") };
    assert_eq!(end.kind, ExprKind::Literal(U256::from(4)));
    assert!(matches!(body[0], Stmt::If { .. }));
    assert!(matches!(function.body[2], Stmt::Emit { .. }));
}

#[test]
fn require_assert_and_revert_become_aborts() {
    let contract = analyze_ok(&contract_with(
        "def guard(self, amount: uint256):\n\
         \x20   require(amount > 0, \"zero amount\")\n\
         \x20   assert self.total >= amount\n\
         \x20   if amount == 7:\n\
         \x20       revert(\"unlucky\")",
    ));
    let body = &contract.functions[contract.function_by_name("guard").unwrap()].body;
    assert!(matches!(&body[0], Stmt::Abort { condition: Some(_), reason: Some(r) } if r == "zero amount"));
    assert!(matches!(&body[1], Stmt::Abort { condition: Some(_), reason: None }));
    let Stmt::If { then_body, .. } = &body[2] else { panic!("expected if") };
    assert!(matches!(&then_body[0], Stmt::Abort { condition: None, reason: Some(r) } if r == "unlucky"));
}

#[test]
fn truthiness_compares_against_zero() {
    let contract = analyze_ok(&contract_with(
        "@view\n\
         def has_supply(self) -> bool:\n\
         \x20   return not self.total",
    ));
    let body = &contract.functions[contract.function_by_name("has_supply").unwrap()].body;
    let Stmt::Return(Some(value)) = &body[0] else { panic!("expected return") };
    assert_eq!(value.ty, InterfaceType::Bool);
    let ExprKind::Unary { operand, .. } = &value.kind else { panic!("expected `not`") };
    assert!(matches!(operand.kind, ExprKind::Binary { op: BinaryOp::Ne, .. }));
}
