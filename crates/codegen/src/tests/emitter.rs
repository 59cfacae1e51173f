use crate::{
    CodegenError, Emitter,
    memory::constants,
    opcode::{Opcode::*, OpcodeExt},
};
use alloy_primitives::U256;

fn mnemonics(emitter: &Emitter) -> Vec<String> {
    emitter.instructions().iter().map(|instruction| instruction.opcode.mnemonic()).collect()
}

#[test]
fn pushes_use_the_narrowest_width() {
    let mut emitter = Emitter::new();
    emitter.push(U256::ZERO).unwrap();
    emitter.push(U256::from(0xff)).unwrap();
    emitter.push(U256::from(0x100)).unwrap();
    emitter.push(U256::MAX).unwrap();
    assert_eq!(mnemonics(&emitter), ["PUSH0", "PUSH1", "PUSH2", "PUSH32"]);
    let code = emitter.finish().unwrap();
    assert_eq!(&code[..6], &[0x5f, 0x60, 0xff, 0x61, 0x01, 0x00]);
    assert_eq!(code.len(), 1 + 2 + 3 + 33);
}

#[test]
fn forward_and_backward_jumps_are_patched() {
    let mut emitter = Emitter::new();
    let top = emitter.new_label();
    let end = emitter.new_label();
    emitter.mark_jumpdest(top).unwrap();
    emitter.op(CALLVALUE).unwrap();
    emitter.jump_if(end).unwrap();
    emitter.jump(top).unwrap();
    emitter.mark_jumpdest(end).unwrap();
    emitter.op(STOP).unwrap();

    let code = emitter.finish().unwrap();
    assert_eq!(
        code,
        [0x5b, 0x34, 0x61, 0x00, 0x0a, 0x57, 0x61, 0x00, 0x00, 0x56, 0x5b, 0x00]
    );
}

#[test]
fn unbound_labels_are_reported() {
    let mut emitter = Emitter::new();
    let nowhere = emitter.new_label();
    emitter.jump(nowhere).unwrap();
    assert_eq!(emitter.finish(), Err(CodegenError::UnresolvedLabel { label: nowhere }));
}

#[test]
fn jumps_must_land_on_jumpdest() {
    let mut emitter = Emitter::new();
    let plain = emitter.new_label();
    emitter.jump(plain).unwrap();
    emitter.mark(plain).unwrap();
    emitter.op(STOP).unwrap();
    assert_eq!(emitter.finish(), Err(CodegenError::InvalidJumpTarget { label: plain }));
}

#[test]
fn offsets_may_point_anywhere() {
    let mut emitter = Emitter::new();
    let data = emitter.new_label();
    emitter.push_label(data).unwrap();
    emitter.op(POP).unwrap();
    emitter.op(STOP).unwrap();
    emitter.mark(data).unwrap();
    assert_eq!(emitter.finish().unwrap(), [0x61, 0x00, 0x05, 0x50, 0x00]);
}

#[test]
fn labels_cannot_be_bound_twice() {
    let mut emitter = Emitter::new();
    let label = emitter.new_label();
    emitter.mark_jumpdest(label).unwrap();
    assert_eq!(emitter.mark(label), Err(CodegenError::LabelRebound { label }));
}

#[test]
fn underflow_is_caught_at_emission() {
    let mut emitter = Emitter::new();
    emitter.push(U256::from(1)).unwrap();
    assert_eq!(
        emitter.op(ADD),
        Err(CodegenError::StackUnderflow { opcode: "ADD".into(), required: 2, available: 1 })
    );
}

#[test]
fn opcodes_outside_the_emitted_set_are_refused() {
    let mut emitter = Emitter::new();
    emitter.op(CALLER).unwrap();
    assert_eq!(
        emitter.op(BALANCE),
        Err(CodegenError::UnsupportedOpcode { opcode: "BALANCE".into() })
    );
    assert_eq!(emitter.instructions().len(), 1);
}

#[test]
fn paths_into_a_label_must_agree_on_depth() {
    let mut emitter = Emitter::new();
    let join = emitter.new_label();
    emitter.op(CALLVALUE).unwrap();
    emitter.jump_if(join).unwrap();
    emitter.op(CALLER).unwrap();
    assert_eq!(
        emitter.mark_jumpdest(join),
        Err(CodegenError::StackMismatch { label: join, expected: 0, found: 1 })
    );
}

#[test]
fn unreachable_code_adopts_the_recorded_depth() {
    let mut emitter = Emitter::new();
    let target = emitter.new_label();
    emitter.op(CALLER).unwrap();
    emitter.jump(target).unwrap();
    emitter.mark_jumpdest(target).unwrap();
    assert_eq!(emitter.depth(), 1);
    assert!(emitter.is_reachable());
}

#[test]
fn stack_limit_is_enforced() {
    let mut emitter = Emitter::new();
    for _ in 0..1024 {
        emitter.op(CALLER).unwrap();
    }
    assert_eq!(emitter.op(CALLER), Err(CodegenError::StackOverflow { depth: 1025 }));
}

#[test]
fn heap_base_follows_static_memory() {
    let mut emitter = Emitter::new();
    emitter.begin_function();
    emitter.init_heap().unwrap();
    assert_eq!(emitter.allocate_memory(32), constants::STATIC_START);
    assert_eq!(emitter.allocate_memory(5), constants::STATIC_START + 0x20);
    emitter.link_function().unwrap();
    emitter.op(STOP).unwrap();
    let code = emitter.finish().unwrap();
    // PUSH2 0x00c0 PUSH1 0x40 MSTORE STOP
    assert_eq!(code, [0x61, 0x00, 0xc0, 0x60, 0x40, 0x52, 0x00]);
}

#[test]
fn link_function_leaves_outer_labels_pending() {
    let mut emitter = Emitter::new();
    let abort = emitter.new_label();
    emitter.begin_function();
    let local = emitter.new_label();
    emitter.jump(local).unwrap();
    emitter.mark_jumpdest(local).unwrap();
    emitter.jump(abort).unwrap();
    emitter.link_function().unwrap();
    emitter.mark_jumpdest(abort).unwrap();
    emitter.op(STOP).unwrap();
    let code = emitter.finish().unwrap();
    assert_eq!(code, [0x61, 0x00, 0x04, 0x56, 0x5b, 0x61, 0x00, 0x09, 0x56, 0x5b, 0x00]);
}
