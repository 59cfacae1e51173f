//! Statement translation

use super::{FrameKind, Translator};
use crate::{
    abi,
    error::{CodegenError, Result},
    memory::constants,
    opcode::Opcode,
    selector::event_topic,
    storage::{self, SlotBase},
};
use alloy_primitives::U256;
use cobra_data::{Expr, FieldId, InterfaceType, Stmt};

impl Translator<'_> {
    pub(super) fn translate_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::LocalWrite { local, value } => {
                self.translate_expr(value)?;
                let address = self.local_address(*local)?;
                self.emitter.push_u32(address)?;
                self.emitter.op(Opcode::MSTORE)
            }
            Stmt::StateWrite { field, value } => {
                self.translate_expr(value)?;
                let slot = self.field_slot(*field)?;
                self.emitter.push(slot)?;
                self.emitter.op(Opcode::SSTORE)
            }
            Stmt::MappingWrite { field, keys, value } => {
                self.translate_expr(value)?;
                self.mapping_slot(*field, keys)?;
                self.emitter.op(Opcode::SSTORE)
            }
            Stmt::ArrayWrite { field, index, value } => {
                self.translate_expr(value)?;
                self.array_slot(*field, index)?;
                self.emitter.op(Opcode::SSTORE)
            }
            Stmt::If { condition, then_body, else_body } => {
                self.translate_if(condition, then_body, else_body)
            }
            Stmt::For { counter, start, end, body } => {
                self.translate_for(*counter, start, end, body)
            }
            Stmt::Break => {
                let frame = self.innermost_loop()?;
                self.emitter.jump(frame.join)
            }
            Stmt::Continue => {
                let frame = self.innermost_loop()?;
                self.emitter.jump(frame.otherwise)
            }
            Stmt::Emit { event, args } => self.translate_emit(*event, args),
            Stmt::Return(None) => match self.return_to {
                Some(label) => self.emitter.jump(label),
                None => self.emitter.op(Opcode::STOP),
            },
            Stmt::Return(Some(value)) => {
                self.translate_expr(value)?;
                abi::return_value(self.emitter, &value.ty)
            }
            Stmt::Abort { condition, reason } => self.translate_abort(condition.as_ref(), reason.as_deref()),
        }
    }

    fn translate_if(&mut self, condition: &Expr, then_body: &[Stmt], else_body: &[Stmt]) -> Result<()> {
        let join = self.emitter.new_label();
        let otherwise = if else_body.is_empty() { join } else { self.emitter.new_label() };
        self.push_frame(FrameKind::Conditional, otherwise, join);

        self.translate_expr(condition)?;
        self.emitter.op(Opcode::ISZERO)?;
        self.emitter.jump_if(otherwise)?;
        for stmt in then_body {
            self.translate_stmt(stmt)?;
        }
        if !else_body.is_empty() {
            if self.emitter.is_reachable() {
                self.emitter.jump(join)?;
            }
            self.emitter.mark_jumpdest(otherwise)?;
            for stmt in else_body {
                self.translate_stmt(stmt)?;
            }
        }
        self.emitter.mark_jumpdest(join)?;
        self.pop_frame(FrameKind::Conditional).map(drop)
    }

    /// `counter < end` is checked before every iteration, `end` is evaluated once.
    fn translate_for(
        &mut self,
        counter: cobra_data::LocalId,
        start: &Expr,
        end: &Expr,
        body: &[Stmt],
    ) -> Result<()> {
        let counter = self.local_address(counter)?;
        let bound = self.emitter.allocate_memory(constants::WORD_SIZE);

        self.translate_expr(start)?;
        self.emitter.push_u32(counter)?;
        self.emitter.op(Opcode::MSTORE)?;
        self.translate_expr(end)?;
        self.emitter.push_u32(bound)?;
        self.emitter.op(Opcode::MSTORE)?;

        let body_label = self.emitter.new_label();
        let next = self.emitter.new_label();
        let check = self.emitter.new_label();
        let exit = self.emitter.new_label();
        self.push_frame(FrameKind::Loop, next, exit);

        self.emitter.jump(check)?;
        self.emitter.mark_jumpdest(body_label)?;
        for stmt in body {
            self.translate_stmt(stmt)?;
        }
        self.emitter.mark_jumpdest(next)?;
        self.emitter.push_u32(1)?;
        self.emitter.push_u32(counter)?;
        self.emitter.ops(&[Opcode::MLOAD, Opcode::ADD])?;
        self.emitter.push_u32(counter)?;
        self.emitter.op(Opcode::MSTORE)?;

        self.emitter.mark_jumpdest(check)?;
        self.emitter.push_u32(bound)?;
        self.emitter.op(Opcode::MLOAD)?;
        self.emitter.push_u32(counter)?;
        self.emitter.ops(&[Opcode::MLOAD, Opcode::LT])?;
        self.emitter.jump_if(body_label)?;
        self.emitter.mark_jumpdest(exit)?;
        self.pop_frame(FrameKind::Loop).map(drop)
    }

    fn translate_emit(&mut self, event: cobra_data::EventId, args: &[Expr]) -> Result<()> {
        let declaration = self
            .contract
            .events
            .get(event)
            .ok_or_else(|| CodegenError::InvalidIr(format!("unknown event {event}")))?;
        let types: Vec<InterfaceType> = declaration.fields.iter().map(|field| field.ty.clone()).collect();
        if types.len() != args.len() {
            return Err(CodegenError::InvalidIr(format!(
                "`{}` takes {} field(s), {} given",
                declaration.name,
                types.len(),
                args.len()
            )));
        }
        let topic = event_topic(&declaration.canonical());

        let block = self.emitter.allocate_memory(constants::WORD_SIZE * args.len() as u32);
        for (i, arg) in args.iter().enumerate() {
            self.translate_expr(arg)?;
            self.emitter.push_u32(block + constants::WORD_SIZE * i as u32)?;
            self.emitter.op(Opcode::MSTORE)?;
        }
        self.emitter.push(U256::from_be_bytes(topic.0))?;
        abi::encode_tuple(self.emitter, block, &types)?;
        self.emitter.op(Opcode::LOG1)
    }

    fn translate_abort(&mut self, condition: Option<&Expr>, reason: Option<&str>) -> Result<()> {
        match (condition, reason) {
            (Some(condition), None) => {
                self.translate_expr(condition)?;
                self.emitter.op(Opcode::ISZERO)?;
                self.emitter.jump_if(self.abort)
            }
            (Some(condition), Some(reason)) => {
                let ok = self.emitter.new_label();
                self.translate_expr(condition)?;
                self.emitter.jump_if(ok)?;
                abi::revert_with_reason(self.emitter, reason)?;
                self.emitter.mark_jumpdest(ok)
            }
            (None, Some(reason)) => abi::revert_with_reason(self.emitter, reason),
            (None, None) => self.emitter.jump(self.abort),
        }
    }

    pub(super) fn field_slot(&self, field: FieldId) -> Result<U256> {
        self.contract
            .fields
            .get(field)
            .map(|field| field.slot)
            .ok_or_else(|| CodegenError::InvalidIr(format!("unknown state field {field}")))
    }

    /// Leaves the slot of `field[keys[0]][keys[1]]...` on the stack.
    pub(super) fn mapping_slot(&mut self, field: FieldId, keys: &[Expr]) -> Result<()> {
        let slot = self.field_slot(field)?;
        let Some((first, rest)) = keys.split_first() else {
            return Err(CodegenError::InvalidIr("mapping access without a key".into()));
        };
        self.translate_expr(first)?;
        storage::mapping_slot_code(self.emitter, SlotBase::Static(slot))?;
        for key in rest {
            self.translate_expr(key)?;
            storage::mapping_slot_code(self.emitter, SlotBase::OnStack)?;
        }
        Ok(())
    }

    /// Leaves the bounds-checked slot of `field[index]` on the stack.
    pub(super) fn array_slot(&mut self, field: FieldId, index: &Expr) -> Result<()> {
        let contract = self.contract;
        let declaration = contract
            .fields
            .get(field)
            .ok_or_else(|| CodegenError::InvalidIr(format!("unknown state field {field}")))?;
        let InterfaceType::FixedArray(_, len) = &declaration.ty else {
            return Err(CodegenError::InvalidIr(format!("`{}` is not an array", declaration.name)));
        };
        let (slot, len) = (declaration.slot, *len);
        self.translate_expr(index)?;
        storage::array_slot_code(self.emitter, slot, len)
    }
}
