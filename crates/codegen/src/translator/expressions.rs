//! Expression translation
//!
//! The EVM takes the first operand from the top of the stack, so non-commutative operators
//! evaluate their right operand first.

use super::Translator;
use crate::{abi, error::Result, opcode::Opcode};
use cobra_data::{BinaryOp, Expr, ExprKind, UnaryOp};

impl Translator<'_> {
    pub(crate) fn translate_expr(&mut self, expr: &Expr) -> Result<()> {
        match &expr.kind {
            ExprKind::Literal(value) => self.emitter.push(*value),
            ExprKind::Text(bytes) => abi::push_text(self.emitter, bytes),
            ExprKind::LocalRead(local) => {
                let address = self.local_address(*local)?;
                self.emitter.push_u32(address)?;
                self.emitter.op(Opcode::MLOAD)
            }
            ExprKind::StateRead(field) => {
                let slot = self.field_slot(*field)?;
                self.emitter.push(slot)?;
                self.emitter.op(Opcode::SLOAD)
            }
            ExprKind::MappingRead { field, keys } => {
                self.mapping_slot(*field, keys)?;
                self.emitter.op(Opcode::SLOAD)
            }
            ExprKind::ArrayRead { field, index } => {
                self.array_slot(*field, index)?;
                self.emitter.op(Opcode::SLOAD)
            }
            ExprKind::CallerRead => self.emitter.op(Opcode::CALLER),
            ExprKind::ValueRead => self.emitter.op(Opcode::CALLVALUE),
            ExprKind::TimestampRead => self.emitter.op(Opcode::TIMESTAMP),
            ExprKind::Binary { op, lhs, rhs } => self.translate_binary(*op, lhs, rhs),
            ExprKind::Unary { op, operand } => {
                self.translate_expr(operand)?;
                self.emitter.op(match op {
                    UnaryOp::Not => Opcode::ISZERO,
                    UnaryOp::BitNot => Opcode::NOT,
                })
            }
            ExprKind::Length(value) => {
                self.translate_expr(value)?;
                self.emitter.op(Opcode::MLOAD)
            }
        }
    }

    fn translate_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<()> {
        let (opcode, negate) = match op {
            BinaryOp::And | BinaryOp::Or => return self.translate_short_circuit(op, lhs, rhs),
            BinaryOp::Add => (Opcode::ADD, false),
            BinaryOp::Mul => (Opcode::MUL, false),
            BinaryOp::BitAnd => (Opcode::AND, false),
            BinaryOp::BitOr => (Opcode::OR, false),
            BinaryOp::BitXor => (Opcode::XOR, false),
            BinaryOp::Eq => (Opcode::EQ, false),
            BinaryOp::Ne => (Opcode::EQ, true),
            BinaryOp::Sub => (Opcode::SUB, false),
            BinaryOp::Div => (Opcode::DIV, false),
            BinaryOp::Mod => (Opcode::MOD, false),
            BinaryOp::Pow => (Opcode::EXP, false),
            BinaryOp::Lt => (Opcode::LT, false),
            BinaryOp::Gt => (Opcode::GT, false),
            BinaryOp::Le => (Opcode::GT, true),
            BinaryOp::Ge => (Opcode::LT, true),
            // `SHL`/`SHR` take the shift amount from the top.
            BinaryOp::Shl | BinaryOp::Shr => {
                self.translate_expr(lhs)?;
                self.translate_expr(rhs)?;
                let opcode = if op == BinaryOp::Shl { Opcode::SHL } else { Opcode::SHR };
                return self.emitter.op(opcode);
            }
        };
        self.translate_expr(rhs)?;
        self.translate_expr(lhs)?;
        self.emitter.op(opcode)?;
        if negate {
            self.emitter.op(Opcode::ISZERO)?;
        }
        Ok(())
    }

    /// `and`/`or` skip their right operand once the left one decides the result.
    fn translate_short_circuit(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Result<()> {
        let done = self.emitter.new_label();
        self.translate_expr(lhs)?;
        self.emitter.op(Opcode::DUP1)?;
        if op == BinaryOp::And {
            self.emitter.op(Opcode::ISZERO)?;
        }
        self.emitter.jump_if(done)?;
        self.emitter.op(Opcode::POP)?;
        self.translate_expr(rhs)?;
        self.emitter.mark_jumpdest(done)
    }
}
