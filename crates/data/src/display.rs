//! Textual rendering of an analyzed contract, used by `cobra --ir` and snapshot tests.

use crate::{
    ContractDefinition, Expr, ExprKind, IndexSlice, Local, LocalId, Stmt, UnaryOp,
};
use std::fmt::{self, Write};

impl fmt::Display for ContractDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "contract {}", self.name)?;
        for field in self.fields.iter() {
            writeln!(f, "  field {}: {} @ slot {}", field.name, field.ty, field.slot)?;
        }
        for event in self.events.iter() {
            writeln!(f, "  event {}", event.canonical())?;
        }
        if let Some(constructor) = &self.constructor {
            let payable = if constructor.payable { " payable" } else { "" };
            writeln!(f, "  constructor{payable}:")?;
            let printer = Printer { contract: self, locals: &constructor.locals };
            printer.block(f, &constructor.body, 2)?;
        }
        for function in self.functions.iter() {
            let signature = &function.signature;
            write!(f, "  fn {} {}", signature.canonical(), signature.mutability.as_str())?;
            if let Some(returns) = &signature.returns {
                write!(f, " -> {returns}")?;
            }
            writeln!(f, ":")?;
            let printer = Printer { contract: self, locals: &function.locals };
            printer.block(f, &function.body, 2)?;
        }
        Ok(())
    }
}

struct Printer<'a> {
    contract: &'a ContractDefinition,
    locals: &'a IndexSlice<LocalId, [Local]>,
}

impl Printer<'_> {
    fn block(&self, f: &mut impl Write, body: &[Stmt], depth: usize) -> fmt::Result {
        if body.is_empty() {
            return writeln!(f, "{:width$}pass", "", width = depth * 2);
        }
        body.iter().try_for_each(|stmt| self.stmt(f, stmt, depth))
    }

    fn stmt(&self, f: &mut impl Write, stmt: &Stmt, depth: usize) -> fmt::Result {
        let pad = depth * 2;
        write!(f, "{:pad$}", "")?;
        match stmt {
            Stmt::LocalWrite { local, value } => {
                writeln!(f, "${} = {}", self.locals[*local].name, self.expr(value))
            }
            Stmt::StateWrite { field, value } => {
                writeln!(f, "{} = {}", self.field(*field), self.expr(value))
            }
            Stmt::MappingWrite { field, keys, value } => {
                writeln!(f, "{}{} = {}", self.field(*field), self.keys(keys), self.expr(value))
            }
            Stmt::ArrayWrite { field, index, value } => {
                writeln!(f, "{}[{}] = {}", self.field(*field), self.expr(index), self.expr(value))
            }
            Stmt::If { condition, then_body, else_body } => {
                writeln!(f, "if {}:", self.expr(condition))?;
                self.block(f, then_body, depth + 1)?;
                if !else_body.is_empty() {
                    writeln!(f, "{:pad$}else:", "")?;
                    self.block(f, else_body, depth + 1)?;
                }
                Ok(())
            }
            Stmt::For { counter, start, end, body } => {
                writeln!(
                    f,
                    "for ${} in {}..{}:",
                    self.locals[*counter].name,
                    self.expr(start),
                    self.expr(end)
                )?;
                self.block(f, body, depth + 1)
            }
            Stmt::Break => writeln!(f, "break"),
            Stmt::Continue => writeln!(f, "continue"),
            Stmt::Emit { event, args } => {
                let args: Vec<String> = args.iter().map(|arg| self.expr(arg)).collect();
                writeln!(f, "emit {}({})", self.contract.events[*event].name, args.join(", "))
            }
            Stmt::Return(None) => writeln!(f, "return"),
            Stmt::Return(Some(value)) => writeln!(f, "return {}", self.expr(value)),
            Stmt::Abort { condition, reason } => {
                match condition {
                    Some(condition) => write!(f, "require {}", self.expr(condition))?,
                    None => write!(f, "revert")?,
                }
                match reason {
                    Some(reason) => writeln!(f, " {reason:?}"),
                    None => writeln!(f),
                }
            }
        }
    }

    fn field(&self, field: crate::FieldId) -> String {
        format!("self.{}", self.contract.fields[field].name)
    }

    fn keys(&self, keys: &[Expr]) -> String {
        keys.iter().map(|key| format!("[{}]", self.expr(key))).collect()
    }

    fn expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Literal(value) => format!("{value}"),
            ExprKind::Text(bytes) => format!("{:?}", String::from_utf8_lossy(bytes)),
            ExprKind::LocalRead(local) => format!("${}", self.locals[*local].name),
            ExprKind::StateRead(field) => self.field(*field),
            ExprKind::MappingRead { field, keys } => {
                format!("{}{}", self.field(*field), self.keys(keys))
            }
            ExprKind::ArrayRead { field, index } => {
                format!("{}[{}]", self.field(*field), self.expr(index))
            }
            ExprKind::CallerRead => "msg.sender".into(),
            ExprKind::ValueRead => "msg.value".into(),
            ExprKind::TimestampRead => "block.timestamp".into(),
            ExprKind::Binary { op, lhs, rhs } => {
                format!("({} {} {})", self.expr(lhs), op.symbol(), self.expr(rhs))
            }
            ExprKind::Unary { op: UnaryOp::Not, operand } => format!("not {}", self.expr(operand)),
            ExprKind::Unary { op: UnaryOp::BitNot, operand } => format!("~{}", self.expr(operand)),
            ExprKind::Length(operand) => format!("len({})", self.expr(operand)),
        }
    }
}
