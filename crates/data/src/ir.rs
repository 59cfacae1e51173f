//! Normalized statement and expression nodes produced by analysis.

use crate::{EventId, FieldId, InterfaceType, LocalId};
use alloy_primitives::U256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    LocalWrite { local: LocalId, value: Expr },
    StateWrite { field: FieldId, value: Expr },
    /// `keys` holds one expression per mapping level, outermost first.
    MappingWrite { field: FieldId, keys: Vec<Expr>, value: Expr },
    ArrayWrite { field: FieldId, index: Expr, value: Expr },
    If { condition: Expr, then_body: Vec<Stmt>, else_body: Vec<Stmt> },
    /// `for counter in range(start, end)`, `end` is evaluated once before the first iteration.
    For { counter: LocalId, start: Expr, end: Expr, body: Vec<Stmt> },
    Break,
    Continue,
    Emit { event: EventId, args: Vec<Expr> },
    Return(Option<Expr>),
    /// Reverts when `condition` is false, or unconditionally without one.
    Abort { condition: Option<Expr>, reason: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: InterfaceType,
}

impl Expr {
    pub fn new(kind: ExprKind, ty: InterfaceType) -> Self {
        Self { kind, ty }
    }

    pub fn literal(value: U256, ty: InterfaceType) -> Self {
        Self::new(ExprKind::Literal(value), ty)
    }

    pub fn uint(value: u64) -> Self {
        Self::literal(U256::from(value), InterfaceType::UInt256)
    }

    pub fn bool(value: bool) -> Self {
        Self::literal(U256::from(value as u8), InterfaceType::Bool)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, ty: InterfaceType) -> Self {
        Self::new(ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, ty)
    }

    /// Nesting depth of the expression tree.
    pub fn depth(&self) -> usize {
        1 + match &self.kind {
            ExprKind::MappingRead { keys, .. } => keys.iter().map(Expr::depth).max().unwrap_or(0),
            ExprKind::ArrayRead { index, .. } => index.depth(),
            ExprKind::Binary { lhs, rhs, .. } => lhs.depth().max(rhs.depth()),
            ExprKind::Unary { operand, .. } | ExprKind::Length(operand) => operand.depth(),
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Literal(U256),
    /// String or bytes literal, typed by the enclosing [`Expr`].
    Text(Vec<u8>),
    LocalRead(LocalId),
    StateRead(FieldId),
    MappingRead { field: FieldId, keys: Vec<Expr> },
    ArrayRead { field: FieldId, index: Box<Expr> },
    /// `msg.sender`
    CallerRead,
    /// `msg.value`
    ValueRead,
    /// `block.timestamp`
    TimestampRead,
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    /// Byte length of a dynamic value.
    Length(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Not,
    BitNot,
}
