//! Surface syntax tree, as written in the source. Names are unresolved and nothing is typed yet.

use crate::error::AnalysisError;
use alloy_primitives::U256;
use cobra_data::{BinaryOp, SourceLocation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<String>,
    pub members: Vec<Member>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    Field(FieldDecl),
    Method(FunctionDef),
    Unsupported(Unsupported, SourceLocation),
}

/// Valid Python outside the contract subset. The parser keeps these in the tree so the one that
/// comes first in the source is the one reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported {
    pub construct: &'static str,
    pub message: &'static str,
}

impl Unsupported {
    pub const fn new(construct: &'static str, message: &'static str) -> Self {
        Self { construct, message }
    }

    pub fn error(self, location: SourceLocation) -> AnalysisError {
        AnalysisError::unsupported(self.construct, self.message, location)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    /// Missing for `x = value`, which lowering rejects.
    pub annotation: Option<Expr>,
    pub value: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decorator {
    pub name: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub name: String,
    pub annotation: Option<Expr>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    pub name: String,
    pub decorators: Vec<Decorator>,
    pub params: Vec<ParamDecl>,
    pub returns: Option<Expr>,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Expr(Expr),
    Assign { target: Expr, value: Expr },
    AnnAssign { target: Expr, annotation: Expr, value: Option<Expr> },
    AugAssign { target: Expr, op: BinaryOp, value: Expr },
    If { condition: Expr, body: Vec<Stmt>, orelse: Vec<Stmt> },
    For { target: String, iter: Expr, body: Vec<Stmt> },
    Return(Option<Expr>),
    Assert { test: Expr, message: Option<Expr> },
    Pass,
    Break,
    Continue,
    Unsupported(Unsupported),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprKind {
    Name(String),
    Int(U256),
    Str(Vec<u8>),
    Bytes(Vec<u8>),
    Bool(bool),
    None,
    Ellipsis,
    Attribute { value: Box<Expr>, attr: String },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    /// Only produced inside subscripts, e.g. `mapping[address, uint256]`.
    Tuple(Vec<Expr>),
    Call { func: Box<Expr>, args: Vec<Expr> },
    /// Arithmetic, bitwise, comparison and boolean operators.
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnaryOperator, operand: Box<Expr> },
    Unsupported(Unsupported),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Pos,
    Not,
    Invert,
}

impl Expr {
    pub fn new(kind: ExprKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }

    /// `self.<attr>` when this expression is exactly that.
    pub fn self_attribute(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Attribute { value, attr } if value.is_name("self") => Some(attr),
            _ => None,
        }
    }

    pub fn is_name(&self, name: &str) -> bool {
        matches!(&self.kind, ExprKind::Name(n) if n == name)
    }
}
