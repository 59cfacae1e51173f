pub mod index;
pub mod ir;
mod display;
mod location;
mod storage;
mod types;

pub use crate::{
    index::*,
    ir::{BinaryOp, Expr, ExprKind, Stmt, UnaryOp},
    location::SourceLocation,
    storage::StorageLayout,
    types::InterfaceType,
};
use alloy_primitives::U256;

/// A contract after analysis: every name resolved, every expression typed and every state field
/// bound to its storage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractDefinition {
    pub name: String,
    pub fields: IndexVec<FieldId, StateField>,
    pub events: IndexVec<EventId, EventDeclaration>,
    pub functions: IndexVec<FunctionId, Function>,
    /// Field initializers followed by the `__init__` body.
    pub constructor: Option<Constructor>,
}

impl ContractDefinition {
    pub fn field_by_name(&self, name: &str) -> Option<FieldId> {
        self.fields.position(|field| field.name == name)
    }

    pub fn function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions.position(|function| function.signature.name == name)
    }

    pub fn event_by_name(&self, name: &str) -> Option<EventId> {
        self.events.position(|event| event.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateField {
    pub name: String,
    pub ty: InterfaceType,
    pub slot: U256,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutability {
    View,
    Mutating,
    Payable,
}

impl Mutability {
    /// Name used for `stateMutability` in interface descriptors.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Mutating => "nonpayable",
            Self::Payable => "payable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: InterfaceType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub params: Vec<Param>,
    pub returns: Option<InterfaceType>,
    pub mutability: Mutability,
}

impl FunctionSignature {
    /// `name(type1,type2)` as hashed into the call selector.
    pub fn canonical(&self) -> String {
        canonical_signature(&self.name, &self.params)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    pub name: String,
    pub ty: InterfaceType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub signature: FunctionSignature,
    /// The first `signature.params.len()` locals are the parameters.
    pub locals: IndexVec<LocalId, Local>,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constructor {
    pub payable: bool,
    pub locals: IndexVec<LocalId, Local>,
    pub body: Vec<Stmt>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDeclaration {
    pub name: String,
    pub fields: Vec<Param>,
    pub location: SourceLocation,
}

impl EventDeclaration {
    pub fn canonical(&self) -> String {
        canonical_signature(&self.name, &self.fields)
    }
}

fn canonical_signature(name: &str, params: &[Param]) -> String {
    let types: Vec<String> = params.iter().map(|param| param.ty.abi_name()).collect();
    format!("{name}({})", types.join(","))
}
