//! Interface descriptor: what a caller needs to talk to the deployed contract.

use crate::selector::{Selector, event_topic, selector};
use alloy_primitives::hex;
use cobra_data::{ContractDefinition, Param};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceDescriptor {
    pub functions: Vec<FunctionEntry>,
    pub events: Vec<EventEntry>,
    /// Whether deployment accepts value, `None` without a constructor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constructor_payable: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionEntry {
    pub name: String,
    pub signature: String,
    pub selector: Selector,
    pub inputs: Vec<ParamEntry>,
    pub outputs: Vec<ParamEntry>,
    #[serde(rename = "stateMutability")]
    pub mutability: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventEntry {
    pub name: String,
    pub signature: String,
    pub topic: String,
    pub inputs: Vec<ParamEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl ParamEntry {
    fn from_param(param: &Param) -> Self {
        Self { name: param.name.clone(), ty: param.ty.abi_name() }
    }
}

impl InterfaceDescriptor {
    pub fn from_contract(contract: &ContractDefinition) -> Self {
        let functions = contract
            .functions
            .iter()
            .map(|function| {
                let signature = &function.signature;
                let canonical = signature.canonical();
                FunctionEntry {
                    name: signature.name.clone(),
                    selector: selector(&canonical),
                    signature: canonical,
                    inputs: signature.params.iter().map(ParamEntry::from_param).collect(),
                    outputs: signature
                        .returns
                        .iter()
                        .map(|ty| ParamEntry { name: String::new(), ty: ty.abi_name() })
                        .collect(),
                    mutability: signature.mutability.as_str(),
                }
            })
            .collect();
        let events = contract
            .events
            .iter()
            .map(|event| {
                let canonical = event.canonical();
                EventEntry {
                    name: event.name.clone(),
                    topic: hex::encode_prefixed(event_topic(&canonical)),
                    signature: canonical,
                    inputs: event.fields.iter().map(ParamEntry::from_param).collect(),
                }
            })
            .collect();
        Self {
            functions,
            events,
            constructor_payable: contract.constructor.as_ref().map(|constructor| constructor.payable),
        }
    }

    pub fn function(&self, name: &str) -> Option<&FunctionEntry> {
        self.functions.iter().find(|function| function.name == name)
    }
}
