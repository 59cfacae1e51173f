//! JSON renderings of compiled contracts.

use crate::CompiledContract;
use serde_json::{Value, json};

fn hex_code(code: &[u8]) -> String {
    alloy_primitives::hex::encode_prefixed(code)
}

impl CompiledContract {
    /// Solidity-style ABI: functions, then events, then the constructor when there is one.
    pub fn to_abi_json(&self) -> Value {
        let mut entries: Vec<Value> = self
            .interface
            .functions
            .iter()
            .map(|function| {
                json!({
                    "type": "function",
                    "name": function.name,
                    "inputs": function.inputs,
                    "outputs": function.outputs,
                    "stateMutability": function.mutability,
                })
            })
            .collect();
        entries.extend(self.events.iter().map(|event| {
            let inputs: Vec<Value> = event
                .inputs
                .iter()
                .map(|input| json!({ "name": input.name, "type": input.ty, "indexed": false }))
                .collect();
            json!({ "type": "event", "name": event.name, "inputs": inputs, "anonymous": false })
        }));
        if let Some(payable) = self.interface.constructor_payable {
            entries.push(json!({
                "type": "constructor",
                "inputs": [],
                "stateMutability": if payable { "payable" } else { "nonpayable" },
            }));
        }
        Value::Array(entries)
    }

    /// Everything needed to deploy and call the contract.
    pub fn to_artifact_json(&self) -> Value {
        let selectors: serde_json::Map<String, Value> = self
            .interface
            .functions
            .iter()
            .map(|function| (function.signature.clone(), json!(function.selector)))
            .collect();
        json!({
            "contractName": self.name,
            "abi": self.to_abi_json(),
            "bytecode": hex_code(&self.bytecode),
            "deployedBytecode": hex_code(&self.runtime_bytecode),
            "methodIdentifiers": selectors,
            "storageLayout": self.storage_layout,
        })
    }
}
