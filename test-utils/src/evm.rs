//! In-memory EVM for deploying and calling compiled contracts.

use revm::{
    Database, Evm, InMemoryDB,
    primitives::{
        AccountInfo, Address, Bytes, ExecutionResult, KECCAK_EMPTY, Log, Output, TransactTo, U256,
        address,
    },
};

/// Account used for deployments and calls unless another caller is given.
pub const CALLER: Address = address!("9000000000000000000000000000000000000000");

const GAS_LIMIT: u64 = 10_000_000;

#[derive(Debug, Clone)]
pub enum Outcome {
    Success { output: Bytes, logs: Vec<Log>, gas_used: u64 },
    Revert { output: Bytes },
    Halt { reason: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Revert { .. })
    }

    /// Return data of a successful call, panics otherwise.
    pub fn output(&self) -> &[u8] {
        match self {
            Self::Success { output, .. } => output,
            other => panic!("expected success, got {other:?}"),
        }
    }

    pub fn logs(&self) -> &[Log] {
        match self {
            Self::Success { logs, .. } => logs,
            other => panic!("expected success, got {other:?}"),
        }
    }

    /// Revert data, panics unless the call reverted.
    pub fn revert_data(&self) -> &[u8] {
        match self {
            Self::Revert { output } => output,
            other => panic!("expected revert, got {other:?}"),
        }
    }
}

impl From<ExecutionResult> for Outcome {
    fn from(result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Success { output, logs, gas_used, .. } => {
                let output = match output {
                    Output::Call(bytes) => bytes,
                    Output::Create(bytes, _) => bytes,
                };
                Self::Success { output, logs, gas_used }
            }
            ExecutionResult::Revert { output, .. } => Self::Revert { output },
            ExecutionResult::Halt { reason, .. } => Self::Halt { reason: format!("{reason:?}") },
        }
    }
}

/// A deployed contract inside its own in-memory chain.
pub struct ContractHarness {
    evm: Evm<'static, (), InMemoryDB>,
    pub address: Address,
    runtime: Bytes,
}

impl ContractHarness {
    pub fn deploy(creation: &[u8]) -> Result<Self, String> {
        Self::deploy_with_value(creation, U256::ZERO)
    }

    pub fn deploy_with_value(creation: &[u8], value: U256) -> Result<Self, String> {
        let mut db = InMemoryDB::default();
        db.insert_account_info(
            CALLER,
            AccountInfo {
                balance: U256::from(1_000_000_000_000_000_000u64),
                nonce: 0,
                code_hash: KECCAK_EMPTY,
                code: None,
            },
        );
        let mut evm = Evm::builder()
            .with_db(db)
            .modify_tx_env(|tx| {
                tx.caller = CALLER;
                tx.transact_to = TransactTo::Create;
                tx.data = Bytes::copy_from_slice(creation);
                tx.gas_limit = GAS_LIMIT;
                tx.gas_price = U256::from(1);
                tx.value = value;
            })
            .build();
        let result = evm.transact_commit().map_err(|e| format!("deployment error: {e:?}"))?;
        match result {
            ExecutionResult::Success { output: Output::Create(runtime, Some(address)), .. } => {
                Ok(Self { evm, address, runtime })
            }
            other => Err(format!("deployment failed: {other:?}")),
        }
    }

    pub fn call(&mut self, calldata: Vec<u8>) -> Outcome {
        self.call_with(CALLER, calldata, U256::ZERO)
    }

    pub fn call_with(&mut self, caller: Address, calldata: Vec<u8>, value: U256) -> Outcome {
        if caller != CALLER {
            self.fund(caller);
        }
        let address = self.address;
        let tx = self.evm.tx_mut();
        tx.caller = caller;
        tx.transact_to = TransactTo::Call(address);
        tx.data = calldata.into();
        tx.value = value;
        match self.evm.transact_commit() {
            Ok(result) => result.into(),
            Err(error) => Outcome::Halt { reason: format!("{error:?}") },
        }
    }

    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.evm.block_mut().timestamp = U256::from(timestamp);
    }

    pub fn storage(&mut self, slot: U256) -> U256 {
        let address = self.address;
        self.evm.db_mut().storage(address, slot).expect("in-memory storage read")
    }

    /// Code returned by the deployment.
    pub fn runtime_code(&self) -> &[u8] {
        &self.runtime
    }

    fn fund(&mut self, account: Address) {
        let db = self.evm.db_mut();
        if db.basic(account).ok().flatten().is_some_and(|info| info.balance > U256::ZERO) {
            return;
        }
        db.insert_account_info(
            account,
            AccountInfo {
                balance: U256::from(1_000_000_000_000_000_000u64),
                nonce: 0,
                code_hash: KECCAK_EMPTY,
                code: None,
            },
        );
    }
}
