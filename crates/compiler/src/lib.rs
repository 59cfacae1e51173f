//! Contract compiler driver
//!
//! Runs analysis and code generation for one source unit, or many in parallel, and packages the
//! result as a [`CompiledContract`]: deployment code, runtime code, the interface descriptor and
//! the storage layout.

mod config;
mod error;
mod json;

#[cfg(test)]
mod tests;

pub use cobra_codegen::{EventEntry, FunctionEntry, InterfaceDescriptor, ParamEntry, Selector};
pub use cobra_data::{ContractDefinition, SourceLocation};
pub use cobra_parser::{AnalyzerConfig, highlight_location};
pub use config::CompilerConfig;
pub use error::{CompileError, ErrorKind, Result};

use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledContract {
    pub name: String,
    /// Deployment code, or the runtime code under [`CompilerConfig::emit_runtime_only`].
    pub bytecode: Vec<u8>,
    pub runtime_bytecode: Vec<u8>,
    pub interface: InterfaceDescriptor,
    pub events: Vec<EventEntry>,
    pub storage_layout: Vec<StorageEntry>,
}

/// One state field and the slot it starts at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub slot: String,
}

/// Analysis only: the typed contract, without code generation.
pub fn analyze(source: &str, config: &AnalyzerConfig) -> Result<ContractDefinition> {
    Ok(cobra_parser::analyze(source, config)?)
}

pub fn compile(source: &str) -> Result<CompiledContract> {
    compile_with_config(source, &CompilerConfig::default())
}

pub fn compile_with_config(source: &str, config: &CompilerConfig) -> Result<CompiledContract> {
    let contract = analyze(source, &config.analyzer)?;
    log::debug!(
        "analyzed `{}`: {} field(s), {} function(s), {} event(s)",
        contract.name,
        contract.fields.len(),
        contract.functions.len(),
        contract.events.len()
    );
    compile_definition(&contract, config)
}

/// Generates code for an already analyzed contract.
pub fn compile_definition(
    contract: &ContractDefinition,
    config: &CompilerConfig,
) -> Result<CompiledContract> {
    let artifact = cobra_codegen::generate(contract)?;
    let storage_layout = contract
        .fields
        .iter()
        .map(|field| StorageEntry {
            name: field.name.clone(),
            ty: field.ty.abi_name(),
            slot: field.slot.to_string(),
        })
        .collect();
    let bytecode = if config.emit_runtime_only { artifact.runtime.clone() } else { artifact.creation };
    Ok(CompiledContract {
        name: contract.name.clone(),
        bytecode,
        runtime_bytecode: artifact.runtime,
        events: artifact.interface.events.clone(),
        interface: artifact.interface,
        storage_layout,
    })
}

/// Compiles independent sources in parallel. Results keep the input order and one failure does
/// not affect the others.
pub fn compile_batch<S>(sources: &[S], config: &CompilerConfig) -> Vec<Result<CompiledContract>>
where
    S: AsRef<str> + Sync,
{
    log::debug!("compiling {} source unit(s)", sources.len());
    let results: Vec<_> =
        sources.par_iter().map(|source| compile_with_config(source.as_ref(), config)).collect();
    let failed = results.iter().filter(|result| result.is_err()).count();
    log::debug!("batch finished: {} compiled, {failed} failed", results.len() - failed);
    results
}
