mod lowering;

use crate::{AnalysisError, AnalyzerConfig, analyze};
use cobra_data::ContractDefinition;

pub(crate) fn analyze_ok(source: &str) -> ContractDefinition {
    analyze(source, &AnalyzerConfig::default())
        .unwrap_or_else(|err| panic!("analysis failed: {err}\n{source}"))
}

pub(crate) fn analyze_err(source: &str) -> AnalysisError {
    match analyze(source, &AnalyzerConfig::default()) {
        Ok(contract) => panic!("expected analysis to fail, got:\n{contract}"),
        Err(err) => err,
    }
}

/// Wraps method bodies in a contract with a few fields to refer to.
pub(crate) fn contract_with(members: &str) -> String {
    let members: String = members.lines().map(|line| format!("    {line}\n")).collect();
    format!(
        "class Test:\n\
         \x20   total: uint256\n\
         \x20   owner: address\n\
         \x20   balances: mapping[address, uint256]\n\
         \x20   allowances: mapping[address, mapping[address, uint256]]\n\
         \x20   history: array[uint256, 4]\n\
         \n\
         \x20   @event\n\
         \x20   def Moved(sender: address, amount: uint256): ...\n\
         \n\
         {members}"
    )
}
