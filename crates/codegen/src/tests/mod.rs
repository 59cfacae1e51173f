mod emitter;
mod execution;
mod prop_tests;
mod selectors;

use crate::{Artifact, generate};
use cobra_parser::{AnalyzerConfig, analyze};
use test_utils::ContractHarness;

pub(crate) fn compile(source: &str) -> Artifact {
    let contract = analyze(source, &AnalyzerConfig::default())
        .unwrap_or_else(|err| panic!("analysis failed: {err}\n{source}"));
    generate(&contract).unwrap_or_else(|err| panic!("code generation failed: {err}\n{contract}"))
}

pub(crate) fn deploy(source: &str) -> ContractHarness {
    let artifact = compile(source);
    ContractHarness::deploy(&artifact.creation).unwrap_or_else(|err| panic!("{err}\n{source}"))
}
