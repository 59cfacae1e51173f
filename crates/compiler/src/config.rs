use cobra_parser::AnalyzerConfig;

/// Configuration for a compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompilerConfig {
    pub analyzer: AnalyzerConfig,
    /// Put the runtime code in [`CompiledContract::bytecode`](crate::CompiledContract) instead
    /// of deployment code, for running functions without a deployment step.
    pub emit_runtime_only: bool,
}

impl CompilerConfig {
    pub fn runtime_only() -> Self {
        Self { emit_runtime_only: true, ..Self::default() }
    }
}
