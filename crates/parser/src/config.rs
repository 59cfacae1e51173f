/// Bounds enforced while analyzing a contract.
///
/// They keep analysis and code size bounded on adversarial input; exceeding any of them is
/// reported as an unsupported construct rather than a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Combined nesting of blocks and expressions.
    pub max_depth: usize,
    pub max_functions: usize,
    pub max_loops_per_function: usize,
    /// Upper bound for `range` loops whose bounds are both literals.
    pub max_range_iterations: u64,
}

impl AnalyzerConfig {
    pub const DEFAULT_MAX_DEPTH: usize = 64;
    pub const DEFAULT_MAX_FUNCTIONS: usize = 256;
    pub const DEFAULT_MAX_LOOPS_PER_FUNCTION: usize = 16;
    pub const DEFAULT_MAX_RANGE_ITERATIONS: u64 = 1024;
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_depth: Self::DEFAULT_MAX_DEPTH,
            max_functions: Self::DEFAULT_MAX_FUNCTIONS,
            max_loops_per_function: Self::DEFAULT_MAX_LOOPS_PER_FUNCTION,
            max_range_iterations: Self::DEFAULT_MAX_RANGE_ITERATIONS,
        }
    }
}
