mod errors;
mod execution;

use crate::{CompiledContract, compile};

pub(crate) fn compile_ok(source: &str) -> CompiledContract {
    compile(source).unwrap_or_else(|err| panic!("compilation failed: {err}\n{source}"))
}

pub(crate) const COUNTER: &str = r#"
from pymon import Contract, public_function, view_function

class Counter(Contract):
    count: uint256 = 0

    @public_function
    def increment(self):
        self.count += 1

    @view_function
    def get(self) -> uint256:
        return self.count
"#;
