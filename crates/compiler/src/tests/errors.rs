use crate::{CompileError, ErrorKind, SourceLocation, compile};
use cobra_codegen::{CodegenError, LabelId, Selector};

fn kind_of(source: &str) -> ErrorKind {
    match compile(source) {
        Ok(compiled) => panic!("expected `{}` to be rejected", compiled.name),
        Err(err) => err.kind,
    }
}

#[test]
fn analysis_errors_keep_their_kind_and_location() {
    assert_eq!(kind_of("class A:\n    x: uint256 = (\n"), ErrorKind::Syntax);
    assert_eq!(
        kind_of("class A:\n    def f(self) -> uint256:\n        return missing\n"),
        ErrorKind::Semantic
    );

    let err = compile("class A:\n    def f(self):\n        while True:\n            pass\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedConstruct);
    assert!(err.message.starts_with("unbounded loop"), "{}", err.message);
    assert_eq!(err.location.map(|location| location.line), Some(3));
}

#[test]
fn reassigning_a_loop_counter_is_rejected() {
    let source = "class A:\n    n: uint256\n\n    def run(self):\n        for i in range(3):\n            i = 0\n            self.n += 1\n";
    let err = compile(source).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnsupportedConstruct);
    assert!(err.message.starts_with("loop counter assignment"), "{}", err.message);
    assert_eq!(err.location.map(|location| location.line), Some(6));
}

#[test]
fn selector_collisions_are_compile_errors() {
    let source = "class A:\n    def burn(self, amount: uint256):\n        pass\n\n    def collate_propagate_storage(self, data: bytes16):\n        pass\n";
    let err = compile(source).unwrap_err();
    // `bytes16` is outside the supported types, so analysis stops first
    assert_eq!(err.kind, ErrorKind::Semantic);

    let collision: CompileError = CodegenError::SelectorCollision {
        selector: Selector([0x42, 0x96, 0x6c, 0x68]),
        first: "burn(uint256)".into(),
        second: "collate_propagate_storage(bytes16)".into(),
    }
    .into();
    assert_eq!(collision.kind, ErrorKind::SelectorCollision);
    assert!(collision.message.contains("0x42966c68"));
    assert_eq!(collision.location, None);
}

#[test]
fn codegen_errors_map_to_kinds() {
    let label = LabelId::new(3);
    let cases = [
        (CodegenError::StackOverflow { depth: 1025 }, ErrorKind::Stack),
        (CodegenError::StackMismatch { label, expected: 0, found: 1 }, ErrorKind::Stack),
        (CodegenError::UnresolvedLabel { label }, ErrorKind::UnresolvedLabel),
        (CodegenError::InvalidJumpTarget { label }, ErrorKind::Internal),
        (CodegenError::DanglingControlFrames { function: "f".into(), open: 1 }, ErrorKind::Internal),
    ];
    for (error, kind) in cases {
        assert_eq!(CompileError::from(error).kind, kind);
    }
}

#[test]
fn errors_render_with_their_kind() {
    let err = CompileError {
        kind: ErrorKind::Semantic,
        message: "unknown name `x`".into(),
        location: Some(SourceLocation::new(2, 5)),
    };
    assert_eq!(err.to_string(), "semantic error: unknown name `x`");
}
