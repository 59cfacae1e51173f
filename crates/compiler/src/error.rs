use cobra_codegen::CodegenError;
use cobra_data::SourceLocation;
use cobra_parser::AnalysisError;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Semantic,
    UnsupportedConstruct,
    SelectorCollision,
    Stack,
    UnresolvedLabel,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Syntax => "syntax error",
            Self::Semantic => "semantic error",
            Self::UnsupportedConstruct => "unsupported construct",
            Self::SelectorCollision => "selector collision",
            Self::Stack => "stack error",
            Self::UnresolvedLabel => "unresolved label",
            Self::Internal => "internal error",
        })
    }
}

/// Why a compilation produced no artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    /// Source position, for errors found before code generation.
    pub location: Option<SourceLocation>,
}

impl CompileError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), location: None }
    }
}

impl From<AnalysisError> for CompileError {
    fn from(error: AnalysisError) -> Self {
        let kind = match &error {
            AnalysisError::Syntax { .. } => ErrorKind::Syntax,
            AnalysisError::Semantic { .. } => ErrorKind::Semantic,
            AnalysisError::Unsupported { .. } => ErrorKind::UnsupportedConstruct,
        };
        let message = match &error {
            AnalysisError::Unsupported { construct, message, .. } => format!("{construct}: {message}"),
            other => other.message().to_string(),
        };
        Self { kind, message, location: Some(error.location()) }
    }
}

impl From<CodegenError> for CompileError {
    fn from(error: CodegenError) -> Self {
        let kind = match &error {
            CodegenError::StackUnderflow { .. }
            | CodegenError::StackOverflow { .. }
            | CodegenError::StackMismatch { .. } => ErrorKind::Stack,
            CodegenError::UnresolvedLabel { .. } => ErrorKind::UnresolvedLabel,
            CodegenError::SelectorCollision { .. } => ErrorKind::SelectorCollision,
            CodegenError::LabelRebound { .. }
            | CodegenError::InvalidJumpTarget { .. }
            | CodegenError::OffsetTooLarge { .. }
            | CodegenError::DanglingControlFrames { .. }
            | CodegenError::UnsupportedOpcode { .. }
            | CodegenError::Assembly(_)
            | CodegenError::InvalidIr(_) => ErrorKind::Internal,
        };
        Self::new(kind, error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
