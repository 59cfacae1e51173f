use cobra_data::SourceLocation;
use thiserror::Error;

/// Why a contract source was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The source does not lex or parse.
    #[error("syntax error at {location}: {message}")]
    Syntax { message: String, location: SourceLocation },
    /// Well formed, but names, types or mutability do not check.
    #[error("{message} at {location}")]
    Semantic { message: String, location: SourceLocation },
    /// Valid Python that falls outside the compilable subset.
    #[error("unsupported construct `{construct}` at {location}: {message}")]
    Unsupported { construct: String, message: String, location: SourceLocation },
}

impl AnalysisError {
    pub fn syntax(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Syntax { message: message.into(), location }
    }

    pub fn semantic(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::Semantic { message: message.into(), location }
    }

    pub fn unsupported(
        construct: impl Into<String>,
        message: impl Into<String>,
        location: SourceLocation,
    ) -> Self {
        Self::Unsupported { construct: construct.into(), message: message.into(), location }
    }

    pub fn location(&self) -> SourceLocation {
        match self {
            Self::Syntax { location, .. }
            | Self::Semantic { location, .. }
            | Self::Unsupported { location, .. } => *location,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Syntax { message, .. }
            | Self::Semantic { message, .. }
            | Self::Unsupported { message, .. } => message,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
