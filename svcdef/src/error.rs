//! Error types for building a service definition

use crate::diagnostics::{Location, Position, locate};
use pest::RuleType;
use pest::error::LineColLocation;
use thiserror::Error;

/// Result type alias for svcdef operations
pub type Result<T> = std::result::Result<T, Error>;

/// Root cause of a failed build, independent of any context wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Shape,
    Consolidation,
}

/// Fatal errors; the first one aborts the build.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A source unit is not valid source text
    #[error("syntax error: {}", locate(.message, .location))]
    Syntax {
        message: String,
        location: Option<Location>,
    },

    /// A recognized declaration breaks the generated-stub conventions
    #[error("shape error: {}", locate(.message, .location))]
    Shape {
        message: String,
        location: Option<Location>,
    },

    /// An HTTP annotation cannot be mapped onto its service method
    #[error("consolidation error: {}", locate(.message, .location))]
    Consolidation {
        message: String,
        location: Option<Location>,
    },

    /// Names the construct (message, service, method, ...) being processed
    /// when `source` occurred
    #[error("{construct}: {source}")]
    Context {
        construct: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub fn syntax(message: impl Into<String>, location: Option<Location>) -> Self {
        Self::Syntax {
            message: message.into(),
            location,
        }
    }

    pub fn shape(message: impl Into<String>, location: Option<Location>) -> Self {
        Self::Shape {
            message: message.into(),
            location,
        }
    }

    pub fn consolidation(message: impl Into<String>, location: Option<Location>) -> Self {
        Self::Consolidation {
            message: message.into(),
            location,
        }
    }

    pub(crate) fn from_pest<R: RuleType>(unit: &str, err: pest::error::Error<R>) -> Self {
        let (line, column) = match err.line_col {
            LineColLocation::Pos(pos) => pos,
            LineColLocation::Span(start, _) => start,
        };
        Self::syntax(
            err.variant.message().into_owned(),
            Some(Location::new(unit, Position::new(line, column))),
        )
    }

    /// Wraps this error with the name of the construct being processed.
    pub fn context(self, construct: impl Into<String>) -> Self {
        Self::Context {
            construct: construct.into(),
            source: Box::new(self),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::Shape { .. } => ErrorKind::Shape,
            Self::Consolidation { .. } => ErrorKind::Consolidation,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Where the root cause was found.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Syntax { location, .. }
            | Self::Shape { location, .. }
            | Self::Consolidation { location, .. } => location.as_ref(),
            Self::Context { source, .. } => source.location(),
        }
    }

    /// Message of the root cause, without location or context.
    pub fn message(&self) -> &str {
        match self {
            Self::Syntax { message, .. }
            | Self::Shape { message, .. }
            | Self::Consolidation { message, .. } => message,
            Self::Context { source, .. } => source.message(),
        }
    }

    /// Construct names from the outermost to the innermost wrapper.
    pub fn constructs(&self) -> Vec<&str> {
        let mut constructs = Vec::new();
        let mut current = self;
        while let Self::Context { construct, source } = current {
            constructs.push(construct.as_str());
            current = source;
        }
        constructs
    }
}
