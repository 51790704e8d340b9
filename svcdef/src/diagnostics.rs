//! Source positions and non-fatal warnings.
//!
//! Every error and warning points at a source unit (the identifier the caller
//! supplied for a stub or IDL text) and, when the parse gave us one, a
//! 1-based line and column inside it.

use pest::RuleType;
use pest::iterators::Pair;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    pub(crate) fn of<R: RuleType>(pair: &Pair<'_, R>) -> Self {
        let (line, column) = pair.as_span().start_pos().line_col();
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub unit: String,
    pub position: Option<Position>,
}

impl Location {
    pub fn new(unit: impl Into<String>, position: Position) -> Self {
        Self {
            unit: unit.into(),
            position: Some(position),
        }
    }

    /// A location known only by its source unit.
    pub fn unit(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            position: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in file {:?}", self.unit)?;
        if let Some(position) = self.position {
            write!(f, " at line {position}")?;
        }
        Ok(())
    }
}

/// Renders `message` followed by its location, if any.
pub(crate) fn locate(message: &str, location: &Option<Location>) -> String {
    match location {
        Some(location) => format!("{message} {location}"),
        None => message.to_string(),
    }
}

/// A construct that was skipped without aborting the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub message: String,
    pub location: Option<Location>,
}

impl Warning {
    pub fn new(message: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&locate(&self.message, &self.location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_unit_and_position() {
        let location = Location::new("svc/echo.pb.go", Position::new(12, 2));
        assert_eq!(
            locate("unexpected interface", &Some(location)),
            r#"unexpected interface in file "svc/echo.pb.go" at line 12:2"#
        );
    }

    #[test]
    fn degrades_without_position_or_unit() {
        assert_eq!(
            locate("boom", &Some(Location::unit("a.proto"))),
            r#"boom in file "a.proto""#
        );
        assert_eq!(locate("boom", &None), "boom");
        assert_eq!(Warning::new("skipped", None).to_string(), "skipped");
    }
}
