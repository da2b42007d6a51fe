use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::Location;

/// A source position in the game description, for diagnostics.
///
/// Line and column values are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

impl From<&Location<'_>> for SourceLocation {
    fn from(loc: &Location<'_>) -> Self {
        Self::new(loc.file(), loc.line(), loc.column())
    }
}

/// Capability that turns a builder call site into a diagnostic location.
///
/// A provider may legitimately have nothing to report; callers carry the
/// `None` through and produce diagnostics without a location.
pub trait LocationProvider: Send + Sync {
    fn locate(&self, caller: &'static Location<'static>) -> Option<SourceLocation>;
}

/// Reports the Rust call site of the builder method (via `#[track_caller]`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CallerLocation;

impl LocationProvider for CallerLocation {
    fn locate(&self, caller: &'static Location<'static>) -> Option<SourceLocation> {
        Some(SourceLocation::from(caller))
    }
}

/// Never reports a location.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn locate(&self, _caller: &'static Location<'static>) -> Option<SourceLocation> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn here() -> &'static Location<'static> {
        Location::caller()
    }

    #[test]
    fn caller_location_reports_this_file() {
        let loc = CallerLocation.locate(here()).unwrap();
        assert!(loc.file.ends_with("location.rs"));
        assert!(loc.line > 0);
    }

    #[test]
    fn no_location_is_absent() {
        assert_eq!(NoLocation.locate(here()), None);
    }

    #[test]
    fn display_format() {
        let loc = SourceLocation::new("game.rs", 12, 5);
        assert_eq!(format!("{loc}"), "game.rs:12:5");
    }
}
