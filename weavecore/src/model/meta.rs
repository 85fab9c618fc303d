use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::model::name::Name;

/// A position in a source file, line and column, both 1-based (0 means "unknown")
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number of the position
    pub line: u32,
    /// Column number of the position
    pub col: u32,
}

/// The range of source text a definition was parsed from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRange {
    /// Where the definition starts
    pub start: Position,
    /// Where the definition stops
    pub stop: Position,
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}..{}:{}",
            self.start.line, self.start.col, self.stop.line, self.stop.col
        )
    }
}

/// Identifies the package and file a definition came from, for diagnostics
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// The package the definition belongs to
    pub package: Name,
    /// The file within the package
    pub file: Name,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.file)
    }
}
