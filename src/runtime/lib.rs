// Copyright (c) 2018 Fabian Schuiki

//! Character sources and position bookkeeping shared by rexlr lexers and
//! parsers.
//!
//! The generator crate compiles token and grammar descriptions into automata.
//! This crate holds the pieces those automata need at run time: seekable
//! input sources with bounded backtracking, a circular byte buffer for
//! streaming input, and the `Position`/`Span` types attached to tokens and
//! parse results.

#![deny(missing_docs)]

#[macro_use]
extern crate log;

pub mod buffer;
pub mod source;

use std::fmt;

pub use crate::buffer::{BufferError, RotatingBuffer};
pub use crate::source::{SeekError, Seekable, SliceSource, StrSource, StreamSource, TextSource};

/// A location in a text source.
///
/// Both coordinates are zero-based and describe the cursor position between
/// characters. They are displayed one-based, as `line:column`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    /// The line number, counting `\r`, `\n` and `\r\n` as one break each.
    pub line: usize,
    /// The number of characters since the last line break.
    pub column: usize,
}

impl Position {
    /// Create a new position.
    pub fn new(line: usize, column: usize) -> Position {
        Position { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// A range in a text source, from `start` up to but excluding `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// The position before the first character.
    pub start: Position,
    /// The position after the last character.
    pub end: Position,
}

impl Span {
    /// Create a new span.
    pub fn new(start: Position, end: Position) -> Span {
        Span { start, end }
    }

    /// Create a zero-width span at a position.
    pub fn empty(at: Position) -> Span {
        Span { start: at, end: at }
    }

    /// Check whether the span covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// The smallest span covering both `self` and `other`.
    pub fn union(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_display_one_based() {
        assert_eq!(Position::new(0, 0).to_string(), "1:1");
        assert_eq!(Position::new(2, 7).to_string(), "3:8");
        let span = Span::new(Position::new(0, 1), Position::new(1, 0));
        assert_eq!(span.to_string(), "1:2-2:1");
    }

    #[test]
    fn union_covers_both() {
        let a = Span::new(Position::new(0, 4), Position::new(0, 6));
        let b = Span::new(Position::new(0, 0), Position::new(0, 2));
        assert_eq!(a.union(b), Span::new(Position::new(0, 0), Position::new(0, 6)));
        assert!(Span::empty(Position::new(3, 3)).is_empty());
    }
}
