//! Source positions.
//!
//! Matching works on character indices. Line and column numbers are only
//! resolved when a result is handed out.

use std::fmt;

use ropey::Rope;
use serde::Serialize;

/// A half-open range of character indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-width span at `at`.
    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A character index with its 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A resolved [`Span`]. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

/// Resolves character indices of one text to lines and columns.
pub struct LineIndex {
    rope: Rope,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Indices past the end resolve to the end of the text.
    pub fn position(&self, index: usize) -> Position {
        let index = index.min(self.rope.len_chars());
        let line = self.rope.char_to_line(index);
        let column = index - self.rope.line_to_char(line);
        Position {
            index,
            line: line + 1,
            column: column + 1,
        }
    }

    pub fn locate(&self, span: Span) -> Location {
        Location {
            start: self.position(span.start),
            end: self.position(span.end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(index: usize, line: usize, column: usize) -> Position {
        Position {
            index,
            line,
            column,
        }
    }

    #[test]
    fn first_line() {
        let lines = LineIndex::new("hello\nworld");
        assert_eq!(lines.position(0), pos(0, 1, 1));
        assert_eq!(lines.position(4), pos(4, 1, 5));
    }

    #[test]
    fn after_newline() {
        let lines = LineIndex::new("hello\nworld");
        assert_eq!(lines.position(6), pos(6, 2, 1));
        assert_eq!(lines.position(11), pos(11, 2, 6));
    }

    #[test]
    fn crlf_is_one_break() {
        let lines = LineIndex::new("ab\r\ncd");
        assert_eq!(lines.position(4), pos(4, 2, 1));
    }

    #[test]
    fn columns_count_characters() {
        let lines = LineIndex::new("🐙🐙x");
        assert_eq!(lines.position(2), pos(2, 1, 3));
    }

    #[test]
    fn past_end_clamps() {
        let lines = LineIndex::new("ab");
        assert_eq!(lines.position(10), pos(2, 1, 3));
    }

    #[test]
    fn locate_span() {
        let lines = LineIndex::new("a\nbcd");
        let loc = lines.locate(Span::new(2, 4));
        assert_eq!(loc.start, pos(2, 2, 1));
        assert_eq!(loc.end, pos(4, 2, 3));
        assert_eq!(loc.end.to_string(), "2:3");
        assert_eq!(loc.to_string(), "[2:1-2:3]");
    }
}
