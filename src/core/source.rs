//! Positions, ranges and line-indexed source text
//!
//! Columns count Unicode scalar values, never bytes, so ranges stay valid for
//! non-ASCII identifiers and string literals.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Zero-based line/character position in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open span between two positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Whether `other` lies entirely within this range
    pub fn contains_range(&self, other: &Range) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Full text of one source file, split into lines of chars
#[derive(Debug, Clone)]
pub struct SourceDocument {
    uri: PathBuf,
    lines: Vec<Vec<char>>,
}

impl SourceDocument {
    pub fn new(uri: impl Into<PathBuf>, text: &str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).chars().collect())
            .collect();

        Self {
            uri: uri.into(),
            lines,
        }
    }

    pub fn uri(&self) -> &Path {
        &self.uri
    }

    #[cfg(test)]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Characters of a line, or `None` past the end of the document
    pub fn line(&self, line: u32) -> Option<&[char]> {
        self.lines.get(line as usize).map(Vec::as_slice)
    }

    pub fn line_text(&self, line: u32) -> String {
        self.line(line).map(|chars| chars.iter().collect()).unwrap_or_default()
    }

    pub fn char_at(&self, position: Position) -> Option<char> {
        self.line(position.line)?
            .get(position.character as usize)
            .copied()
    }

    /// Character just before a position on the same line
    pub fn char_before(&self, position: Position) -> Option<char> {
        let character = position.character.checked_sub(1)?;
        self.char_at(Position::new(position.line, character))
    }

    /// Iterate positions and chars forward from `start`, crossing line ends.
    /// Line breaks are reported as '\n' at the column after the last char.
    pub fn chars_from(&self, start: Position) -> impl Iterator<Item = (Position, char)> + '_ {
        let first_line = start.line as usize;
        self.lines
            .iter()
            .enumerate()
            .skip(first_line)
            .flat_map(move |(index, chars)| {
                let from = if index == first_line {
                    start.character as usize
                } else {
                    0
                };
                let line = index as u32;
                let body = chars
                    .iter()
                    .enumerate()
                    .skip(from)
                    .map(move |(column, c)| (Position::new(line, column as u32), *c));
                let newline = std::iter::once((Position::new(line, chars.len() as u32), '\n'));
                body.chain(newline)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_columns_are_char_based() {
        let doc = SourceDocument::new("a.py", "x = \"héllo\"; f(1)\n");
        assert_eq!(doc.char_at(Position::new(0, 13)), Some('f'));
        assert_eq!(doc.char_before(Position::new(0, 13)), Some(' '));
        assert_eq!(doc.char_before(Position::new(0, 0)), None);
    }

    #[test]
    fn test_carriage_returns_are_stripped() {
        let doc = SourceDocument::new("a.py", "call(a,\r\n     b)\n");
        assert_eq!(doc.line_text(0), "call(a,");
        assert_eq!(doc.line_text(1), "     b)");
        assert_eq!(doc.line_count(), 3);
    }

    #[test]
    fn test_chars_from_reports_line_breaks() {
        let doc = SourceDocument::new("a.py", "ab\ncd");
        let collected: String = doc.chars_from(Position::new(0, 1)).map(|(_, c)| c).collect();
        assert_eq!(collected, "b\ncd\n");
    }

    #[test]
    fn test_range_containment() {
        let outer = Range::new(Position::new(1, 4), Position::new(3, 0));
        let inner = Range::new(Position::new(1, 10), Position::new(1, 15));
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
    }
}
