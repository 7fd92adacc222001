//! Source locations
//!
//! Converts byte offsets into the char offset / line / column triple reported
//! in problems.

/// A location inside checked source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Char offset from the start of the text
    pub position: usize,
    /// 1-based line
    pub line: usize,
    /// 1-based column, counted in chars
    pub column: usize,
}

/// Locate a byte offset inside `text` by scanning newlines up to it.
///
/// Offsets past the end (or inside a multi-byte char) are clamped to the
/// nearest following char boundary.
pub fn locate(text: &str, byte_offset: usize) -> Location {
    Locator::new(text).locate(byte_offset)
}

/// Incremental [`locate`] for offsets visited in increasing order
#[derive(Debug, Clone)]
pub struct Locator<'a> {
    text: &'a str,
    byte: usize,
    loc: Location,
}

impl<'a> Locator<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            byte: 0,
            loc: Location { position: 0, line: 1, column: 1 },
        }
    }

    pub fn locate(&mut self, byte_offset: usize) -> Location {
        if byte_offset < self.byte {
            *self = Self::new(self.text);
        }
        let text = self.text;
        for ch in text[self.byte..].chars() {
            if self.byte >= byte_offset {
                break;
            }
            self.byte += ch.len_utf8();
            self.loc.position += 1;
            if ch == '\n' {
                self.loc.line += 1;
                self.loc.column = 1;
            } else {
                self.loc.column += 1;
            }
        }
        self.loc
    }
}
