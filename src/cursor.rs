use crate::token::SourcePosition;

/// Returned by [`Cursor::current`] and [`Cursor::peek`] past the end of the
/// input.
pub const SENTINEL: char = '\0';

/// A character cursor over the source text, tracking line and column.
pub struct Cursor {
    chars: Vec<char>,
    index: usize,
    offset: usize,
    position: SourcePosition,
}

impl Cursor {
    pub fn new(src: &str) -> Cursor {
        Cursor {
            chars: src.chars().collect(),
            index: 0,
            offset: 0,
            position: SourcePosition::START,
        }
    }

    /// Returns the character under the cursor, or [`SENTINEL`] at the end.
    pub fn current(&self) -> char {
        self.peek(0)
    }

    /// Looks `n` characters ahead without consuming anything.
    pub fn peek(&self, n: usize) -> char {
        self.chars.get(self.index + n).copied().unwrap_or(SENTINEL)
    }

    /// Returns the current character and moves past it.
    ///
    /// Advancing at the end is a no-op that keeps returning the sentinel.
    pub fn advance(&mut self) -> char {
        let c = self.current();
        if self.is_at_end() {
            return c;
        }
        self.index += 1;
        self.offset += c.len_utf8();
        if c == '\n' {
            self.position.line += 1;
            self.position.column = 1;
        } else {
            self.position.column += 1;
        }
        c
    }

    /// Advances if the current character is `expected`.
    pub fn eat(&mut self, expected: char) -> bool {
        if self.current() == expected && !self.is_at_end() {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.current() == SENTINEL
    }

    pub fn position(&self) -> SourcePosition {
        self.position
    }

    /// Byte offset of the current character.
    pub fn offset(&self) -> usize {
        self.offset
    }
}
