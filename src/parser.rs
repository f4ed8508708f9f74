// src/parser.rs

/// Character cursor shared by the expression tokenizer and the list parsers.
#[derive(Debug, Clone)]
pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    /// Consume the longest run of characters accepted by `pred`.
    pub fn take_while<F>(&mut self, pred: F) -> &'a str
    where
        F: Fn(char) -> bool,
    {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        &self.s[start..self.i]
    }

    /// Consume `lit` if the remaining input starts with it.
    pub fn eat(&mut self, lit: &str) -> bool {
        if self.peek_str(lit) {
            self.i += lit.len();
            true
        } else {
            false
        }
    }

    pub fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.i += c.len_utf8();
        Some(c)
    }

    pub fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    pub fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    pub fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }

    pub fn position(&self) -> usize {
        self.i
    }

    pub fn slice_from(&self, start: usize) -> &'a str {
        &self.s[start..self.i]
    }

    pub fn skip_ws(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
    }
}

/// Split a newline and/or comma separated configuration value into trimmed,
/// non-empty entries.
pub fn split_entries(raw: &str) -> Vec<&str> {
    raw.split(|c: char| c == '\n' || c == '\r' || c == ',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Split a newline separated list, keeping empty lines (trimmed).
pub fn split_lines(raw: &str) -> Vec<&str> {
    raw.split('\n').map(str::trim).collect()
}
