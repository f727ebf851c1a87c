use std::borrow::Cow;

use serde::Serialize;

/// Encoding that was actually used to read an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    Utf8,
    /// ISO-8859-1: every byte maps to the code point of the same value
    Latin1,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
        }
    }
}

/// Decode as UTF-8, falling back to Latin-1 when the bytes are not valid UTF-8.
///
/// Valid UTF-8 input is borrowed, not copied.
pub fn decode(raw: &[u8]) -> (Cow<'_, str>, TextEncoding) {
    match std::str::from_utf8(raw) {
        Ok(text) => (Cow::Borrowed(text), TextEncoding::Utf8),
        Err(_) => (
            Cow::Owned(raw.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Latin1,
        ),
    }
}

/// Characters that end a line: `\n`, `\r` (with `\r\n` as one boundary),
/// vertical tab, form feed, the file/group/record separators, NEL and the
/// Unicode line and paragraph separators.
fn is_line_boundary(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Iterator over the lines of a decoded input. See [`split_lines`].
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        match self.rest.char_indices().find(|&(_, c)| is_line_boundary(c)) {
            Some((idx, c)) => {
                let line = &self.rest[..idx];
                let mut end = idx + c.len_utf8();
                if c == '\r' && self.rest[end..].starts_with('\n') {
                    end += 1;
                }
                self.rest = &self.rest[end..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = "";
                Some(line)
            }
        }
    }
}

/// Split on every line boundary, not only `\n`.
///
/// A final terminator does not produce a trailing empty line.
pub fn split_lines(text: &str) -> Lines<'_> {
    Lines { rest: text }
}
