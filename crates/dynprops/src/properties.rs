//! Line-oriented `key=value` properties parser.
//!
//! Implements the classic properties syntax:
//!
//! - `#` and `!` start a comment line; blank lines are skipped
//! - keys end at the first unescaped `=`, `:` or whitespace
//! - a line ending in an odd number of backslashes continues on the next
//!   line, whose leading whitespace is dropped
//! - escapes `\t`, `\n`, `\r`, `\f` and `\uXXXX`; any other escaped
//!   character stands for itself
//!
//! ```rust,ignore
//! let map = dynprops::properties::parse("name = Alice\nage: 30\n")?;
//! assert_eq!(map["name"], "Alice");
//! ```

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Flat string-keyed mapping produced by [`parse`].
pub type PropertyMap = HashMap<String, String>;

/// Parse properties content into a flat map.
///
/// Later duplicates of a key replace earlier ones.
///
/// # Errors
///
/// Returns [`Error::PropertiesSyntax`] for a malformed `\uXXXX` escape.
pub fn parse(content: &str) -> Result<PropertyMap> {
    let mut map = PropertyMap::new();

    for logical in LogicalLines::new(content) {
        let (raw_key, raw_value) = split_key_value(&logical.text);
        let key = unescape(raw_key, logical.line)?;
        let value = unescape(raw_value, logical.line)?;
        map.insert(key, value);
    }

    Ok(map)
}

/// A key/value line after continuations have been joined.
struct LogicalLine {
    /// 1-based number of the first natural line.
    line: usize,
    text: String,
}

struct LogicalLines<'a> {
    natural: std::iter::Peekable<std::iter::Enumerate<NaturalLines<'a>>>,
}

impl<'a> LogicalLines<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            natural: NaturalLines { rest: content }.enumerate().peekable(),
        }
    }
}

impl Iterator for LogicalLines<'_> {
    type Item = LogicalLine;

    fn next(&mut self) -> Option<LogicalLine> {
        loop {
            let (index, line) = self.natural.next()?;
            let trimmed = line.trim_start_matches(is_blank);

            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }

            let mut text = String::new();
            let mut current = trimmed;

            loop {
                if ends_with_continuation(current) {
                    text.push_str(&current[..current.len() - 1]);
                    match self.natural.next() {
                        Some((_, next)) => current = next.trim_start_matches(is_blank),
                        None => break,
                    }
                } else {
                    text.push_str(current);
                    break;
                }
            }

            return Some(LogicalLine {
                line: index + 1,
                text,
            });
        }
    }
}

/// Splits on `\n`, `\r\n` and lone `\r`.
struct NaturalLines<'a> {
    rest: &'a str,
}

impl<'a> Iterator for NaturalLines<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.rest.is_empty() {
            return None;
        }

        match self.rest.find(['\n', '\r']) {
            Some(pos) => {
                let line = &self.rest[..pos];
                let skip = if self.rest[pos..].starts_with("\r\n") { 2 } else { 1 };
                self.rest = &self.rest[pos + skip..];
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

const fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{000C}')
}

fn ends_with_continuation(line: &str) -> bool {
    let slashes = line.bytes().rev().take_while(|b| *b == b'\\').count();
    slashes % 2 == 1
}

/// Split a logical line into its still-escaped key and value.
fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    let mut has_separator = false;

    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '=' | ':' => {
                key_end = i;
                has_separator = true;
                break;
            }
            c if is_blank(c) => {
                key_end = i;
                break;
            }
            _ => {}
        }
    }

    if key_end == line.len() {
        return (line, "");
    }

    let key = &line[..key_end];
    let mut rest = line[key_end + 1..].trim_start_matches(is_blank);

    if !has_separator && let Some(stripped) = rest.strip_prefix(['=', ':']) {
        rest = stripped.trim_start_matches(is_blank);
    }

    (key, rest)
}

fn unescape(raw: &str, line: usize) -> Result<String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                let code = (digits.len() == 4)
                    .then(|| u32::from_str_radix(&digits, 16).ok())
                    .flatten()
                    .ok_or_else(|| Error::PropertiesSyntax {
                        line,
                        message: format!("malformed \\uxxxx encoding: \\u{digits}"),
                    })?;
                // Lone surrogate halves cannot be represented in a Rust string
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    Ok(out)
}
