//! Lenient object notation used by facet modifiers, range lists and free-text segments.
//!
//! Accepts JSON plus single-quoted strings, bare keys/words and trailing commas:
//! `{after:'year', hide:['color','brand'], limit:5}`.

use crate::error::{NavError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Notation {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Notation>),
    Object(Vec<(String, Notation)>),
}

impl Notation {
    pub(crate) fn as_text(&self) -> Option<String> {
        match self {
            Self::Str(value) => Some(value.clone()),
            Self::Int(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Bool(value) => Some(value.to_string()),
            Self::Null | Self::List(_) | Self::Object(_) => None,
        }
    }

    pub(crate) const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, reason = "range bounds are doubles")]
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Str(value) => value.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// A single string or a list of strings.
    pub(crate) fn as_text_list(&self) -> Option<Vec<String>> {
        match self {
            Self::List(items) => items.iter().map(Self::as_text).collect(),
            other => other.as_text().map(|value| vec![value]),
        }
    }
}

pub(crate) fn parse_notation(text: &str) -> Result<Notation> {
    let mut parser = NotationParser {
        source: text,
        bytes: text.as_bytes(),
        cursor: 0,
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.cursor != parser.bytes.len() {
        return Err(parser.error("trailing characters"));
    }
    Ok(value)
}

struct NotationParser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    cursor: usize,
}

const fn is_bare_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b':' | b'.' | b'+')
}

impl NotationParser<'_> {
    fn error(&self, message: &str) -> NavError {
        NavError::InvalidConfig(format!(
            "{message} at offset {} in `{}`",
            self.cursor, self.source
        ))
    }

    fn skip_whitespace(&mut self) {
        while self.cursor < self.bytes.len() && self.bytes[self.cursor].is_ascii_whitespace() {
            self.cursor += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes.get(self.cursor).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.cursor += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", byte as char)))
        }
    }

    fn value(&mut self) -> Result<Notation> {
        match self.peek() {
            Some(b'{') => self.object(),
            Some(b'[') => self.list(),
            Some(b'\'' | b'"') => self.quoted().map(Notation::Str),
            Some(byte) if is_bare_char(byte) => Ok(self.bare()),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn object(&mut self) -> Result<Notation> {
        self.expect(b'{')?;
        let mut entries = Vec::<(String, Notation)>::new();
        loop {
            match self.peek() {
                Some(b'}') => {
                    self.cursor += 1;
                    return Ok(Notation::Object(entries));
                }
                None => return Err(self.error("unterminated object")),
                _ => {}
            }
            let key = match self.peek() {
                Some(b'\'' | b'"') => self.quoted()?,
                Some(byte) if is_bare_char(byte) && byte != b':' => self.bare_key(),
                _ => return Err(self.error("expected key")),
            };
            if key.is_empty() {
                return Err(self.error("empty key"));
            }
            if entries.iter().any(|(existing, _)| existing == &key) {
                return Err(self.error(&format!("duplicate key `{key}`")));
            }
            self.expect(b':')?;
            let value = self.value()?;
            entries.push((key, value));
            match self.peek() {
                Some(b',') => self.cursor += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected `,` or `}`")),
            }
        }
    }

    fn list(&mut self) -> Result<Notation> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(b']') => {
                    self.cursor += 1;
                    return Ok(Notation::List(items));
                }
                None => return Err(self.error("unterminated list")),
                _ => {}
            }
            items.push(self.value()?);
            match self.peek() {
                Some(b',') => self.cursor += 1,
                Some(b']') => {}
                _ => return Err(self.error("expected `,` or `]`")),
            }
        }
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = self.bytes[self.cursor];
        self.cursor += 1;
        let mut out = String::new();
        let mut chars = self.source[self.cursor..].char_indices();
        while let Some((offset, ch)) = chars.next() {
            if ch == '\\' {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                out.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                continue;
            }
            if ch as u32 == u32::from(quote) {
                self.cursor += offset + 1;
                return Ok(out);
            }
            out.push(ch);
        }
        self.cursor = self.bytes.len();
        Err(self.error("unterminated string"))
    }

    fn bare_word(&mut self) -> String {
        let start = self.cursor;
        while self.cursor < self.bytes.len() && is_bare_char(self.bytes[self.cursor]) {
            self.cursor += 1;
        }
        self.source[start..self.cursor].to_string()
    }

    /// Bare key; stops at the `:` separating it from its value.
    fn bare_key(&mut self) -> String {
        let start = self.cursor;
        while self.cursor < self.bytes.len()
            && is_bare_char(self.bytes[self.cursor])
            && self.bytes[self.cursor] != b':'
        {
            self.cursor += 1;
        }
        self.source[start..self.cursor].to_string()
    }

    fn bare(&mut self) -> Notation {
        let word = self.bare_word();
        match word.as_str() {
            "null" => Notation::Null,
            "true" => Notation::Bool(true),
            "false" => Notation::Bool(false),
            _ => {
                if let Ok(value) = word.parse::<i64>() {
                    Notation::Int(value)
                } else if let Ok(value) = word.parse::<f64>()
                    && value.is_finite()
                {
                    Notation::Float(value)
                } else {
                    Notation::Str(word)
                }
            }
        }
    }
}
