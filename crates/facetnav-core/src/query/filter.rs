use crate::error::{NavError, Result};

use super::{Constraint, TextQuery, WHOLE_DOCUMENT};

/// Parses every filter entry and AND-s them together. Blank entries are skipped.
pub fn parse_filters<S: AsRef<str>>(filters: &[S]) -> Result<Constraint> {
    let mut parts = Vec::with_capacity(filters.len());
    for filter in filters {
        let filter = filter.as_ref();
        if filter.trim().is_empty() {
            continue;
        }
        parts.push(parse_filter(filter)?);
    }
    Ok(Constraint::all_of(parts))
}

/// Parses one structured filter expression.
///
/// ```text
/// expr    := and ("or" and)*
/// and     := unary ("and" unary)*
/// unary   := "not" "(" expr ")" | "(" expr ")" | contains | property ("=" | "!=") value
/// contains:= "contains" "(" (property | ".") "," text ")"
/// ```
pub fn parse_filter(text: &str) -> Result<Constraint> {
    let mut parser = FilterParser {
        source: text,
        bytes: text.as_bytes(),
        cursor: 0,
    };
    let expr = parser.expr()?;
    if parser.peek().is_some() {
        return Err(parser.error("trailing characters"));
    }
    Ok(expr)
}

struct FilterParser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    cursor: usize,
}

const fn is_property_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'-' | b':' | b'.' | b'@')
}

const fn is_value_char(byte: u8) -> bool {
    !byte.is_ascii_whitespace() && !matches!(byte, b'(' | b')' | b',' | b'=' | b'!' | b'\'' | b'"')
}

impl FilterParser<'_> {
    fn error(&self, message: &str) -> NavError {
        NavError::InvalidQuery(format!(
            "{message} at offset {} in filter `{}`",
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

    /// Consumes `keyword` when it appears as a whole word, case-insensitively.
    fn keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        let end = self.cursor + keyword.len();
        let Some(candidate) = self.source.get(self.cursor..end) else {
            return false;
        };
        if !candidate.eq_ignore_ascii_case(keyword) {
            return false;
        }
        if self.bytes.get(end).is_some_and(|byte| is_property_char(*byte)) {
            return false;
        }
        self.cursor = end;
        true
    }

    /// Like [`Self::keyword`], but only when an opening parenthesis follows.
    fn call(&mut self, name: &str) -> bool {
        let start = self.cursor;
        if self.keyword(name) && self.peek() == Some(b'(') {
            self.cursor += 1;
            return true;
        }
        self.cursor = start;
        false
    }

    fn expr(&mut self) -> Result<Constraint> {
        let mut parts = vec![self.conjunction()?];
        while self.keyword("or") {
            parts.push(self.conjunction()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Constraint::Or(parts)
        })
    }

    fn conjunction(&mut self) -> Result<Constraint> {
        let mut parts = vec![self.unary()?];
        while self.keyword("and") {
            parts.push(self.unary()?);
        }
        Ok(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Constraint::And(parts)
        })
    }

    fn unary(&mut self) -> Result<Constraint> {
        if self.call("not") {
            let inner = self.expr()?;
            self.expect(b')')?;
            return Ok(Constraint::Not(Box::new(inner)));
        }
        if self.call("contains") {
            return self.contains();
        }
        if self.peek() == Some(b'(') {
            self.cursor += 1;
            let inner = self.expr()?;
            self.expect(b')')?;
            return Ok(inner);
        }
        self.comparison()
    }

    fn contains(&mut self) -> Result<Constraint> {
        let property = self.property()?;
        self.expect(b',')?;
        let text = match self.peek() {
            Some(b'\'' | b'"') => self.quoted()?,
            Some(_) => self.raw_until_close(),
            None => return Err(self.error("unterminated contains")),
        };
        self.expect(b')')?;
        let query = TextQuery::parse(&text)?;
        Ok(Constraint::Contains {
            property: (property != WHOLE_DOCUMENT).then_some(property),
            query,
        })
    }

    fn comparison(&mut self) -> Result<Constraint> {
        let property = self.property()?;
        let negated = match self.peek() {
            Some(b'=') => {
                self.cursor += 1;
                false
            }
            Some(b'!') if self.bytes.get(self.cursor + 1) == Some(&b'=') => {
                self.cursor += 2;
                true
            }
            _ => return Err(self.error("expected `=` or `!=`")),
        };
        let value = self.value()?;
        Ok(if negated {
            Constraint::not_equals(property, value)
        } else {
            Constraint::equals(property, value)
        })
    }

    fn property(&mut self) -> Result<String> {
        match self.peek() {
            Some(byte) if is_property_char(byte) => {}
            _ => return Err(self.error("expected property name")),
        }
        let start = self.cursor;
        while self.cursor < self.bytes.len() && is_property_char(self.bytes[self.cursor]) {
            self.cursor += 1;
        }
        Ok(self.source[start..self.cursor].to_string())
    }

    fn value(&mut self) -> Result<String> {
        match self.peek() {
            Some(b'\'' | b'"') => self.quoted(),
            Some(byte) if is_value_char(byte) => {
                let start = self.cursor;
                while self.cursor < self.bytes.len() && is_value_char(self.bytes[self.cursor]) {
                    self.cursor += 1;
                }
                Ok(self.source[start..self.cursor].to_string())
            }
            _ => Err(self.error("expected value")),
        }
    }

    fn raw_until_close(&mut self) -> String {
        let start = self.cursor;
        while self.cursor < self.bytes.len() && self.bytes[self.cursor] != b')' {
            self.cursor += 1;
        }
        self.source[start..self.cursor].trim().to_string()
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
                out.push(escaped);
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
}
