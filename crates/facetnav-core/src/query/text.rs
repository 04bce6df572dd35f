use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Parsed free-text query: every clause must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuery {
    clauses: Vec<TextClause>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextClause {
    /// At least one term must match.
    AnyOf(Vec<TextTerm>),
    /// The term must not match.
    Exclude(TextTerm),
}

/// Token sequence matched as a phrase; `prefix` lets the last token match a word prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTerm {
    pub tokens: Vec<String>,
    pub prefix: bool,
}

impl TextQuery {
    /// Parses the free-text sub-language.
    ///
    /// Terms are AND-ed, `OR` joins neighbours, `"..."` is a phrase, a leading `-` negates
    /// and a trailing `*` matches word prefixes. Leading wildcards are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut clauses = Vec::new();
        let mut pending_or = false;
        for token in split_terms(raw)? {
            if token.text == "OR" && !token.quoted {
                if clauses.is_empty() || pending_or {
                    return Err(NavError::InvalidQuery(format!("dangling OR in `{raw}`")));
                }
                pending_or = true;
                continue;
            }

            let (negated, body) = match token.text.strip_prefix('-') {
                Some(rest) if !token.quoted && !rest.is_empty() => (true, rest.to_string()),
                _ => (false, token.text.clone()),
            };
            let Some(term) = parse_term(&body, token.quoted, raw)? else {
                continue;
            };

            if negated {
                if pending_or {
                    return Err(NavError::InvalidQuery(format!(
                        "negated term cannot be OR-ed in `{raw}`"
                    )));
                }
                clauses.push(TextClause::Exclude(term));
                continue;
            }
            if pending_or && let Some(TextClause::AnyOf(terms)) = clauses.last_mut() {
                terms.push(term);
                pending_or = false;
                continue;
            }
            if pending_or {
                return Err(NavError::InvalidQuery(format!(
                    "negated term cannot be OR-ed in `{raw}`"
                )));
            }
            clauses.push(TextClause::AnyOf(vec![term]));
        }
        if pending_or {
            return Err(NavError::InvalidQuery(format!("dangling OR in `{raw}`")));
        }
        Ok(Self { clauses })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    #[must_use]
    pub fn clauses(&self) -> &[TextClause] {
        &self.clauses
    }

    /// Matches against the words of `texts`, case-insensitively.
    #[must_use]
    pub fn matches<S: AsRef<str>>(&self, texts: &[S]) -> bool {
        let words = texts
            .iter()
            .map(|text| tokenize(text.as_ref()))
            .collect::<Vec<_>>();
        self.clauses.iter().all(|clause| match clause {
            TextClause::AnyOf(terms) => terms.iter().any(|term| term.matches_any(&words)),
            TextClause::Exclude(term) => !term.matches_any(&words),
        })
    }
}

impl TextTerm {
    fn matches_any(&self, texts: &[Vec<String>]) -> bool {
        texts.iter().any(|words| self.matches_words(words))
    }

    fn matches_words(&self, words: &[String]) -> bool {
        let width = self.tokens.len();
        if width == 0 || words.len() < width {
            return false;
        }
        words.windows(width).any(|window| {
            window.iter().zip(&self.tokens).enumerate().all(|(index, (word, token))| {
                if self.prefix && index + 1 == width {
                    word.starts_with(token.as_str())
                } else {
                    word == token
                }
            })
        })
    }
}

impl Display for TextQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, clause) in self.clauses.iter().enumerate() {
            if index > 0 {
                f.write_str(" ")?;
            }
            match clause {
                TextClause::AnyOf(terms) => {
                    for (position, term) in terms.iter().enumerate() {
                        if position > 0 {
                            f.write_str(" OR ")?;
                        }
                        write!(f, "{term}")?;
                    }
                }
                TextClause::Exclude(term) => write!(f, "-{term}")?,
            }
        }
        Ok(())
    }
}

impl Display for TextTerm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.tokens.len() == 1 {
            f.write_str(&self.tokens[0])?;
        } else {
            write!(f, "\"{}\"", self.tokens.join(" "))?;
        }
        if self.prefix {
            f.write_str("*")?;
        }
        Ok(())
    }
}

/// Lowercased alphanumeric words of `text`.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

struct RawTerm {
    text: String,
    quoted: bool,
}

fn split_terms(raw: &str) -> Result<Vec<RawTerm>> {
    let mut out = Vec::new();
    let mut chars = raw.chars().peekable();
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        if ch == '"' {
            chars.next();
            let mut phrase = String::new();
            let mut closed = false;
            for next in chars.by_ref() {
                if next == '"' {
                    closed = true;
                    break;
                }
                phrase.push(next);
            }
            if !closed {
                return Err(NavError::InvalidQuery(format!(
                    "unterminated phrase in `{raw}`"
                )));
            }
            let mut text = phrase;
            if chars.peek() == Some(&'*') {
                chars.next();
                text.push('*');
            }
            out.push(RawTerm { text, quoted: true });
            continue;
        }
        let mut word = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_whitespace() {
                break;
            }
            word.push(next);
            chars.next();
        }
        out.push(RawTerm {
            text: word,
            quoted: false,
        });
    }
    Ok(out)
}

fn parse_term(body: &str, quoted: bool, raw: &str) -> Result<Option<TextTerm>> {
    if body.starts_with('*') || body.starts_with('?') {
        return Err(NavError::InvalidQuery(format!(
            "leading wildcard is not supported: `{raw}`"
        )));
    }
    let (body, prefix) = match body.strip_suffix('*') {
        Some(stem) => (stem, true),
        None => (body, false),
    };
    if body.contains('*') || (!quoted && body.contains('?')) {
        return Err(NavError::InvalidQuery(format!(
            "wildcards are only supported at the end of a term: `{raw}`"
        )));
    }
    let tokens = tokenize(body);
    if tokens.is_empty() {
        return Ok(None);
    }
    Ok(Some(TextTerm { tokens, prefix }))
}
