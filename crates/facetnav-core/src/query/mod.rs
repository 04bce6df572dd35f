//! Constraint algebra shared by facet selections, structured filters and free text.
//!
//! Every navigation position is turned into one [`Constraint`] before it reaches the
//! count oracle. The canonical [`Display`] form doubles as cache-key material.

use std::fmt::{Display, Formatter};

use chrono::FixedOffset;

use crate::bucket::{ResolvedRange, date_part};
use crate::facet::DatePart;
use crate::models::{Document, FacetValue};

mod filter;
mod text;

#[cfg(test)]
mod tests;

pub use filter::{parse_filter, parse_filters};
pub use text::{TextClause, TextQuery, TextTerm, tokenize};

/// Pseudo-property addressing every text of a document in `contains(., ...)`.
pub const WHOLE_DOCUMENT: &str = ".";

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Matches everything.
    All,
    /// Matches nothing; used for selections that name no value.
    Nothing,
    /// Some value of `property` displays as `value`.
    Equals { property: String, value: String },
    Not(Box<Constraint>),
    /// `property` of `None` searches the whole document.
    Contains {
        property: Option<String>,
        query: TextQuery,
    },
    DatePart {
        property: String,
        part: DatePart,
        value: i64,
        offset: FixedOffset,
    },
    Range {
        property: String,
        range: ResolvedRange,
    },
    And(Vec<Constraint>),
    Or(Vec<Constraint>),
}

impl Constraint {
    #[must_use]
    pub fn equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equals {
            property: property.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn not_equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Not(Box::new(Self::equals(property, value)))
    }

    #[must_use]
    pub fn free_text(query: TextQuery) -> Self {
        Self::Contains {
            property: None,
            query,
        }
    }

    /// Conjunction that drops `All` members and collapses trivial cases.
    #[must_use]
    pub fn all_of(parts: impl IntoIterator<Item = Self>) -> Self {
        let mut flat = Vec::new();
        for part in parts {
            match part {
                Self::All => {}
                Self::And(inner) => match Self::all_of(inner) {
                    Self::All => {}
                    Self::Nothing => return Self::Nothing,
                    Self::And(nested) => flat.extend(nested),
                    other => flat.push(other),
                },
                Self::Nothing => return Self::Nothing,
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Self::All,
            1 => flat.pop().unwrap_or(Self::All),
            _ => Self::And(flat),
        }
    }

    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::all_of([self, other])
    }

    #[must_use]
    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Self::All => true,
            Self::Nothing => false,
            Self::Equals { property, value } => document
                .facet_values(property)
                .iter()
                .any(|candidate| candidate.display() == *value),
            Self::Not(inner) => !inner.matches(document),
            Self::Contains { property, query } => {
                let texts = match property.as_deref() {
                    None | Some(WHOLE_DOCUMENT) => document_texts(document),
                    Some(property) => document
                        .facet_values(property)
                        .iter()
                        .map(FacetValue::display)
                        .collect(),
                };
                query.matches(&texts)
            }
            Self::DatePart {
                property,
                part,
                value,
                offset,
            } => document
                .facet_values(property)
                .iter()
                .any(|candidate| date_part(candidate, *part, *offset) == Some(*value)),
            Self::Range { property, range } => document
                .facet_values(property)
                .iter()
                .any(|candidate| range.contains(candidate)),
            Self::And(parts) => parts.iter().all(|part| part.matches(document)),
            Self::Or(parts) => parts.iter().any(|part| part.matches(document)),
        }
    }
}

/// Name plus every string property value of the document.
fn document_texts(document: &Document) -> Vec<String> {
    let mut texts = vec![document.name().to_string()];
    for value in document.properties.values() {
        texts.extend(value.text_values());
    }
    texts
}

impl Display for Constraint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Nothing => f.write_str("!"),
            Self::Equals { property, value } => write!(f, "{property}={value:?}"),
            Self::Not(inner) => write!(f, "not({inner})"),
            Self::Contains { property, query } => write!(
                f,
                "contains({},{:?})",
                property.as_deref().unwrap_or(WHOLE_DOCUMENT),
                query.to_string()
            ),
            Self::DatePart {
                property,
                part,
                value,
                offset,
            } => write!(f, "{property}${}={value}@{offset}", part.as_str()),
            Self::Range { property, range } => write!(f, "{property}~{range:?}"),
            Self::And(parts) => write_list(f, "and", parts),
            Self::Or(parts) => write_list(f, "or", parts),
        }
    }
}

fn write_list(f: &mut Formatter<'_>, op: &str, parts: &[Constraint]) -> std::fmt::Result {
    write!(f, "{op}(")?;
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            f.write_str(",")?;
        }
        write!(f, "{part}")?;
    }
    f.write_str(")")
}
