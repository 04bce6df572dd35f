use std::fmt::{Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::facet::notation::{Notation, parse_notation};
use crate::models::RESULTSET;
use crate::query::{Constraint, TextQuery, parse_filter};

/// One `(facet node name, value or bucket)` pair of a [`ConstraintPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Selection {
    pub facet: String,
    pub value: String,
}

/// Facet selections accumulated while descending the tree.
///
/// Appending builds a new path; existing paths are never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConstraintPath {
    selections: Arc<[Selection]>,
}

impl ConstraintPath {
    #[must_use]
    pub fn new(selections: impl IntoIterator<Item = Selection>) -> Self {
        Self {
            selections: selections.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn append(&self, facet: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.selections.to_vec();
        next.push(Selection {
            facet: facet.into(),
            value: value.into(),
        });
        Self {
            selections: next.into(),
        }
    }

    /// `self` followed by `tail`.
    #[must_use]
    pub fn concat(&self, tail: &Self) -> Self {
        if tail.is_empty() {
            return self.clone();
        }
        if self.is_empty() {
            return tail.clone();
        }
        Self::new(self.selections.iter().chain(tail.selections.iter()).cloned())
    }

    #[must_use]
    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.selections.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    #[must_use]
    pub fn contains_facet(&self, facet: &str) -> bool {
        self.selections
            .iter()
            .any(|selection| selection.facet == facet)
    }

    #[must_use]
    pub fn last(&self) -> Option<&Selection> {
        self.selections.last()
    }
}

impl Display for ConstraintPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for selection in self.selections.iter() {
            write!(f, "/{:?}={:?}", selection.facet, selection.value)?;
        }
        Ok(())
    }
}

/// `[{...}]` free-text override carried by a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FreeTextSegment {
    pub text: Option<String>,
    pub filter: Option<String>,
    /// Set when the segment could not be read; the position then degrades to empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FreeTextSegment {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            filter: None,
            error: None,
        }
    }

    fn malformed(raw: &str) -> Self {
        Self {
            text: Some(raw.to_string()),
            filter: None,
            error: Some(format!("malformed free-text segment `{raw}`")),
        }
    }

    /// Parses the inside of `[{...}]`.
    ///
    /// `text:'..', filter:'..'` is read with the node-name modifier notation; anything else is
    /// raw free text.
    #[must_use]
    pub fn parse(inner: &str) -> Self {
        let structured = parse_notation(&format!("{{{inner}}}")).ok().and_then(|notation| {
            let Notation::Object(entries) = notation else {
                return None;
            };
            let mut segment = Self {
                text: None,
                filter: None,
                error: None,
            };
            for (key, value) in entries {
                match key.as_str() {
                    "text" => segment.text = Some(value.as_text()?),
                    "filter" => segment.filter = Some(value.as_text()?),
                    _ => return None,
                }
            }
            Some(segment)
        });
        structured.unwrap_or_else(|| Self::text(inner.trim()))
    }

    /// Constraint AND-ed into every oracle call at and below the segment.
    pub fn to_constraint(&self) -> Result<Constraint> {
        if let Some(error) = &self.error {
            return Err(NavError::InvalidQuery(error.clone()));
        }
        let mut parts = Vec::with_capacity(2);
        if let Some(text) = self.text.as_deref() {
            let query = TextQuery::parse(text)?;
            if !query.is_empty() {
                parts.push(Constraint::free_text(query));
            }
        }
        if let Some(filter) = self.filter.as_deref()
            && !filter.trim().is_empty()
        {
            parts.push(parse_filter(filter)?);
        }
        Ok(Constraint::all_of(parts))
    }
}

impl Display for FreeTextSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.error.is_some() {
            return f.write_str(self.text.as_deref().unwrap_or_default());
        }
        match (&self.text, &self.filter) {
            (Some(text), None) => write!(f, "[{{{text}}}]"),
            (text, filter) => write!(
                f,
                "[{{text:{:?}, filter:{:?}}}]",
                text.as_deref().unwrap_or_default(),
                filter.as_deref().unwrap_or_default()
            ),
        }
    }
}

/// One step of a traversal request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    /// Facet name or facet value, depending on the position.
    Name(String),
    Resultset,
    FreeText(FreeTextSegment),
}

impl Display for PathSegment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name(name) => f.write_str(&encode_segment(name)),
            Self::Resultset => f.write_str(RESULTSET),
            Self::FreeText(segment) => write!(f, "{segment}"),
        }
    }
}

/// Path spelling of a facet or value name.
///
/// `%`, `/`, `[` and `]` are percent-encoded, as are leading and trailing blanks. A name that
/// is literally `resultset` becomes `%72esultset` so it cannot be mistaken for the result
/// branch.
#[must_use]
pub fn encode_segment(name: &str) -> String {
    if name == RESULTSET {
        return "%72esultset".to_string();
    }
    let first = name.len() - name.trim_start().len();
    let last = name.trim_end().len();
    let mut out = String::with_capacity(name.len());
    for (index, ch) in name.char_indices() {
        match ch {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            '[' => out.push_str("%5B"),
            ']' => out.push_str("%5D"),
            ch if ch.is_whitespace() && (index < first || index >= last) => {
                let mut buf = [0u8; 4];
                for byte in ch.encode_utf8(&mut buf).bytes() {
                    out.push_str(&format!("%{byte:02X}"));
                }
            }
            ch => out.push(ch),
        }
    }
    out
}

/// Reverses [`encode_segment`]. A `%` not followed by two hex digits is kept as is.
fn decode_segment(part: &str, raw: &str) -> Result<String> {
    let bytes = part.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        let escaped = (bytes[index] == b'%')
            .then(|| bytes.get(index + 1..index + 3))
            .flatten()
            .and_then(|hex| std::str::from_utf8(hex).ok())
            .and_then(|hex| u8::from_str_radix(hex, 16).ok());
        match escaped {
            Some(byte) => {
                out.push(byte);
                index += 3;
            }
            None => {
                out.push(bytes[index]);
                index += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| {
        NavError::InvalidPath(format!("segment `{part}` of `{raw}` is not valid UTF-8"))
    })
}

/// Facet or value segment. Only the bare word `resultset` selects the result branch.
fn name_segment(part: &str, raw: &str) -> Result<PathSegment> {
    if part == RESULTSET {
        return Ok(PathSegment::Resultset);
    }
    Ok(PathSegment::Name(decode_segment(part, raw)?))
}

/// Splits a path string such as `brand/peugeot[{red}]/resultset` into segments.
///
/// `/` inside `[{...}]` does not separate segments. Name segments are percent-decoded, see
/// [`encode_segment`]. A `[{` segment that is not closed by `}]` is kept as a free-text
/// segment that degrades the position it applies to.
pub fn parse_path(raw: &str) -> Result<Vec<PathSegment>> {
    let mut segments = Vec::new();
    for part in split_outside_brackets(raw)? {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.find("[{") {
            Some(0) => segments.push(PathSegment::FreeText(free_text(part))),
            Some(index) => {
                segments.push(name_segment(part[..index].trim(), raw)?);
                segments.push(PathSegment::FreeText(free_text(&part[index..])));
            }
            None if part.contains('[') || part.contains(']') => {
                return Err(NavError::InvalidPath(format!(
                    "stray bracket in segment `{part}` of `{raw}`"
                )));
            }
            None => segments.push(name_segment(part, raw)?),
        }
    }
    Ok(segments)
}

fn free_text(part: &str) -> FreeTextSegment {
    let Some(inner) = part
        .strip_prefix("[{")
        .and_then(|rest| rest.strip_suffix("}]"))
    else {
        return FreeTextSegment::malformed(part);
    };
    FreeTextSegment::parse(inner)
}

/// An unclosed `[` runs to the end of `raw`.
fn split_outside_brackets(raw: &str) -> Result<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (index, ch) in raw.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    NavError::InvalidPath(format!("unbalanced `]` in `{raw}`"))
                })?;
            }
            '/' if depth == 0 => {
                parts.push(&raw[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    Ok(parts)
}
