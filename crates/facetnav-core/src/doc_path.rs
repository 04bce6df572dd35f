use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

/// Absolute, normalized path of a node in the content hierarchy (`/content/documents/cars`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    #[must_use]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if !trimmed.starts_with('/') {
            return Err(NavError::InvalidPath(value.to_string()));
        }
        Ok(Self {
            segments: normalize_segments(trimmed)?,
        })
    }

    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn join(&self, child: &str) -> Result<Self> {
        let child_segments = normalize_segments(child)?;
        let mut segments = self.segments.clone();
        segments.extend(child_segments);
        Ok(Self { segments })
    }

    pub fn child(&self, child: impl Into<String>) -> Result<Self> {
        self.join(&child.into())
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Segment-wise ancestry check; a path is within its own subtree.
    #[must_use]
    pub fn starts_with(&self, other: &Self) -> bool {
        self.segments.len() >= other.segments.len()
            && self
                .segments
                .iter()
                .zip(other.segments.iter())
                .all(|(a, b)| a == b)
    }

    #[must_use]
    pub fn to_string_path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

impl Display for DocPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_string_path())
    }
}

impl FromStr for DocPath {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocPath {
    type Error = NavError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(value: DocPath) -> Self {
        value.to_string_path()
    }
}

fn normalize_segments(raw_path: &str) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for segment in raw_path.split('/') {
        let segment = segment.trim();
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(NavError::InvalidPath(format!(
                "path traversal is not allowed: {raw_path}"
            )));
        }
        if segment.contains('\\') || segment.contains(',') {
            return Err(NavError::InvalidPath(raw_path.to_string()));
        }
        out.push(segment.to_string());
    }
    Ok(out)
}
