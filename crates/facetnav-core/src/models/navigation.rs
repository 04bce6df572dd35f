use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use super::DocumentRef;

/// Name of the terminal branch listing matching documents.
pub const RESULTSET: &str = "resultset";

/// Committed snapshot identifier of the backing store. Advances on every commit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct IndexGeneration(pub u64);

impl IndexGeneration {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for IndexGeneration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Kind of a stored navigation definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefinitionKind {
    Navigation,
    Mirror,
}

impl DefinitionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Mirror => "mirror",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "navigation" => Some(Self::Navigation),
            "mirror" => Some(Self::Mirror),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Navigation root, no constraints accumulated.
    Root,
    /// One facet branch; children are its values or buckets.
    Facet,
    /// A selected facet value; children are the remaining facets and `resultset`.
    FacetValue,
    /// Count-only node reached by re-selecting an already constrained facet.
    Leaf,
    Resultset,
}

/// One listed branch. `segment` is the path text that selects it, which differs from `name`
/// when the name holds `/`, brackets, `%` or the word `resultset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualChild {
    pub name: String,
    pub segment: String,
    pub count: u64,
}

impl VirtualChild {
    /// Facet or value branch.
    #[must_use]
    pub fn branch(name: impl Into<String>, count: u64) -> Self {
        let name = name.into();
        Self {
            segment: crate::navigation::encode_segment(&name),
            name,
            count,
        }
    }

    #[must_use]
    pub fn resultset(count: u64) -> Self {
        Self {
            name: RESULTSET.to_string(),
            segment: RESULTSET.to_string(),
            count,
        }
    }

    #[must_use]
    pub fn is_resultset(&self) -> bool {
        self.segment == RESULTSET
    }
}

/// Node of the virtual navigation tree, materialized per traversal and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualNode {
    pub name: String,
    pub kind: NodeKind,
    pub count: u64,
    pub children: Vec<VirtualChild>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub result_documents: Vec<DocumentRef>,
    pub generation: IndexGeneration,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

impl VirtualNode {
    #[must_use]
    pub fn child_names(&self) -> Vec<&str> {
        self.children
            .iter()
            .map(|child| child.name.as_str())
            .collect()
    }

    /// Child called `name`; `resultset` names the result branch, not a value spelled that way.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&VirtualChild> {
        let wants_resultset = name == RESULTSET;
        self.children
            .iter()
            .find(|child| child.name == name && child.is_resultset() == wants_resultset)
    }

    /// Child selected by the path segment `segment`.
    #[must_use]
    pub fn child_by_segment(&self, segment: &str) -> Option<&VirtualChild> {
        self.children.iter().find(|child| child.segment == segment)
    }

    #[must_use]
    pub fn child_count(&self, name: &str) -> Option<u64> {
        self.child(name).map(|child| child.count)
    }

    #[must_use]
    pub fn has_nodes(&self) -> bool {
        !self.children.is_empty()
    }

    /// Sum of the value-branch counts, excluding `resultset`.
    #[must_use]
    pub fn value_count_sum(&self) -> u64 {
        self.children
            .iter()
            .filter(|child| !child.is_resultset())
            .map(|child| child.count)
            .sum()
    }
}
