//! Count/result oracle contract.
//!
//! The navigation engine never reads documents directly. It asks an [`IndexSnapshot`] for
//! counts, per-value counts and ordered results, always against one pinned generation.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::doc_path::DocPath;
use crate::error::{NavError, Result};
use crate::facet::SortOrder;
use crate::models::{DocumentRef, FacetValue, IndexGeneration};
use crate::query::Constraint;

mod memory;


pub use memory::{DocumentStore, MemorySnapshot, StoreWrite};

/// Union of content subtrees eligible for counting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NavigationScope {
    roots: Vec<DocPath>,
}

impl NavigationScope {
    pub fn new(roots: impl IntoIterator<Item = DocPath>) -> Result<Self> {
        let mut roots = roots.into_iter().collect::<Vec<_>>();
        roots.sort();
        roots.dedup();
        if roots.is_empty() {
            return Err(NavError::InvalidConfig(
                "navigation scope needs at least one docbase".to_string(),
            ));
        }
        Ok(Self { roots })
    }

    /// Parses comma-joined docbase paths.
    pub fn parse(raw: &str) -> Result<Self> {
        let roots = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(DocPath::parse)
            .collect::<Result<Vec<_>>>()?;
        Self::new(roots)
    }

    #[must_use]
    pub fn roots(&self) -> &[DocPath] {
        &self.roots
    }

    #[must_use]
    pub fn contains(&self, path: &DocPath) -> bool {
        self.roots.iter().any(|root| path.starts_with(root))
    }
}

impl Display for NavigationScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, root) in self.roots.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            write!(f, "{root}")?;
        }
        Ok(())
    }
}

impl FromStr for NavigationScope {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Per-value document counts of one property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueCounts {
    pub values: BTreeMap<FacetValue, u64>,
    /// Documents matching the query.
    pub total: u64,
    /// Matching documents without any usable value for the property.
    pub missing: u64,
}

/// One result ordering key. `name` and `path` address the document itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub property: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortKey {
    pub const NAME: &'static str = "name";
    pub const PATH: &'static str = "path";

    #[must_use]
    pub fn new(property: impl Into<String>, order: SortOrder) -> Self {
        Self {
            property: property.into(),
            order,
        }
    }
}

/// Pinned, immutable view of the index at one generation.
pub trait IndexSnapshot: Send + Sync {
    fn generation(&self) -> IndexGeneration;

    fn count(&self, scope: &NavigationScope, query: &Constraint) -> Result<u64>;

    fn value_counts(
        &self,
        scope: &NavigationScope,
        query: &Constraint,
        property: &str,
    ) -> Result<ValueCounts>;

    /// Matching documents ordered by `sort`, then by path.
    fn search(
        &self,
        scope: &NavigationScope,
        query: &Constraint,
        sort: &[SortKey],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DocumentRef>>;
}

/// Source of snapshots. Fails with [`NavError::Unavailable`] when the store cannot be read.
pub trait CountOracle: Send + Sync {
    fn snapshot(&self) -> Result<Arc<dyn IndexSnapshot>>;
}
