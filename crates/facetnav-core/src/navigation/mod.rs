//! Virtual navigation tree.
//!
//! A [`FacetNavigation`] is the parsed, immutable form of one navigation definition. The
//! tree itself is never stored: [`builder`] materializes the node at a requested path from
//! oracle answers each time it is asked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::facet::{self, FacetSpec, SortOrder};
use crate::oracle::{NavigationScope, SortKey};
use crate::query::{Constraint, parse_filters};

pub(crate) mod builder;
mod mirror;
mod path;

#[cfg(test)]
mod tests;

pub use builder::ResolveOptions;
pub use mirror::{MirrorDefinition, MirrorLayer, NavigationRoot};
pub use path::{ConstraintPath, FreeTextSegment, PathSegment, Selection, encode_segment, parse_path};

/// Declarative navigation definition as stored and imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetNavigationDefinition {
    pub name: String,
    /// Content roots; several roots form a union scope.
    pub docbases: Vec<String>,
    pub facets: Vec<String>,
    #[serde(default)]
    pub facet_node_names: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
    /// Resultset ordering properties.
    #[serde(default)]
    pub sort_by: Vec<String>,
    #[serde(default)]
    pub sort_order: Vec<String>,
    /// Resultset size.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl FacetNavigationDefinition {
    #[must_use]
    pub fn new(name: impl Into<String>, docbase: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            docbases: vec![docbase.into()],
            facets: Vec::new(),
            facet_node_names: Vec::new(),
            filters: Vec::new(),
            sort_by: Vec::new(),
            sort_order: Vec::new(),
            limit: None,
        }
    }

    #[must_use]
    pub fn facet(mut self, definition: impl Into<String>, node_name: impl Into<String>) -> Self {
        self.facets.push(definition.into());
        self.facet_node_names.push(node_name.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }
}

/// Parsed navigation; shared read-only between sessions.
#[derive(Debug, Clone)]
pub struct FacetNavigation {
    name: String,
    scope: NavigationScope,
    facets: Vec<FacetSpec>,
    filter: Constraint,
    result_sort: Vec<SortKey>,
    result_limit: Option<usize>,
    fingerprint: String,
    definition: FacetNavigationDefinition,
}

impl FacetNavigation {
    /// Parses and validates a definition. Every failure is a configuration error.
    pub fn from_definition(definition: FacetNavigationDefinition) -> Result<Self> {
        let name = definition.name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(NavError::InvalidConfig(format!(
                "invalid navigation name: `{}`",
                definition.name
            )));
        }
        let scope = NavigationScope::parse(&definition.docbases.join(",")).map_err(|err| {
            NavError::InvalidConfig(format!("navigation `{name}` docbases: {err}"))
        })?;
        let facets = facet::parse(&definition.facets, &definition.facet_node_names)?;
        let filter = parse_filters(&definition.filters)
            .map_err(|err| NavError::InvalidConfig(format!("navigation `{name}` filter: {err}")))?;
        let result_sort = result_sort(&definition)?;
        let fingerprint = blake3::hash(serde_json::to_string(&definition)?.as_bytes())
            .to_hex()
            .to_string();

        Ok(Self {
            name: name.to_string(),
            scope,
            facets,
            filter,
            result_sort,
            result_limit: definition.limit,
            fingerprint,
            definition,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn scope(&self) -> &NavigationScope {
        &self.scope
    }

    #[must_use]
    pub fn facets(&self) -> &[FacetSpec] {
        &self.facets
    }

    #[must_use]
    pub fn facet(&self, node_name: &str) -> Option<&FacetSpec> {
        self.facets.iter().find(|spec| spec.node_name == node_name)
    }

    #[must_use]
    pub fn filter(&self) -> &Constraint {
        &self.filter
    }

    #[must_use]
    pub fn result_sort(&self) -> &[SortKey] {
        &self.result_sort
    }

    #[must_use]
    pub const fn result_limit(&self) -> Option<usize> {
        self.result_limit
    }

    /// Content hash of the definition; distinguishes reloaded configurations.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn definition(&self) -> &FacetNavigationDefinition {
        &self.definition
    }

    #[must_use]
    pub fn into_root(self) -> NavigationRoot {
        NavigationRoot::new(Arc::new(self))
    }
}

fn result_sort(definition: &FacetNavigationDefinition) -> Result<Vec<SortKey>> {
    if definition.sort_order.len() > definition.sort_by.len() {
        return Err(NavError::InvalidConfig(format!(
            "navigation `{}` has more sort orders than sort properties",
            definition.name
        )));
    }
    definition
        .sort_by
        .iter()
        .enumerate()
        .map(|(index, property)| {
            let order = match definition.sort_order.get(index) {
                Some(raw) => raw.parse::<SortOrder>()?,
                None => SortOrder::Ascending,
            };
            Ok(SortKey::new(property.trim(), order))
        })
        .collect()
}
