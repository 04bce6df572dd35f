use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};
use crate::query::{Constraint, parse_filters};

use super::{ConstraintPath, FacetNavigation};

/// Mirror re-exposing a navigation, or another mirror, with extra constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorDefinition {
    pub name: String,
    /// Navigation or mirror name this mirror points at.
    pub target: String,
    #[serde(default)]
    pub facets: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub filters: Vec<String>,
}

/// Constraints contributed by one mirror level.
///
/// `facets`/`values` pairs naming a facet of the navigation become preselected path entries;
/// other pairs become `property = value` filters.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorLayer {
    pub name: String,
    pub path: ConstraintPath,
    pub filter: Constraint,
}

impl MirrorLayer {
    pub fn from_definition(
        definition: &MirrorDefinition,
        navigation: &FacetNavigation,
    ) -> Result<Self> {
        if definition.facets.len() != definition.values.len() {
            return Err(NavError::InvalidConfig(format!(
                "mirror `{}` has {} facets but {} values",
                definition.name,
                definition.facets.len(),
                definition.values.len()
            )));
        }
        let mut path = ConstraintPath::default();
        let mut filters = Vec::new();
        for (facet, value) in definition.facets.iter().zip(&definition.values) {
            if navigation.facet(facet).is_some() {
                path = path.append(facet.as_str(), value.as_str());
            } else {
                filters.push(Constraint::equals(facet.as_str(), value.as_str()));
            }
        }
        let configured = parse_filters(&definition.filters).map_err(|err| {
            NavError::InvalidConfig(format!("mirror `{}` filter: {err}", definition.name))
        })?;
        filters.push(configured);
        Ok(Self {
            name: definition.name.clone(),
            path,
            filter: Constraint::all_of(filters),
        })
    }

    /// Single layer equivalent to `outer` wrapped around `inner`.
    #[must_use]
    pub fn merge(outer: &Self, inner: &Self) -> Self {
        Self {
            name: format!("{}>{}", outer.name, inner.name),
            path: outer.path.concat(&inner.path),
            filter: outer.filter.clone().and(inner.filter.clone()),
        }
    }
}

/// Entry point of a traversal: a navigation plus every constraint inherited from mirrors.
#[derive(Debug, Clone)]
pub struct NavigationRoot {
    navigation: Arc<FacetNavigation>,
    prefix: ConstraintPath,
    inherited: Constraint,
    mirrors: Vec<String>,
}

impl NavigationRoot {
    #[must_use]
    pub fn new(navigation: Arc<FacetNavigation>) -> Self {
        Self {
            navigation,
            prefix: ConstraintPath::default(),
            inherited: Constraint::All,
            mirrors: Vec::new(),
        }
    }

    /// Reaches this root through `layer`, which becomes the outermost constraint.
    #[must_use]
    pub fn through(&self, layer: &MirrorLayer) -> Self {
        let mut mirrors = Vec::with_capacity(self.mirrors.len() + 1);
        mirrors.push(layer.name.clone());
        mirrors.extend(self.mirrors.iter().cloned());
        Self {
            navigation: Arc::clone(&self.navigation),
            prefix: layer.path.concat(&self.prefix),
            inherited: layer.filter.clone().and(self.inherited.clone()),
            mirrors,
        }
    }

    /// Applies a mirror chain given outermost first.
    #[must_use]
    pub fn through_chain(navigation: Arc<FacetNavigation>, layers: &[MirrorLayer]) -> Self {
        layers
            .iter()
            .rev()
            .fold(Self::new(navigation), |root, layer| root.through(layer))
    }

    #[must_use]
    pub fn navigation(&self) -> &FacetNavigation {
        &self.navigation
    }

    #[must_use]
    pub fn prefix(&self) -> &ConstraintPath {
        &self.prefix
    }

    #[must_use]
    pub fn inherited(&self) -> &Constraint {
        &self.inherited
    }

    /// Mirror names crossed to reach the navigation, outermost first.
    #[must_use]
    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    /// Display name of the root node.
    #[must_use]
    pub fn name(&self) -> &str {
        self.mirrors
            .first()
            .map_or(self.navigation.name(), String::as_str)
    }
}
