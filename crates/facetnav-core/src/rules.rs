//! Visibility and ordering rules for facets at one tree position.

use std::cmp::Ordering;

use crate::facet::{FacetSpec, SortBy, SortOrder};
use crate::navigation::ConstraintPath;

/// One value branch of a facet before ordering and truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueBranch {
    pub name: String,
    pub count: u64,
    /// Declared position of the range this branch came from.
    pub config_index: Option<usize>,
}

impl ValueBranch {
    #[must_use]
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self {
            name: name.into(),
            count,
            config_index: None,
        }
    }
}

/// Facets selectable at `path`, in configured order.
///
/// A facet is visible when it is not selected yet, all of its `after` facets are selected,
/// and no selected facet hides it.
#[must_use]
pub fn visible_facets<'a>(specs: &'a [FacetSpec], path: &ConstraintPath) -> Vec<&'a FacetSpec> {
    let selected = specs
        .iter()
        .filter(|spec| path.contains_facet(&spec.node_name))
        .collect::<Vec<_>>();
    specs
        .iter()
        .filter(|spec| !path.contains_facet(&spec.node_name))
        .filter(|spec| {
            spec.visibility
                .after
                .iter()
                .all(|name| path.contains_facet(name))
        })
        .filter(|spec| {
            !selected
                .iter()
                .any(|chosen| chosen.visibility.hide.contains(&spec.node_name))
        })
        .collect()
}

#[must_use]
pub fn is_visible(specs: &[FacetSpec], path: &ConstraintPath, node_name: &str) -> bool {
    visible_facets(specs, path)
        .iter()
        .any(|spec| spec.node_name == node_name)
}

/// Orders value branches and truncates them to `limit`.
#[must_use]
pub fn order_values(
    mut values: Vec<ValueBranch>,
    sort_by: SortBy,
    sort_order: SortOrder,
    limit: Option<usize>,
) -> Vec<ValueBranch> {
    let has_config_order = values.iter().all(|value| value.config_index.is_some());
    values.sort_by(|a, b| {
        let primary = match sort_by {
            SortBy::Count => a.count.cmp(&b.count),
            SortBy::Config if has_config_order => a.config_index.cmp(&b.config_index),
            SortBy::FacetValue | SortBy::Config => compare_facet_values(&a.name, &b.name),
        };
        let primary = match sort_order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| compare_facet_values(&a.name, &b.name))
    });
    if let Some(limit) = limit {
        values.truncate(limit);
    }
    values
}

/// Numeric comparison when both labels are numbers, lexicographic otherwise.
#[must_use]
pub fn compare_facet_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(left), Ok(right)) => left.total_cmp(&right).then_with(|| a.cmp(b)),
        _ => a.cmp(b),
    }
}
