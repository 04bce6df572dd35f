//! Facet configuration model.
//!
//! Facet definitions (`hippo:brand`, `hippo:date$year`, `hippo:price$[{...}]`) and the
//! positionally matched node-name definitions (`brand${hide:'color', limit:5}`) are parsed
//! once per configuration load into immutable [`FacetSpec`]s.

use std::collections::{BTreeSet, HashSet};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

mod modifiers;
pub(crate) mod notation;
mod ranges;


pub use ranges::{RangeBounds, RangeDef, RangeResolution};

/// Date component a `property$part` facet decomposes a date into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePart {
    Year,
    Month,
    Week,
    Day,
    DayOfWeek,
    DayOfYear,
    Hour,
}

impl DatePart {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::DayOfWeek => "dayofweek",
            Self::DayOfYear => "dayofyear",
            Self::Hour => "hour",
        }
    }
}

impl FromStr for DatePart {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            "day" => Ok(Self::Day),
            "dayofweek" => Ok(Self::DayOfWeek),
            "dayofyear" => Ok(Self::DayOfYear),
            "hour" => Ok(Self::Hour),
            other => Err(NavError::InvalidConfig(format!(
                "unknown date resolution: ${other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    Discrete,
    DateResolution(DatePart),
    RangeList(Vec<RangeDef>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    FacetValue,
    Count,
    Config,
}

impl FromStr for SortBy {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facetvalue" => Ok(Self::FacetValue),
            "count" => Ok(Self::Count),
            "config" => Ok(Self::Config),
            other => Err(NavError::InvalidConfig(format!(
                "invalid sortby: {other} (expected facetvalue|count|config)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(Self::Ascending),
            "descending" | "desc" => Ok(Self::Descending),
            other => Err(NavError::InvalidConfig(format!(
                "invalid sortorder: {other} (expected ascending|descending)"
            ))),
        }
    }
}

/// `after:` / `hide:` constraints of one facet, by facet node name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub after: BTreeSet<String>,
    pub hide: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetSpec {
    /// Facet definition as configured, including any `$` suffix.
    pub source_property: String,
    /// Content property the facet reads.
    pub property: String,
    pub node_name: String,
    pub kind: FacetKind,
    pub visibility: VisibilityRule,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: Option<usize>,
}

impl FacetSpec {
    #[must_use]
    pub fn ranges(&self) -> &[RangeDef] {
        match &self.kind {
            FacetKind::RangeList(ranges) => ranges,
            _ => &[],
        }
    }

    #[must_use]
    pub fn range(&self, name: &str) -> Option<&RangeDef> {
        self.ranges().iter().find(|range| range.name == name)
    }
}

impl Display for FacetSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.node_name, self.source_property)
    }
}

/// Parses facet definitions and their positionally matched node-name definitions.
///
/// An empty `node_name_defs` names every facet after its property.
pub fn parse(facet_defs: &[String], node_name_defs: &[String]) -> Result<Vec<FacetSpec>> {
    if !node_name_defs.is_empty() && node_name_defs.len() != facet_defs.len() {
        return Err(NavError::InvalidConfig(format!(
            "{} facet definitions but {} node names",
            facet_defs.len(),
            node_name_defs.len()
        )));
    }

    let mut specs = Vec::with_capacity(facet_defs.len());
    for (index, facet_def) in facet_defs.iter().enumerate() {
        let (property, kind) = parse_facet_def(facet_def)?;
        let node_name = match node_name_defs.get(index) {
            Some(raw) => modifiers::parse_node_name(raw)?,
            None => modifiers::parse_node_name(&property)?,
        };
        let default_sort = match kind {
            FacetKind::RangeList(_) => SortBy::Config,
            _ => SortBy::FacetValue,
        };
        specs.push(FacetSpec {
            source_property: facet_def.trim().to_string(),
            property,
            node_name: node_name.label,
            kind,
            visibility: node_name.visibility,
            sort_by: node_name.sort_by.unwrap_or(default_sort),
            sort_order: node_name.sort_order.unwrap_or_default(),
            limit: node_name.limit,
        });
    }

    validate_names(&specs)?;
    Ok(specs)
}

fn parse_facet_def(raw: &str) -> Result<(String, FacetKind)> {
    let raw = raw.trim();
    let (property, suffix) = match raw.split_once('$') {
        Some((property, suffix)) => (property.trim(), Some(suffix.trim())),
        None => (raw, None),
    };
    if property.is_empty() {
        return Err(NavError::InvalidConfig(format!(
            "facet definition has no property: `{raw}`"
        )));
    }
    let kind = match suffix {
        None => FacetKind::Discrete,
        Some(suffix) if suffix.starts_with('[') => {
            FacetKind::RangeList(ranges::parse_range_list(suffix)?)
        }
        Some(suffix) => FacetKind::DateResolution(suffix.parse()?),
    };
    Ok((property.to_string(), kind))
}

fn validate_names(specs: &[FacetSpec]) -> Result<()> {
    let mut names = HashSet::new();
    for spec in specs {
        if spec.node_name == crate::models::RESULTSET {
            return Err(NavError::InvalidConfig(format!(
                "facet node name `{}` is reserved",
                spec.node_name
            )));
        }
        if !names.insert(spec.node_name.as_str()) {
            return Err(NavError::InvalidConfig(format!(
                "duplicate facet node name: {}",
                spec.node_name
            )));
        }
    }
    for spec in specs {
        for referenced in spec.visibility.after.iter().chain(&spec.visibility.hide) {
            if !names.contains(referenced.as_str()) {
                return Err(NavError::InvalidConfig(format!(
                    "facet `{}` references unknown facet `{referenced}`",
                    spec.node_name
                )));
            }
        }
        if spec.visibility.after.contains(&spec.node_name) {
            return Err(NavError::InvalidConfig(format!(
                "facet `{}` cannot appear after itself",
                spec.node_name
            )));
        }
    }
    Ok(())
}
