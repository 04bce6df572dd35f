use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::doc_path::DocPath;

/// Stored property value. `Multi` holds the elements of a multi-valued property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Multi(Vec<PropertyValue>),
}

impl PropertyValue {
    /// Scalar elements of this value; `Multi` is flattened.
    #[must_use]
    pub fn scalars(&self) -> Vec<&Self> {
        match self {
            Self::Multi(items) => items.iter().flat_map(Self::scalars).collect(),
            other => vec![other],
        }
    }

    /// Discrete facet value of a scalar. Blank strings have no facet value.
    #[must_use]
    pub fn to_facet_value(&self) -> Option<FacetValue> {
        match self {
            Self::String(value) if value.trim().is_empty() => None,
            Self::String(value) => Some(FacetValue::String(value.clone())),
            Self::Long(value) => Some(FacetValue::Long(*value)),
            Self::Double(value) if value.is_nan() => None,
            Self::Double(value) => Some(FacetValue::Double(*value)),
            Self::Boolean(value) => Some(FacetValue::Boolean(*value)),
            Self::Date(value) => Some(FacetValue::Date(*value)),
            Self::Multi(_) => None,
        }
    }

    /// Distinct facet values of this property, in value order.
    #[must_use]
    pub fn facet_values(&self) -> Vec<FacetValue> {
        let mut out = self
            .scalars()
            .into_iter()
            .filter_map(Self::to_facet_value)
            .collect::<Vec<_>>();
        out.sort();
        out.dedup();
        out
    }

    /// Text content used by free-text and `contains` matching.
    #[must_use]
    pub fn text_values(&self) -> Vec<String> {
        self.scalars()
            .into_iter()
            .filter_map(|scalar| match scalar {
                Self::String(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Discrete, ordered value a facet can be counted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetValue {
    Boolean(bool),
    Long(i64),
    Double(f64),
    Date(DateTime<Utc>),
    String(String),
}

impl FacetValue {
    const fn rank(&self) -> u8 {
        match self {
            Self::Boolean(_) => 0,
            Self::Long(_) | Self::Double(_) => 1,
            Self::Date(_) => 2,
            Self::String(_) => 3,
        }
    }

    /// Label used for branch names and for equality filters.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Boolean(value) => value.to_string(),
            Self::Long(value) => value.to_string(),
            Self::Double(value) => value.to_string(),
            Self::Date(value) => value.to_rfc3339_opts(SecondsFormat::Millis, true),
            Self::String(value) => value.clone(),
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, reason = "facet numbers compare as doubles")]
            Self::Long(value) => Some(*value as f64),
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl PartialEq for FacetValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FacetValue {}

impl PartialOrd for FacetValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FacetValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Long(a), Self::Long(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (a, b) if a.rank() == 1 && b.rank() == 1 => {
                let left = a.as_f64().unwrap_or_default();
                let right = b.as_f64().unwrap_or_default();
                // Long(2) and Double(2.0) stay distinct keys.
                left.total_cmp(&right)
                    .then_with(|| matches!(a, Self::Double(_)).cmp(&matches!(b, Self::Double(_))))
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub path: DocPath,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

impl Document {
    #[must_use]
    pub fn new(path: DocPath) -> Self {
        Self {
            id: document_id(&path),
            path,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.path.name().unwrap_or_default()
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    #[must_use]
    pub fn facet_values(&self, property: &str) -> Vec<FacetValue> {
        self.property(property)
            .map(PropertyValue::facet_values)
            .unwrap_or_default()
    }

    #[must_use]
    pub fn to_ref(&self) -> DocumentRef {
        DocumentRef {
            id: self.id.clone(),
            path: self.path.to_string_path(),
            name: self.name().to_string(),
        }
    }
}

/// Stable identifier derived from the document path.
#[must_use]
pub fn document_id(path: &DocPath) -> String {
    blake3::hash(path.to_string_path().as_bytes())
        .to_hex()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: String,
    pub path: String,
    pub name: String,
}
