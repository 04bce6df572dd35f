use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{NavError, Result};

use super::notation::{Notation, parse_notation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeResolution {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Long,
    Double,
    String,
}

impl RangeResolution {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Long => "long",
            Self::Double => "double",
            Self::String => "string",
        }
    }

    #[must_use]
    pub const fn is_date(self) -> bool {
        matches!(
            self,
            Self::Year | Self::Month | Self::Week | Self::Day | Self::Hour
        )
    }
}

impl Display for RangeResolution {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeResolution {
    type Err = NavError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            "day" => Ok(Self::Day),
            "hour" => Ok(Self::Hour),
            "long" => Ok(Self::Long),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            other => Err(NavError::InvalidConfig(format!(
                "unknown range resolution: {other}"
            ))),
        }
    }
}

/// Bounds of one range. Absent bounds are open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeBounds {
    /// Signed offsets from "now", in units of the date resolution; `[begin, end)`.
    Relative { begin: Option<i64>, end: Option<i64> },
    /// Absolute numeric bounds; `[begin, end)`.
    Numeric { begin: Option<f64>, end: Option<f64> },
    /// Lexicographic bounds; `[lower, upper)`.
    Text {
        lower: Option<String>,
        upper: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeDef {
    pub name: String,
    pub resolution: RangeResolution,
    pub bounds: RangeBounds,
}

impl RangeDef {
    #[must_use]
    pub const fn is_unbounded(&self) -> bool {
        matches!(
            self.bounds,
            RangeBounds::Relative {
                begin: None,
                end: None
            } | RangeBounds::Numeric {
                begin: None,
                end: None
            } | RangeBounds::Text {
                lower: None,
                upper: None
            }
        )
    }
}

/// Parses the bracketed part of `property$[{...},{...}]`.
pub(super) fn parse_range_list(raw: &str) -> Result<Vec<RangeDef>> {
    let Notation::List(items) = parse_notation(raw)? else {
        return Err(NavError::InvalidConfig(format!(
            "range definition must be a list: {raw}"
        )));
    };
    if items.is_empty() {
        return Err(NavError::InvalidConfig(format!(
            "range definition list is empty: {raw}"
        )));
    }

    let mut seen = HashSet::new();
    let mut ranges = Vec::with_capacity(items.len());
    for item in &items {
        let range = parse_range(item)?;
        if !seen.insert(range.name.clone()) {
            return Err(NavError::InvalidConfig(format!(
                "duplicate range name: {}",
                range.name
            )));
        }
        ranges.push(range);
    }
    Ok(ranges)
}

fn parse_range(item: &Notation) -> Result<RangeDef> {
    let Notation::Object(entries) = item else {
        return Err(NavError::InvalidConfig(
            "range entry must be an object".to_string(),
        ));
    };

    let mut name = None;
    let mut resolution = None;
    let mut begin = None;
    let mut end = None;
    let mut lower = None;
    let mut upper = None;
    for (key, value) in entries {
        match key.to_ascii_lowercase().as_str() {
            "name" => name = value.as_text(),
            "resolution" => {
                let raw = value.as_text().ok_or_else(|| {
                    NavError::InvalidConfig("range resolution must be a string".to_string())
                })?;
                resolution = Some(raw.parse::<RangeResolution>()?);
            }
            "begin" => begin = Some(value),
            "end" => end = Some(value),
            "lower" => lower = Some(required_text(value, "lower")?),
            "upper" => upper = Some(required_text(value, "upper")?),
            other => {
                return Err(NavError::InvalidConfig(format!(
                    "unknown range attribute: {other}"
                )));
            }
        }
    }

    let name = name
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| NavError::InvalidConfig("range entry is missing a name".to_string()))?;
    let resolution = resolution.unwrap_or(if lower.is_some() || upper.is_some() {
        RangeResolution::String
    } else {
        RangeResolution::Double
    });

    let bounds = match resolution {
        RangeResolution::String => {
            if begin.is_some() || end.is_some() {
                return Err(NavError::InvalidConfig(format!(
                    "string range `{name}` takes lower/upper bounds"
                )));
            }
            RangeBounds::Text { lower, upper }
        }
        numeric @ (RangeResolution::Long | RangeResolution::Double) => {
            reject_text_bounds(&name, lower.as_ref(), upper.as_ref())?;
            RangeBounds::Numeric {
                begin: numeric_bound(&name, numeric, begin)?,
                end: numeric_bound(&name, numeric, end)?,
            }
        }
        _ => {
            reject_text_bounds(&name, lower.as_ref(), upper.as_ref())?;
            RangeBounds::Relative {
                begin: relative_bound(&name, begin)?,
                end: relative_bound(&name, end)?,
            }
        }
    };

    Ok(RangeDef {
        name,
        resolution,
        bounds,
    })
}

fn required_text(value: &Notation, key: &str) -> Result<String> {
    value
        .as_text()
        .ok_or_else(|| NavError::InvalidConfig(format!("range {key} must be a scalar")))
}

fn reject_text_bounds(name: &str, lower: Option<&String>, upper: Option<&String>) -> Result<()> {
    if lower.is_some() || upper.is_some() {
        return Err(NavError::InvalidConfig(format!(
            "range `{name}` uses lower/upper without string resolution"
        )));
    }
    Ok(())
}

fn numeric_bound(
    name: &str,
    resolution: RangeResolution,
    value: Option<&Notation>,
) -> Result<Option<f64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if matches!(value, Notation::Null) {
        return Ok(None);
    }
    if resolution == RangeResolution::Long && matches!(value, Notation::Float(_)) {
        return Err(NavError::InvalidConfig(format!(
            "range `{name}` has a fractional bound with long resolution"
        )));
    }
    value.as_f64().map(Some).ok_or_else(|| {
        NavError::InvalidConfig(format!("range `{name}` has a non-numeric bound"))
    })
}

fn relative_bound(name: &str, value: Option<&Notation>) -> Result<Option<i64>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if matches!(value, Notation::Null) {
        return Ok(None);
    }
    value.as_int().map(Some).ok_or_else(|| {
        NavError::InvalidConfig(format!(
            "date range `{name}` needs integer offsets"
        ))
    })
}
