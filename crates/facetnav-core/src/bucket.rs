//! Range bucketizer.
//!
//! Maps raw facet values onto the configured range buckets. Date ranges are relative to a
//! pinned "now", truncated to their resolution in the configured time zone.

use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveDateTime, Timelike, Utc,
};
use serde::{Deserialize, Serialize};

use crate::facet::{DatePart, RangeBounds, RangeDef, RangeResolution};
use crate::models::FacetValue;

/// Time reference for relative date ranges and date decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketContext {
    pub now: DateTime<Utc>,
    pub time_zone: FixedOffset,
}

impl BucketContext {
    #[must_use]
    pub const fn new(now: DateTime<Utc>, time_zone: FixedOffset) -> Self {
        Self { now, time_zone }
    }
}

/// Absolute form of a [`RangeDef`] once "now" is fixed. All intervals are half-open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedRange {
    Dates {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
    Numbers {
        begin: Option<f64>,
        end: Option<f64>,
    },
    Text {
        lower: Option<String>,
        upper: Option<String>,
    },
}

impl ResolvedRange {
    #[must_use]
    pub fn resolve(range: &RangeDef, ctx: &BucketContext) -> Self {
        match &range.bounds {
            RangeBounds::Relative { begin, end } => {
                let anchor = truncate(ctx.now, range.resolution, ctx.time_zone);
                Self::Dates {
                    start: begin.and_then(|offset| {
                        shift(anchor, range.resolution, offset, ctx.time_zone)
                    }),
                    end: end.and_then(|offset| {
                        shift(anchor, range.resolution, offset, ctx.time_zone)
                    }),
                }
            }
            RangeBounds::Numeric { begin, end } => Self::Numbers {
                begin: *begin,
                end: *end,
            },
            RangeBounds::Text { lower, upper } => Self::Text {
                lower: lower.clone(),
                upper: upper.clone(),
            },
        }
    }

    #[must_use]
    pub fn contains(&self, value: &FacetValue) -> bool {
        match self {
            Self::Dates { start, end } => {
                let Some(at) = value.as_date() else {
                    return false;
                };
                start.is_none_or(|start| at >= start) && end.is_none_or(|end| at < end)
            }
            Self::Numbers { begin, end } => {
                let number = value
                    .as_f64()
                    .or_else(|| value.as_str().and_then(|raw| raw.trim().parse::<f64>().ok()));
                let Some(number) = number.filter(|number| number.is_finite()) else {
                    return false;
                };
                begin.is_none_or(|begin| number >= begin) && end.is_none_or(|end| number < end)
            }
            Self::Text { lower, upper } => {
                if lower.is_none() && upper.is_none() {
                    return true;
                }
                let text = value.display();
                lower.as_deref().is_none_or(|lower| text.as_str() >= lower)
                    && upper.as_deref().is_none_or(|upper| text.as_str() < upper)
            }
        }
    }
}

/// Names of every range the value falls into, in configured order.
#[must_use]
pub fn buckets_for<'a>(
    value: &FacetValue,
    ranges: &'a [RangeDef],
    ctx: &BucketContext,
) -> Vec<&'a str> {
    ranges
        .iter()
        .filter(|range| ResolvedRange::resolve(range, ctx).contains(value))
        .map(|range| range.name.as_str())
        .collect()
}

/// Component of a date in the configured time zone; `None` for non-date values.
#[must_use]
pub fn date_part(value: &FacetValue, part: DatePart, time_zone: FixedOffset) -> Option<i64> {
    let local = value.as_date()?.with_timezone(&time_zone);
    let component = match part {
        DatePart::Year => i64::from(local.year()),
        DatePart::Month => i64::from(local.month()),
        DatePart::Week => i64::from(local.iso_week().week()),
        DatePart::Day => i64::from(local.day()),
        DatePart::DayOfWeek => i64::from(local.weekday().number_from_monday()),
        DatePart::DayOfYear => i64::from(local.ordinal()),
        DatePart::Hour => i64::from(local.hour()),
    };
    Some(component)
}

/// Start of the resolution unit containing `at`, as local wall-clock time.
fn truncate(
    at: DateTime<Utc>,
    resolution: RangeResolution,
    time_zone: FixedOffset,
) -> NaiveDateTime {
    let local = at.with_timezone(&time_zone).naive_local();
    let date = local.date();
    let start_date = match resolution {
        RangeResolution::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        RangeResolution::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
        RangeResolution::Week => date.checked_sub_signed(Duration::days(i64::from(
            date.weekday().num_days_from_monday(),
        ))),
        _ => Some(date),
    }
    .unwrap_or(date);
    let hour = if resolution == RangeResolution::Hour {
        local.hour()
    } else {
        0
    };
    start_date
        .and_hms_opt(hour, 0, 0)
        .unwrap_or_else(|| start_date.and_time(chrono::NaiveTime::MIN))
}

fn shift(
    anchor: NaiveDateTime,
    resolution: RangeResolution,
    units: i64,
    time_zone: FixedOffset,
) -> Option<DateTime<Utc>> {
    let shifted = match resolution {
        RangeResolution::Hour => anchor.checked_add_signed(Duration::try_hours(units)?),
        RangeResolution::Week => anchor.checked_add_signed(Duration::try_weeks(units)?),
        RangeResolution::Month => shift_months(anchor, units),
        RangeResolution::Year => shift_months(anchor, units.checked_mul(12)?),
        _ => anchor.checked_add_signed(Duration::try_days(units)?),
    }?;
    shifted
        .and_local_timezone(time_zone)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

fn shift_months(anchor: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        anchor.checked_add_months(magnitude)
    } else {
        anchor.checked_sub_months(magnitude)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn numeric(name: &str, begin: Option<f64>, end: Option<f64>) -> RangeDef {
        RangeDef {
            name: name.to_string(),
            resolution: RangeResolution::Double,
            bounds: RangeBounds::Numeric { begin, end },
        }
    }

    fn days(name: &str, begin: Option<i64>, end: Option<i64>) -> RangeDef {
        RangeDef {
            name: name.to_string(),
            resolution: RangeResolution::Day,
            bounds: RangeBounds::Relative { begin, end },
        }
    }

    fn utc_ctx(now: DateTime<Utc>) -> BucketContext {
        BucketContext::new(now, FixedOffset::east_opt(0).expect("utc"))
    }

    #[test]
    fn numeric_ranges_are_half_open_and_may_overlap() {
        let ranges = vec![
            numeric("cheap", None, Some(10000.0)),
            numeric("mid", Some(10000.0), Some(20000.0)),
            numeric("expensive", Some(20000.0), None),
            numeric("all", None, None),
        ];
        let ctx = utc_ctx(Utc::now());
        assert_eq!(
            buckets_for(&FacetValue::Double(9999.5), &ranges, &ctx),
            vec!["cheap", "all"]
        );
        assert_eq!(
            buckets_for(&FacetValue::Long(10000), &ranges, &ctx),
            vec!["mid", "all"]
        );
        assert_eq!(
            buckets_for(&FacetValue::Long(20000), &ranges, &ctx),
            vec!["expensive", "all"]
        );
        assert_eq!(
            buckets_for(&FacetValue::String("15000".to_string()), &ranges, &ctx),
            vec!["mid", "all"]
        );
        assert!(buckets_for(&FacetValue::String("n/a".to_string()), &ranges, &ctx).is_empty());
    }

    #[test]
    fn string_ranges_use_lower_inclusive_upper_exclusive() {
        let ranges = vec![
            RangeDef {
                name: "a-m".to_string(),
                resolution: RangeResolution::String,
                bounds: RangeBounds::Text {
                    lower: Some("a".to_string()),
                    upper: Some("n".to_string()),
                },
            },
            RangeDef {
                name: "all".to_string(),
                resolution: RangeResolution::String,
                bounds: RangeBounds::Text {
                    lower: None,
                    upper: None,
                },
            },
        ];
        let ctx = utc_ctx(Utc::now());
        assert_eq!(
            buckets_for(&FacetValue::String("mazda".to_string()), &ranges, &ctx),
            vec!["a-m", "all"]
        );
        assert_eq!(
            buckets_for(&FacetValue::String("n".to_string()), &ranges, &ctx),
            vec!["all"]
        );
        assert_eq!(
            buckets_for(&FacetValue::Long(3), &ranges, &ctx),
            vec!["all"]
        );
    }

    #[test]
    fn day_truncation_uses_configured_time_zone_near_midnight() {
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        let now = tz
            .with_ymd_and_hms(2026, 10, 17, 8, 0, 0)
            .single()
            .expect("now")
            .with_timezone(&Utc);
        let created = tz
            .with_ymd_and_hms(2026, 10, 17, 0, 23, 0)
            .single()
            .expect("created")
            .with_timezone(&Utc);
        let ranges = vec![days("today", Some(0), Some(1)), days("yesterday", Some(-1), Some(0))];

        let local = BucketContext::new(now, tz);
        assert_eq!(
            buckets_for(&FacetValue::Date(created), &ranges, &local),
            vec!["today"]
        );

        let naive_utc = utc_ctx(now);
        assert_eq!(
            buckets_for(&FacetValue::Date(created), &ranges, &naive_utc),
            vec!["yesterday"]
        );
    }

    #[test]
    fn open_ended_date_ranges() {
        let now = Utc
            .with_ymd_and_hms(2026, 10, 17, 12, 0, 0)
            .single()
            .expect("now");
        let ctx = utc_ctx(now);
        let ranges = vec![days("last 7 days", Some(-6), None), days("before", None, Some(-6))];
        let recent = Utc
            .with_ymd_and_hms(2026, 10, 11, 0, 0, 0)
            .single()
            .expect("recent");
        let old = Utc
            .with_ymd_and_hms(2026, 10, 10, 23, 59, 59)
            .single()
            .expect("old");
        assert_eq!(
            buckets_for(&FacetValue::Date(recent), &ranges, &ctx),
            vec!["last 7 days"]
        );
        assert_eq!(
            buckets_for(&FacetValue::Date(old), &ranges, &ctx),
            vec!["before"]
        );
        assert!(buckets_for(&FacetValue::Long(1), &ranges, &ctx).is_empty());
    }

    #[test]
    fn week_month_and_year_resolutions_truncate_to_unit_start() {
        // 2026-10-17 is a Saturday.
        let now = Utc
            .with_ymd_and_hms(2026, 10, 17, 12, 0, 0)
            .single()
            .expect("now");
        let ctx = utc_ctx(now);
        let this_week = RangeDef {
            name: "this week".to_string(),
            resolution: RangeResolution::Week,
            bounds: RangeBounds::Relative {
                begin: Some(0),
                end: Some(1),
            },
        };
        let last_month = RangeDef {
            name: "last month".to_string(),
            resolution: RangeResolution::Month,
            bounds: RangeBounds::Relative {
                begin: Some(-1),
                end: Some(0),
            },
        };
        let this_year = RangeDef {
            name: "this year".to_string(),
            resolution: RangeResolution::Year,
            bounds: RangeBounds::Relative {
                begin: Some(0),
                end: None,
            },
        };
        let ranges = vec![this_week, last_month, this_year];
        let monday = Utc
            .with_ymd_and_hms(2026, 10, 12, 0, 0, 0)
            .single()
            .expect("monday");
        let sunday_before = Utc
            .with_ymd_and_hms(2026, 10, 11, 23, 0, 0)
            .single()
            .expect("sun");
        let september = Utc
            .with_ymd_and_hms(2026, 9, 30, 1, 0, 0)
            .single()
            .expect("sep");
        let last_year = Utc
            .with_ymd_and_hms(2025, 12, 31, 1, 0, 0)
            .single()
            .expect("dec");
        assert_eq!(
            buckets_for(&FacetValue::Date(monday), &ranges, &ctx),
            vec!["this week", "this year"]
        );
        assert_eq!(
            buckets_for(&FacetValue::Date(sunday_before), &ranges, &ctx),
            vec!["this year"]
        );
        assert_eq!(
            buckets_for(&FacetValue::Date(september), &ranges, &ctx),
            vec!["last month", "this year"]
        );
        assert!(buckets_for(&FacetValue::Date(last_year), &ranges, &ctx).is_empty());
    }

    #[test]
    fn date_parts_follow_time_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).expect("offset");
        let at = Utc
            .with_ymd_and_hms(2025, 12, 31, 23, 30, 0)
            .single()
            .expect("at");
        let value = FacetValue::Date(at);
        assert_eq!(date_part(&value, DatePart::Year, tz), Some(2026));
        assert_eq!(date_part(&value, DatePart::Month, tz), Some(1));
        assert_eq!(date_part(&value, DatePart::Day, tz), Some(1));
        assert_eq!(date_part(&value, DatePart::Hour, tz), Some(1));
        assert_eq!(date_part(&value, DatePart::DayOfYear, tz), Some(1));
        // 2026-01-01 is a Thursday.
        assert_eq!(date_part(&value, DatePart::DayOfWeek, tz), Some(4));
        let utc = FixedOffset::east_opt(0).expect("utc");
        assert_eq!(date_part(&value, DatePart::Year, utc), Some(2025));
        assert_eq!(date_part(&FacetValue::Long(3), DatePart::Year, utc), None);
    }
}
