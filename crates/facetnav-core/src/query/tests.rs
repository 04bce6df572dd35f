use chrono::{FixedOffset, TimeZone, Utc};

use super::*;
use crate::doc_path::DocPath;
use crate::models::PropertyValue;

fn car(name: &str, brand: &str, color: Option<&str>, title: &str) -> Document {
    let path = DocPath::parse(&format!("/content/cars/{name}")).expect("path");
    let mut doc = Document::new(path)
        .with_property("hippo:brand", PropertyValue::String(brand.to_string()))
        .with_property("hippo:title", PropertyValue::String(title.to_string()));
    if let Some(color) = color {
        doc = doc.with_property("hippo:color", PropertyValue::String(color.to_string()));
    }
    doc
}

#[test]
fn equality_and_negation_follow_property_presence() {
    let red = car("a", "peugeot", Some("red"), "Small city car");
    let plain = car("b", "peugeot", None, "Family wagon");

    let is_red = parse_filter("hippo:color = red").expect("parse");
    assert!(is_red.matches(&red));
    assert!(!is_red.matches(&plain));

    let not_red = parse_filter("hippo:color != 'red'").expect("parse");
    assert!(!not_red.matches(&red));
    assert!(not_red.matches(&plain));

    let negated = parse_filter("not(hippo:color=red)").expect("parse");
    assert_eq!(negated, not_red);
}

#[test]
fn boolean_operators_and_grouping() {
    let red = car("a", "peugeot", Some("red"), "Small city car");
    let blue = car("b", "bmw", Some("blue"), "Sports coupe");
    let filter =
        parse_filter("(hippo:brand=bmw or hippo:color=red) AND hippo:title != 'Family wagon'")
            .expect("parse");
    assert!(filter.matches(&red));
    assert!(filter.matches(&blue));

    let only_bmw = parse_filter("hippo:brand=bmw and not(hippo:color=red)").expect("parse");
    assert!(only_bmw.matches(&blue));
    assert!(!only_bmw.matches(&red));
}

#[test]
fn contains_targets_property_or_whole_document() {
    let doc = car("city-runner", "peugeot", Some("red"), "Small city car");

    let title = parse_filter("contains(hippo:title, 'city car')").expect("parse");
    assert!(title.matches(&doc));
    let whole = parse_filter("contains(., runner)").expect("parse");
    assert!(whole.matches(&doc));
    let brand_prefix = parse_filter("contains(hippo:brand, peu*)").expect("parse");
    assert!(brand_prefix.matches(&doc));
    let missing = parse_filter("contains(hippo:title, coupe)").expect("parse");
    assert!(!missing.matches(&doc));
}

#[test]
fn leading_wildcards_and_malformed_filters_are_query_errors() {
    for raw in [
        "contains(., *car)",
        "contains(hippo:title, '?ar')",
        "hippo:brand",
        "hippo:brand = ",
        "not(hippo:brand=bmw",
        "hippo:brand=bmw and",
        "hippo:brand=bmw )",
    ] {
        let err = parse_filter(raw).expect_err(raw);
        assert!(err.is_query_error(), "{raw}: {err}");
    }
}

#[test]
fn filter_entries_are_and_ed_and_blank_entries_skipped() {
    let combined =
        parse_filters(&["hippo:brand=peugeot", "  ", "hippo:color=red"]).expect("parse");
    assert_eq!(
        combined,
        Constraint::And(vec![
            Constraint::equals("hippo:brand", "peugeot"),
            Constraint::equals("hippo:color", "red"),
        ])
    );
    assert_eq!(parse_filters::<&str>(&[]).expect("parse"), Constraint::All);
}

#[test]
fn free_text_terms_phrases_or_and_negation() {
    let texts = ["Red Peugeot 208, a small city car"];
    let matches = |raw: &str| TextQuery::parse(raw).expect(raw).matches(&texts);

    assert!(matches("peugeot red"));
    assert!(!matches("peugeot blue"));
    assert!(matches("\"city car\""));
    assert!(!matches("\"car city\""));
    assert!(matches("blue OR red"));
    assert!(matches("peugeot -blue"));
    assert!(!matches("peugeot -red"));
    assert!(matches("peu*"));
    assert!(matches("PEUGEOT"));
    assert!(matches(""));
}

#[test]
fn free_text_rejects_bad_wildcards_and_dangling_or() {
    for raw in ["*car", "-*car", "c*r", "OR car", "car OR", "\"open phrase"] {
        let err = TextQuery::parse(raw).expect_err(raw);
        assert!(err.is_query_error(), "{raw}: {err}");
    }
}

#[test]
fn date_part_constraints_use_the_configured_offset() {
    let late_evening = Utc
        .with_ymd_and_hms(2025, 12, 31, 23, 30, 0)
        .single()
        .expect("date");
    let doc = car("a", "peugeot", None, "x")
        .with_property("hippo:date", PropertyValue::Date(late_evening));
    let year = |value, offset| Constraint::DatePart {
        property: "hippo:date".to_string(),
        part: crate::facet::DatePart::Year,
        value,
        offset,
    };
    let utc = FixedOffset::east_opt(0).expect("utc");
    let plus_two = FixedOffset::east_opt(2 * 3600).expect("offset");
    assert!(year(2025, utc).matches(&doc));
    assert!(year(2026, plus_two).matches(&doc));
}

#[test]
fn all_of_flattens_and_short_circuits() {
    let red = Constraint::equals("hippo:color", "red");
    assert_eq!(Constraint::All.and(red.clone()), red);
    assert_eq!(red.clone().and(Constraint::Nothing), Constraint::Nothing);
    let nested = Constraint::all_of([
        Constraint::And(vec![red.clone(), Constraint::All]),
        Constraint::equals("hippo:brand", "bmw"),
    ]);
    assert!(matches!(nested, Constraint::And(ref parts) if parts.len() == 2));
    assert_eq!(
        Constraint::equals("a", "b").to_string(),
        "a=\"b\"".to_string()
    );
}
