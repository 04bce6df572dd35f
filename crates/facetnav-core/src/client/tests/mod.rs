use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tempfile::tempdir;

use crate::config::{Clock, EngineConfig};
use crate::doc_path::DocPath;
use crate::models::{Document, PropertyValue};
use crate::navigation::{FacetNavigationDefinition, MirrorDefinition};
use crate::oracle::DocumentStore;
use crate::registry::DefinitionSet;

use super::FacetNav;


fn car(name: &str, brand: &str, color: &str) -> Document {
    Document::new(DocPath::parse(&format!("/content/cars/{name}")).expect("path"))
        .with_property("hippo:brand", PropertyValue::String(brand.to_string()))
        .with_property("hippo:color", PropertyValue::String(color.to_string()))
}

fn store() -> Arc<DocumentStore> {
    Arc::new(
        DocumentStore::with_documents([
            car("a", "peugeot", "red"),
            car("b", "peugeot", "blue"),
            car("c", "bmw", "red"),
        ])
        .expect("store"),
    )
}

fn cars() -> FacetNavigationDefinition {
    FacetNavigationDefinition::new("cars", "/content/cars")
        .facet("hippo:brand", "brand")
        .facet("hippo:color", "color")
}

fn red_cars() -> MirrorDefinition {
    MirrorDefinition {
        name: "red-cars".to_string(),
        target: "cars".to_string(),
        facets: vec!["color".to_string()],
        values: vec!["red".to_string()],
        filters: Vec::new(),
    }
}

fn fixed_clock() -> Clock {
    Clock::Fixed(
        Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0)
            .single()
            .expect("date"),
    )
}
