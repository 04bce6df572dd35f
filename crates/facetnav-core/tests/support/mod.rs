#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use facetnav_core::{
    Clock, DocPath, Document, DocumentStore, EngineConfig, FacetNavigation,
    FacetNavigationDefinition, NavigationRoot, NavigationSession, PropertyValue, VirtualNode,
};
use serde::Deserialize;

pub const PRICE_RANGES: &str = concat!(
    "hippo:price$[",
    "{name:'less-than-10000', resolution:'double', end:10000},",
    "{name:'10000-20000', resolution:'double', begin:10000, end:20000},",
    "{name:'more-than-20000', resolution:'double', begin:20000},",
    "{name:'all', resolution:'double'}",
    "]"
);

pub const PUBLISHED_RANGES: &str = concat!(
    "hippo:date$[",
    "{name:'this-year', resolution:'year', begin:0, end:1},",
    "{name:'last-year', resolution:'year', begin:-1, end:0}",
    "]"
);

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DateStructureFixture {
    pub now: DateTime<Utc>,
    pub docbase: String,
    pub documents: Vec<FixtureDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureDocument {
    pub name: String,
    pub date: DateTime<Utc>,
    pub brand: String,
    pub color: String,
    pub price: f64,
}

impl FixtureDocument {
    pub fn to_document(&self, docbase: &str) -> Document {
        Document::new(DocPath::parse(&format!("{docbase}/{}", self.name)).expect("doc path"))
            .with_property("hippo:date", PropertyValue::Date(self.date))
            .with_property("hippo:brand", PropertyValue::String(self.brand.clone()))
            .with_property("hippo:color", PropertyValue::String(self.color.clone()))
            .with_property("hippo:price", PropertyValue::Double(self.price))
    }
}

fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("date_structure.json")
}

pub fn load_fixture() -> DateStructureFixture {
    let raw = fs::read_to_string(fixture_path()).expect("read date structure fixture");
    serde_json::from_str(&raw).expect("parse date structure fixture")
}

pub fn fixture_store(fixture: &DateStructureFixture) -> Arc<DocumentStore> {
    let documents = fixture
        .documents
        .iter()
        .map(|document| document.to_document(&fixture.docbase));
    Arc::new(DocumentStore::with_documents(documents).expect("store"))
}

pub fn date_structure_definition(fixture: &DateStructureFixture) -> FacetNavigationDefinition {
    FacetNavigationDefinition::new("datestructure", fixture.docbase.clone())
        .facet("hippo:date$year", "year")
        .facet("hippo:date$month", "month${after:'year'}")
        .facet("hippo:brand", "brand")
        .facet("hippo:color", "color")
        .facet(PRICE_RANGES, "price")
        .facet(PUBLISHED_RANGES, "published")
}

pub fn date_structure_root(fixture: &DateStructureFixture) -> NavigationRoot {
    FacetNavigation::from_definition(date_structure_definition(fixture))
        .expect("navigation")
        .into_root()
}

pub fn open_session(store: &Arc<DocumentStore>, now: DateTime<Utc>) -> NavigationSession {
    NavigationSession::open(store.clone(), &EngineConfig::default(), Clock::Fixed(now))
        .expect("session")
}

pub fn child_counts(node: &VirtualNode) -> Vec<(String, u64)> {
    node.children
        .iter()
        .map(|child| (child.name.clone(), child.count))
        .collect()
}

pub fn pairs(items: &[(&str, u64)]) -> Vec<(String, u64)> {
    items
        .iter()
        .map(|(name, count)| ((*name).to_string(), *count))
        .collect()
}
