// Public fallible APIs in this crate share one concrete error contract (`NavError`).
// Repeating per-function `# Errors` boilerplate obscures behavior more than it clarifies.
#![allow(
    clippy::missing_errors_doc,
    reason = "crate-wide fallible API uses one explicit error type; per-item boilerplate would duplicate contract"
)]

pub mod bucket;
pub mod cache;
pub mod client;
pub mod config;
pub mod doc_path;
pub mod error;
pub mod facet;
pub mod models;
pub mod navigation;
pub mod oracle;
pub mod query;
pub mod registry;
pub mod request_log;
pub mod rules;
pub mod session;
pub mod state;

pub use client::FacetNav;
pub use config::{Clock, EngineConfig};
pub use doc_path::DocPath;
pub use error::{NavError, Result};
pub use models::{Document, IndexGeneration, NodeKind, PropertyValue, VirtualNode};
pub use navigation::{
    FacetNavigation, FacetNavigationDefinition, MirrorDefinition, NavigationRoot, ResolveOptions,
};
pub use oracle::{CountOracle, DocumentStore, IndexSnapshot};
pub use registry::{DefinitionSet, NavigationRegistry};
pub use session::NavigationSession;
