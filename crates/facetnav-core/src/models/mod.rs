mod document;
mod navigation;
mod trace;

pub use document::{Document, DocumentRef, FacetValue, PropertyValue, document_id};
pub use navigation::{
    DefinitionKind, IndexGeneration, NodeKind, RESULTSET, VirtualChild, VirtualNode,
};
pub use trace::RequestLogEntry;
