use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::doc_path::DocPath;
use crate::error::{NavError, Result};
use crate::facet::SortOrder;
use crate::models::{Document, DocumentRef, FacetValue, IndexGeneration, PropertyValue};
use crate::query::Constraint;

use super::{CountOracle, IndexSnapshot, NavigationScope, SortKey, ValueCounts};

#[derive(Debug, Clone, Default)]
struct StoreState {
    generation: IndexGeneration,
    documents: BTreeMap<DocPath, Arc<Document>>,
}

/// One mutation applied by [`DocumentStore::commit`].
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    Upsert(Document),
    /// Removes the document and everything below it.
    Remove(DocPath),
    SetProperty {
        path: DocPath,
        name: String,
        value: PropertyValue,
    },
    RemoveProperty {
        path: DocPath,
        name: String,
    },
}

/// In-memory reference store and count oracle.
///
/// Each commit publishes a new immutable state with the next generation; readers holding an
/// older snapshot keep seeing exactly what was committed when they took it.
#[derive(Debug)]
pub struct DocumentStore {
    state: RwLock<Arc<StoreState>>,
    available: AtomicBool,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(Arc::new(StoreState::default())),
            available: AtomicBool::new(true),
        }
    }

    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Result<Self> {
        let store = Self::new();
        store.commit(documents.into_iter().map(StoreWrite::Upsert).collect())?;
        Ok(store)
    }

    fn current(&self) -> Result<Arc<StoreState>> {
        let guard = self
            .state
            .read()
            .map_err(|_| NavError::lock_poisoned("document store"))?;
        Ok(Arc::clone(&guard))
    }

    pub fn generation(&self) -> Result<IndexGeneration> {
        Ok(self.current()?.generation)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.current()?.documents.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn get(&self, path: &DocPath) -> Result<Option<Document>> {
        Ok(self
            .current()?
            .documents
            .get(path)
            .map(|document| Document::clone(document)))
    }

    /// Simulates the backing store going away; snapshots then fail with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, AtomicOrdering::SeqCst);
    }

    pub fn upsert(&self, document: Document) -> Result<IndexGeneration> {
        self.commit(vec![StoreWrite::Upsert(document)])
    }

    pub fn remove(&self, path: &DocPath) -> Result<IndexGeneration> {
        self.commit(vec![StoreWrite::Remove(path.clone())])
    }

    pub fn set_property(
        &self,
        path: &DocPath,
        name: impl Into<String>,
        value: PropertyValue,
    ) -> Result<IndexGeneration> {
        self.commit(vec![StoreWrite::SetProperty {
            path: path.clone(),
            name: name.into(),
            value,
        }])
    }

    pub fn remove_property(
        &self,
        path: &DocPath,
        name: impl Into<String>,
    ) -> Result<IndexGeneration> {
        self.commit(vec![StoreWrite::RemoveProperty {
            path: path.clone(),
            name: name.into(),
        }])
    }

    /// Applies `writes` atomically. Nothing is published when one of them fails.
    pub fn commit(&self, writes: Vec<StoreWrite>) -> Result<IndexGeneration> {
        if !self.available.load(AtomicOrdering::SeqCst) {
            return Err(NavError::Unavailable("document store is offline".to_string()));
        }
        let mut guard = self
            .state
            .write()
            .map_err(|_| NavError::lock_poisoned("document store"))?;
        if writes.is_empty() {
            return Ok(guard.generation);
        }

        let mut next = StoreState::clone(&guard);
        for write in writes {
            apply_write(&mut next.documents, write)?;
        }
        next.generation = guard.generation.next();
        let generation = next.generation;
        *guard = Arc::new(next);
        drop(guard);
        debug!(%generation, "document store committed");
        Ok(generation)
    }

    /// Snapshot of the current committed state.
    pub fn snapshot_now(&self) -> Result<MemorySnapshot> {
        if !self.available.load(AtomicOrdering::SeqCst) {
            return Err(NavError::Unavailable("document store is offline".to_string()));
        }
        Ok(MemorySnapshot {
            state: self.current()?,
        })
    }
}

fn apply_write(documents: &mut BTreeMap<DocPath, Arc<Document>>, write: StoreWrite) -> Result<()> {
    match write {
        StoreWrite::Upsert(document) => {
            documents.insert(document.path.clone(), Arc::new(document));
        }
        StoreWrite::Remove(path) => {
            let before = documents.len();
            documents.retain(|candidate, _| !candidate.starts_with(&path));
            if documents.len() == before {
                return Err(NavError::NotFound(format!("document {path}")));
            }
        }
        StoreWrite::SetProperty { path, name, value } => {
            let document = documents
                .get_mut(&path)
                .ok_or_else(|| NavError::NotFound(format!("document {path}")))?;
            Arc::make_mut(document).properties.insert(name, value);
        }
        StoreWrite::RemoveProperty { path, name } => {
            let document = documents
                .get_mut(&path)
                .ok_or_else(|| NavError::NotFound(format!("document {path}")))?;
            Arc::make_mut(document).properties.remove(&name);
        }
    }
    Ok(())
}

impl CountOracle for DocumentStore {
    fn snapshot(&self) -> Result<Arc<dyn IndexSnapshot>> {
        Ok(Arc::new(self.snapshot_now()?))
    }
}

/// Immutable view of one committed [`DocumentStore`] state.
#[derive(Debug, Clone)]
pub struct MemorySnapshot {
    state: Arc<StoreState>,
}

impl MemorySnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.documents.is_empty()
    }

    fn matching<'a>(
        &'a self,
        scope: &'a NavigationScope,
        query: &'a Constraint,
    ) -> impl Iterator<Item = &'a Arc<Document>> + 'a {
        self.state
            .documents
            .values()
            .filter(move |document| scope.contains(&document.path) && query.matches(document))
    }
}

impl IndexSnapshot for MemorySnapshot {
    fn generation(&self) -> IndexGeneration {
        self.state.generation
    }

    fn count(&self, scope: &NavigationScope, query: &Constraint) -> Result<u64> {
        Ok(self.matching(scope, query).count() as u64)
    }

    fn value_counts(
        &self,
        scope: &NavigationScope,
        query: &Constraint,
        property: &str,
    ) -> Result<ValueCounts> {
        let mut counts = ValueCounts::default();
        for document in self.matching(scope, query) {
            counts.total += 1;
            let values = document.facet_values(property);
            if values.is_empty() {
                counts.missing += 1;
            }
            for value in values {
                *counts.values.entry(value).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    fn search(
        &self,
        scope: &NavigationScope,
        query: &Constraint,
        sort: &[SortKey],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DocumentRef>> {
        let mut hits = self.matching(scope, query).collect::<Vec<_>>();
        hits.sort_by(|a, b| compare_documents(a, b, sort));
        Ok(hits
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|document| document.to_ref())
            .collect())
    }
}

fn sort_value(document: &Document, property: &str) -> Option<FacetValue> {
    match property {
        SortKey::NAME => Some(FacetValue::String(document.name().to_string())),
        SortKey::PATH => Some(FacetValue::String(document.path.to_string_path())),
        other => document.facet_values(other).into_iter().next(),
    }
}

/// Documents without a sort value go last in either direction.
fn compare_documents(a: &Document, b: &Document, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ordering = match (sort_value(a, &key.property), sort_value(b, &key.property)) {
            (Some(left), Some(right)) => match key.order {
                SortOrder::Ascending => left.cmp(&right),
                SortOrder::Descending => right.cmp(&left),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.path.cmp(&b.path)
}
