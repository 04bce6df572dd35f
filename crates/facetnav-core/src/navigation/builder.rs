//! Resolves a traversal path into a [`VirtualNode`].
//!
//! Positions move through a small state machine:
//!
//! ```text
//! Node (root or selected value) --facet name--> Facet --value--> Node
//!                               --resultset---> Resultset
//! Facet (already in path)       --value-------> Leaf (count only)
//! Facet                         --resultset---> Resultset
//! Leaf | Resultset              --anything----> not found
//! ```
//!
//! Free-text segments are accepted at `Node` and `Facet` positions and constrain every
//! oracle call from there down.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bucket::{BucketContext, ResolvedRange, date_part};
use crate::cache::{CacheKey, CachedAnswer, NavigationCache, Probe};
use crate::error::{NavError, Result};
use crate::facet::{FacetKind, FacetSpec};
use crate::models::{
    DocumentRef, IndexGeneration, NodeKind, RESULTSET, VirtualChild, VirtualNode,
};
use crate::oracle::{IndexSnapshot, NavigationScope};
use crate::query::Constraint;
use crate::rules::{ValueBranch, order_values, visible_facets};

use super::{ConstraintPath, FreeTextSegment, NavigationRoot, PathSegment, Selection};

/// Per-call overrides for the resultset window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    pub result_offset: usize,
    pub result_limit: Option<usize>,
}

#[derive(Debug, Clone)]
enum Cursor {
    /// Navigation root or a selected value; children are facets and `resultset`.
    Node { path: ConstraintPath, name: String },
    Facet {
        path: ConstraintPath,
        facet: String,
        revisited: bool,
    },
    Leaf { path: ConstraintPath, name: String },
    Resultset { path: ConstraintPath },
}

impl Cursor {
    const fn path(&self) -> &ConstraintPath {
        match self {
            Self::Node { path, .. }
            | Self::Facet { path, .. }
            | Self::Leaf { path, .. }
            | Self::Resultset { path } => path,
        }
    }
}

/// Free-text state accumulated along the path.
#[derive(Debug, Clone, Default)]
struct TextState {
    constraint: Option<Constraint>,
    /// Canonical form of every segment seen, for cache keys.
    key: String,
    degraded: Option<String>,
}

impl TextState {
    fn push(&mut self, segment: &FreeTextSegment) {
        self.key.push_str(&segment.to_string());
        if self.degraded.is_some() {
            return;
        }
        match segment.to_constraint() {
            Ok(constraint) => {
                let merged = match self.constraint.take() {
                    Some(existing) => existing.and(constraint),
                    None => constraint,
                };
                self.constraint = Some(merged);
            }
            Err(err) => self.degraded = Some(err.to_string()),
        }
    }

    fn constraint(&self) -> Constraint {
        self.constraint.clone().unwrap_or(Constraint::All)
    }
}

pub(crate) struct Resolver<'a> {
    pub(crate) root: &'a NavigationRoot,
    pub(crate) snapshot: &'a dyn IndexSnapshot,
    pub(crate) buckets: BucketContext,
    pub(crate) cache: &'a mut NavigationCache,
    pub(crate) default_result_limit: usize,
}

impl Resolver<'_> {
    pub(crate) fn resolve(
        &mut self,
        segments: &[PathSegment],
        options: ResolveOptions,
    ) -> Result<VirtualNode> {
        let mut cursor = Cursor::Node {
            path: self.root.prefix().clone(),
            name: self.root.name().to_string(),
        };
        let mut text = TextState::default();
        for segment in segments {
            cursor = self.step(cursor, segment, &mut text)?;
        }

        if let Some(reason) = &text.degraded {
            debug!(
                navigation = self.root.navigation().name(),
                %reason,
                "free-text query rejected; position degraded to empty"
            );
            return Ok(self.degraded_node(&cursor));
        }
        self.materialize(&cursor, &text, options)
    }

    fn step(
        &self,
        cursor: Cursor,
        segment: &PathSegment,
        text: &mut TextState,
    ) -> Result<Cursor> {
        match (cursor, segment) {
            (
                cursor @ (Cursor::Node { .. } | Cursor::Facet { .. }),
                PathSegment::FreeText(free),
            ) => {
                text.push(free);
                Ok(cursor)
            }
            (Cursor::Node { path, .. } | Cursor::Facet { path, .. }, PathSegment::Resultset) => {
                Ok(Cursor::Resultset { path })
            }
            (Cursor::Node { path, .. }, PathSegment::Name(name)) => self.enter_facet(path, name),
            (
                Cursor::Facet {
                    path,
                    facet,
                    revisited,
                },
                PathSegment::Name(value),
            ) => self.select_value(path, &facet, value, revisited),
            (cursor, segment) => Err(self.not_found(cursor.path(), segment)),
        }
    }

    fn enter_facet(&self, path: ConstraintPath, name: &str) -> Result<Cursor> {
        let navigation = self.root.navigation();
        if navigation.facet(name).is_none() {
            return Err(self.not_found(&path, &PathSegment::Name(name.to_string())));
        }
        if path.contains_facet(name) {
            return Ok(Cursor::Facet {
                path,
                facet: name.to_string(),
                revisited: true,
            });
        }
        let visible = visible_facets(navigation.facets(), &path)
            .iter()
            .any(|spec| spec.node_name == name);
        if !visible {
            return Err(self.not_found(&path, &PathSegment::Name(name.to_string())));
        }
        Ok(Cursor::Facet {
            path,
            facet: name.to_string(),
            revisited: false,
        })
    }

    fn select_value(
        &self,
        path: ConstraintPath,
        facet: &str,
        value: &str,
        revisited: bool,
    ) -> Result<Cursor> {
        let spec = self.spec(facet)?;
        let next = path.append(facet, value);
        if revisited {
            return Ok(Cursor::Leaf {
                path: next,
                name: value.to_string(),
            });
        }
        let addressable = match &spec.kind {
            FacetKind::Discrete => true,
            FacetKind::DateResolution(_) => value.parse::<i64>().is_ok(),
            FacetKind::RangeList(_) => spec.range(value).is_some(),
        };
        if !addressable {
            return Err(self.not_found(&path, &PathSegment::Name(value.to_string())));
        }
        Ok(Cursor::Node {
            path: next,
            name: value.to_string(),
        })
    }

    fn materialize(
        &mut self,
        cursor: &Cursor,
        text: &TextState,
        options: ResolveOptions,
    ) -> Result<VirtualNode> {
        let generation = self.snapshot.generation();
        match cursor {
            Cursor::Node { path, name } => {
                let count = self.count(path, text)?;
                let mut children = visible_facets(self.root.navigation().facets(), path)
                    .into_iter()
                    .map(|spec| VirtualChild::branch(spec.node_name.as_str(), count))
                    .collect::<Vec<_>>();
                children.push(VirtualChild::resultset(count));
                let kind = if path.len() > self.root.prefix().len() {
                    NodeKind::FacetValue
                } else {
                    NodeKind::Root
                };
                Ok(node(name, kind, count, children, generation))
            }
            Cursor::Facet { path, facet, .. } => {
                let count = self.count(path, text)?;
                let spec = self.spec(facet)?.clone();
                let branches = self.branches(path, text, &spec)?;
                let mut children =
                    order_values(branches, spec.sort_by, spec.sort_order, spec.limit)
                        .into_iter()
                        .map(|branch| VirtualChild::branch(branch.name, branch.count))
                        .collect::<Vec<_>>();
                children.push(VirtualChild::resultset(count));
                Ok(node(facet, NodeKind::Facet, count, children, generation))
            }
            Cursor::Leaf { path, name } => {
                let count = self.count(path, text)?;
                Ok(node(name, NodeKind::Leaf, count, Vec::new(), generation))
            }
            Cursor::Resultset { path } => {
                let count = self.count(path, text)?;
                let limit = options
                    .result_limit
                    .or(self.root.navigation().result_limit())
                    .unwrap_or(self.default_result_limit);
                let mut resultset = node(
                    RESULTSET,
                    NodeKind::Resultset,
                    count,
                    Vec::new(),
                    generation,
                );
                resultset.result_documents =
                    self.documents(path, text, options.result_offset, limit)?;
                Ok(resultset)
            }
        }
    }

    fn degraded_node(&self, cursor: &Cursor) -> VirtualNode {
        let (name, kind) = match cursor {
            Cursor::Node { path, name } if path.len() > self.root.prefix().len() => {
                (name.as_str(), NodeKind::FacetValue)
            }
            Cursor::Node { name, .. } => (name.as_str(), NodeKind::Root),
            Cursor::Facet { facet, .. } => (facet.as_str(), NodeKind::Facet),
            Cursor::Leaf { name, .. } => (name.as_str(), NodeKind::Leaf),
            Cursor::Resultset { .. } => (RESULTSET, NodeKind::Resultset),
        };
        let mut degraded = node(name, kind, 0, Vec::new(), self.snapshot.generation());
        degraded.degraded = true;
        degraded
    }

    fn spec(&self, facet: &str) -> Result<&FacetSpec> {
        self.root
            .navigation()
            .facet(facet)
            .ok_or_else(|| NavError::NotFound(format!("facet `{facet}`")))
    }

    fn not_found(&self, path: &ConstraintPath, segment: &PathSegment) -> NavError {
        NavError::NotFound(format!(
            "`{segment}` under `{}{path}`",
            self.root.name()
        ))
    }

    /// Oracle query for a position: configured filter, mirror filters, selections, free text.
    fn query(&self, path: &ConstraintPath, text: &TextState) -> Constraint {
        let navigation = self.root.navigation();
        let selections = path
            .selections()
            .iter()
            .map(|selection| self.selection_constraint(selection));
        Constraint::all_of(
            [navigation.filter().clone(), self.root.inherited().clone()]
                .into_iter()
                .chain(selections)
                .chain([text.constraint()]),
        )
    }

    fn selection_constraint(&self, selection: &Selection) -> Constraint {
        let Some(spec) = self.root.navigation().facet(&selection.facet) else {
            return Constraint::Nothing;
        };
        match &spec.kind {
            FacetKind::Discrete => {
                Constraint::equals(spec.property.as_str(), selection.value.as_str())
            }
            FacetKind::DateResolution(part) => match selection.value.parse::<i64>() {
                Ok(value) => Constraint::DatePart {
                    property: spec.property.clone(),
                    part: *part,
                    value,
                    offset: self.buckets.time_zone,
                },
                Err(_) => Constraint::Nothing,
            },
            FacetKind::RangeList(_) => match spec.range(&selection.value) {
                Some(range) => Constraint::Range {
                    property: spec.property.clone(),
                    range: ResolvedRange::resolve(range, &self.buckets),
                },
                None => Constraint::Nothing,
            },
        }
    }

    fn key(&self, path: &ConstraintPath, text: &TextState, probe: Probe) -> CacheKey {
        let navigation = self.root.navigation();
        let inherited = format!("{}|{}", navigation.filter(), self.root.inherited());
        CacheKey {
            navigation: navigation.fingerprint().to_string(),
            scope: navigation.scope().to_string(),
            path: path.to_string(),
            inherited_filter: CacheKey::digest(&inherited),
            free_text: CacheKey::digest(&text.key),
            generation: self.snapshot.generation(),
            probe,
        }
    }

    fn count(&mut self, path: &ConstraintPath, text: &TextState) -> Result<u64> {
        let key = self.key(path, text, Probe::Count);
        let query = self.query(path, text);
        let snapshot = self.snapshot;
        let root = self.root;
        let scope = root.navigation().scope();
        let answer = self.cache.get_or_compute(key, || {
            Ok(CachedAnswer::Count(snapshot.count(scope, &query)?))
        })?;
        match answer {
            CachedAnswer::Count(count) => Ok(count),
            other => Err(unexpected(&other)),
        }
    }

    fn documents(
        &mut self,
        path: &ConstraintPath,
        text: &TextState,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<DocumentRef>> {
        let key = self.key(path, text, Probe::Results { offset, limit });
        let query = self.query(path, text);
        let snapshot = self.snapshot;
        let root = self.root;
        let navigation = root.navigation();
        let answer = self.cache.get_or_compute(key, || {
            let documents = snapshot.search(
                navigation.scope(),
                &query,
                navigation.result_sort(),
                limit,
                offset,
            )?;
            Ok(CachedAnswer::Documents(documents))
        })?;
        match answer {
            CachedAnswer::Documents(documents) => Ok(documents),
            other => Err(unexpected(&other)),
        }
    }

    fn branches(
        &mut self,
        path: &ConstraintPath,
        text: &TextState,
        spec: &FacetSpec,
    ) -> Result<Vec<ValueBranch>> {
        let key = self.key(
            path,
            text,
            Probe::Branches {
                facet: spec.node_name.clone(),
            },
        );
        let query = self.query(path, text);
        let snapshot = self.snapshot;
        let root = self.root;
        let scope = root.navigation().scope();
        let buckets = self.buckets;
        let answer = self.cache.get_or_compute(key, || {
            let counter = BranchCounter {
                snapshot,
                scope,
                query: &query,
                buckets,
            };
            Ok(CachedAnswer::Branches(counter.branches(spec)?))
        })?;
        match answer {
            CachedAnswer::Branches(branches) => Ok(branches),
            other => Err(unexpected(&other)),
        }
    }
}

/// Counts the value branches of one facet at one position.
struct BranchCounter<'a> {
    snapshot: &'a dyn IndexSnapshot,
    scope: &'a NavigationScope,
    query: &'a Constraint,
    buckets: BucketContext,
}

impl BranchCounter<'_> {
    fn branches(&self, spec: &FacetSpec) -> Result<Vec<ValueBranch>> {
        match &spec.kind {
            FacetKind::Discrete => {
                let counts = self
                    .snapshot
                    .value_counts(self.scope, self.query, &spec.property)?;
                let mut merged = BTreeMap::<String, u64>::new();
                for (value, count) in counts.values {
                    *merged.entry(value.display()).or_insert(0) += count;
                }
                Ok(merged
                    .into_iter()
                    .map(|(name, count)| ValueBranch::new(name, count))
                    .collect())
            }
            FacetKind::DateResolution(part) => {
                let counts = self
                    .snapshot
                    .value_counts(self.scope, self.query, &spec.property)?;
                let components = counts
                    .values
                    .keys()
                    .filter_map(|value| date_part(value, *part, self.buckets.time_zone))
                    .collect::<BTreeSet<_>>();
                let mut out = Vec::with_capacity(components.len());
                for component in components {
                    let narrowed = self.query.clone().and(Constraint::DatePart {
                        property: spec.property.clone(),
                        part: *part,
                        value: component,
                        offset: self.buckets.time_zone,
                    });
                    let count = self.snapshot.count(self.scope, &narrowed)?;
                    if count > 0 {
                        out.push(ValueBranch::new(component.to_string(), count));
                    }
                }
                Ok(out)
            }
            FacetKind::RangeList(ranges) => {
                let mut out = Vec::with_capacity(ranges.len());
                for (index, range) in ranges.iter().enumerate() {
                    let narrowed = self.query.clone().and(Constraint::Range {
                        property: spec.property.clone(),
                        range: ResolvedRange::resolve(range, &self.buckets),
                    });
                    let count = self.snapshot.count(self.scope, &narrowed)?;
                    if count > 0 {
                        out.push(ValueBranch {
                            name: range.name.clone(),
                            count,
                            config_index: Some(index),
                        });
                    }
                }
                Ok(out)
            }
        }
    }
}

fn node(
    name: &str,
    kind: NodeKind,
    count: u64,
    children: Vec<VirtualChild>,
    generation: IndexGeneration,
) -> VirtualNode {
    VirtualNode {
        name: name.to_string(),
        kind,
        count,
        children,
        result_documents: Vec::new(),
        generation,
        degraded: false,
    }
}

fn unexpected(answer: &CachedAnswer) -> NavError {
    NavError::Internal(format!("cache returned mismatched answer: {answer:?}"))
}
