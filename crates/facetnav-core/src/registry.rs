//! Process-wide navigation definitions.
//!
//! The registry holds one immutable [`RegistryState`] behind an `Arc`. A load builds a new
//! state from scratch and swaps it in whole, so readers see either the old set or the new one.
//! Definitions that fail to parse, mirrors whose chain is broken, and name clashes are left
//! out and reported through [`NavigationRegistry::rejected`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::{NavError, Result};
use crate::models::DefinitionKind;
use crate::navigation::{
    FacetNavigation, FacetNavigationDefinition, MirrorDefinition, MirrorLayer, NavigationRoot,
};
use crate::state::SqliteStateStore;

/// Definitions as read from TOML (`[[navigation]]` / `[[mirror]]`) or from the state store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionSet {
    #[serde(rename = "navigation", default)]
    pub navigations: Vec<FacetNavigationDefinition>,
    #[serde(rename = "mirror", default)]
    pub mirrors: Vec<MirrorDefinition>,
}

impl DefinitionSet {
    pub fn extend(&mut self, other: Self) {
        self.navigations.extend(other.navigations);
        self.mirrors.extend(other.mirrors);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.navigations.is_empty() && self.mirrors.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedDefinition {
    pub name: String,
    pub kind: DefinitionKind,
    pub code: String,
    pub reason: String,
}

impl RejectedDefinition {
    fn from_error(name: &str, kind: DefinitionKind, err: &NavError) -> Self {
        Self {
            name: name.to_string(),
            kind,
            code: err.code().to_string(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub revision: u64,
    pub navigations: usize,
    pub mirrors: usize,
    /// Navigations whose parsed form was carried over unchanged from the previous state.
    pub reused: usize,
    pub rejected: Vec<RejectedDefinition>,
}

#[derive(Debug, Default)]
struct RegistryState {
    revision: u64,
    store_revision: Option<i64>,
    navigations: BTreeMap<String, Arc<FacetNavigation>>,
    roots: BTreeMap<String, NavigationRoot>,
    rejected: Vec<RejectedDefinition>,
}

#[derive(Default)]
pub struct NavigationRegistry {
    state: RwLock<Arc<RegistryState>>,
}

impl std::fmt::Debug for NavigationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationRegistry").finish_non_exhaustive()
    }
}

impl NavigationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Result<Arc<RegistryState>> {
        let guard = self
            .state
            .read()
            .map_err(|_| NavError::lock_poisoned("registry"))?;
        Ok(Arc::clone(&guard))
    }

    /// Replaces every definition with `set`.
    pub fn load(&self, set: DefinitionSet) -> Result<LoadReport> {
        self.install(set, Vec::new(), None)
    }

    /// Loads the definitions persisted in `store`.
    ///
    /// Returns `None` when the store revision matches the one already loaded.
    pub fn reload_from_state(&self, store: &SqliteStateStore) -> Result<Option<LoadReport>> {
        let store_revision = store.definitions_revision()?;
        if self.current()?.store_revision == Some(store_revision) {
            return Ok(None);
        }

        let mut set = DefinitionSet::default();
        let mut undecodable = Vec::new();
        for stored in store.list_definitions()? {
            let decoded = match stored.kind {
                DefinitionKind::Navigation => {
                    serde_json::from_str::<FacetNavigationDefinition>(&stored.definition_json)
                        .map(|definition| set.navigations.push(definition))
                }
                DefinitionKind::Mirror => {
                    serde_json::from_str::<MirrorDefinition>(&stored.definition_json)
                        .map(|definition| set.mirrors.push(definition))
                }
            };
            if let Err(err) = decoded {
                undecodable.push(RejectedDefinition::from_error(
                    &stored.name,
                    stored.kind,
                    &NavError::Json(err),
                ));
            }
        }
        self.install(set, undecodable, Some(store_revision))
            .map(Some)
    }

    fn install(
        &self,
        set: DefinitionSet,
        mut rejected: Vec<RejectedDefinition>,
        store_revision: Option<i64>,
    ) -> Result<LoadReport> {
        let mut guard = self
            .state
            .write()
            .map_err(|_| NavError::lock_poisoned("registry"))?;
        let previous = Arc::clone(&guard);

        let (navigations, reused) = build_navigations(&set.navigations, &previous, &mut rejected);
        let mut roots = navigations
            .iter()
            .map(|(name, navigation)| (name.clone(), NavigationRoot::new(Arc::clone(navigation))))
            .collect::<BTreeMap<_, _>>();
        let declared_navigations = set
            .navigations
            .iter()
            .map(|definition| definition.name.trim().to_string())
            .collect::<BTreeSet<_>>();
        let mirror_roots = build_mirrors(
            &set.mirrors,
            &declared_navigations,
            &navigations,
            &mut rejected,
        );
        let mirror_count = mirror_roots.len();
        roots.extend(mirror_roots);

        for rejection in &rejected {
            warn!(
                name = %rejection.name,
                kind = rejection.kind.as_str(),
                code = %rejection.code,
                reason = %rejection.reason,
                "navigation definition rejected"
            );
        }

        let next = RegistryState {
            revision: previous.revision + 1,
            store_revision,
            navigations,
            roots,
            rejected,
        };
        let report = LoadReport {
            revision: next.revision,
            navigations: next.navigations.len(),
            mirrors: mirror_count,
            reused,
            rejected: next.rejected.clone(),
        };
        *guard = Arc::new(next);
        drop(guard);

        info!(
            revision = report.revision,
            navigations = report.navigations,
            mirrors = report.mirrors,
            rejected = report.rejected.len(),
            "navigation registry loaded"
        );
        Ok(report)
    }

    pub fn navigation(&self, name: &str) -> Result<Option<Arc<FacetNavigation>>> {
        Ok(self.current()?.navigations.get(name).cloned())
    }

    /// Root for a navigation or mirror name, mirror chains flattened outermost first.
    pub fn root(&self, name: &str) -> Result<NavigationRoot> {
        self.current()?
            .roots
            .get(name)
            .cloned()
            .ok_or_else(|| NavError::NotFound(format!("navigation `{name}`")))
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.current()?.roots.keys().cloned().collect())
    }

    pub fn rejected(&self) -> Result<Vec<RejectedDefinition>> {
        Ok(self.current()?.rejected.clone())
    }

    /// Summary of the installed state.
    pub fn report(&self) -> Result<LoadReport> {
        let state = self.current()?;
        Ok(LoadReport {
            revision: state.revision,
            navigations: state.navigations.len(),
            mirrors: state.roots.len() - state.navigations.len(),
            reused: 0,
            rejected: state.rejected.clone(),
        })
    }

    /// Advances on every load, including loads that change nothing.
    pub fn revision(&self) -> Result<u64> {
        Ok(self.current()?.revision)
    }
}

fn build_navigations(
    definitions: &[FacetNavigationDefinition],
    previous: &RegistryState,
    rejected: &mut Vec<RejectedDefinition>,
) -> (BTreeMap<String, Arc<FacetNavigation>>, usize) {
    let mut navigations = BTreeMap::new();
    let mut duplicates = BTreeSet::new();
    let mut reused = 0usize;

    for definition in definitions {
        let name = definition.name.trim();
        if navigations.contains_key(name) || duplicates.contains(name) {
            duplicates.insert(name.to_string());
            continue;
        }
        if let Some(existing) = previous.navigations.get(name)
            && existing.definition() == definition
        {
            navigations.insert(name.to_string(), Arc::clone(existing));
            reused += 1;
            continue;
        }
        match FacetNavigation::from_definition(definition.clone()) {
            Ok(navigation) => {
                navigations.insert(name.to_string(), Arc::new(navigation));
            }
            Err(err) => rejected.push(RejectedDefinition::from_error(
                &definition.name,
                DefinitionKind::Navigation,
                &err,
            )),
        }
    }

    for name in duplicates {
        navigations.remove(&name);
        rejected.push(RejectedDefinition::from_error(
            &name,
            DefinitionKind::Navigation,
            &NavError::Conflict(format!("navigation `{name}` is defined more than once")),
        ));
    }
    let reused = reused.min(navigations.len());
    (navigations, reused)
}

type MirrorOutcome = std::result::Result<NavigationRoot, RejectedDefinition>;

struct MirrorResolver<'a> {
    definitions: BTreeMap<&'a str, &'a MirrorDefinition>,
    navigations: &'a BTreeMap<String, Arc<FacetNavigation>>,
    declared_navigations: &'a BTreeSet<String>,
    resolved: BTreeMap<String, MirrorOutcome>,
    visiting: Vec<String>,
}

impl MirrorResolver<'_> {
    fn resolve(&mut self, name: &str) -> MirrorOutcome {
        if let Some(outcome) = self.resolved.get(name) {
            return outcome.clone();
        }
        if let Some(start) = self.visiting.iter().position(|visiting| visiting == name) {
            let mut cycle = self.visiting[start..].to_vec();
            cycle.push(name.to_string());
            return Err(rejection(
                name,
                &NavError::Conflict(format!("mirror cycle {}", cycle.join(" -> "))),
            ));
        }
        let Some(definition) = self.definitions.get(name).copied() else {
            return Err(rejection(
                name,
                &NavError::NotFound(format!("mirror `{name}`")),
            ));
        };

        self.visiting.push(name.to_string());
        let outcome = self.resolve_definition(definition);
        self.visiting.pop();
        self.resolved.insert(name.to_string(), outcome.clone());
        outcome
    }

    fn resolve_definition(&mut self, definition: &MirrorDefinition) -> MirrorOutcome {
        let name = definition.name.trim();
        let target = definition.target.trim();
        let target_root = if let Some(navigation) = self.navigations.get(target) {
            NavigationRoot::new(Arc::clone(navigation))
        } else if self.declared_navigations.contains(target) {
            return Err(rejection(
                name,
                &NavError::InvalidConfig(format!("target navigation `{target}` was rejected")),
            ));
        } else if self.definitions.contains_key(target) {
            match self.resolve(target) {
                Ok(root) => root,
                Err(inner) => {
                    let err = match inner.code.as_str() {
                        "CONFLICT" => NavError::Conflict(format!(
                            "target mirror `{target}` is part of a cycle"
                        )),
                        _ => NavError::InvalidConfig(format!(
                            "target mirror `{target}` was rejected"
                        )),
                    };
                    return Err(rejection(name, &err));
                }
            }
        } else {
            return Err(rejection(
                name,
                &NavError::NotFound(format!("mirror target `{target}`")),
            ));
        };

        MirrorLayer::from_definition(definition, target_root.navigation())
            .map(|layer| target_root.through(&layer))
            .map_err(|err| rejection(name, &err))
    }
}

fn rejection(name: &str, err: &NavError) -> RejectedDefinition {
    RejectedDefinition::from_error(name, DefinitionKind::Mirror, err)
}

fn build_mirrors(
    definitions: &[MirrorDefinition],
    declared_navigations: &BTreeSet<String>,
    navigations: &BTreeMap<String, Arc<FacetNavigation>>,
    rejected: &mut Vec<RejectedDefinition>,
) -> BTreeMap<String, NavigationRoot> {
    let mut unique = BTreeMap::new();
    let mut clashes = BTreeSet::new();
    for definition in definitions {
        let name = definition.name.trim();
        if name.is_empty() || name.contains('/') {
            rejected.push(rejection(
                &definition.name,
                &NavError::InvalidConfig(format!("invalid mirror name: `{}`", definition.name)),
            ));
        } else if declared_navigations.contains(name) {
            rejected.push(rejection(
                name,
                &NavError::Conflict(format!("mirror `{name}` shadows a navigation")),
            ));
        } else if unique.insert(name, definition).is_some() {
            clashes.insert(name);
        }
    }
    for name in &clashes {
        unique.remove(name);
        rejected.push(rejection(
            name,
            &NavError::Conflict(format!("mirror `{name}` is defined more than once")),
        ));
    }

    let mut resolver = MirrorResolver {
        definitions: unique,
        navigations,
        declared_navigations,
        resolved: BTreeMap::new(),
        visiting: Vec::new(),
    };
    let names = resolver.definitions.keys().copied().collect::<Vec<_>>();
    let mut roots = BTreeMap::new();
    for name in names {
        match resolver.resolve(name) {
            Ok(root) => {
                roots.insert(name.to_string(), root);
            }
            Err(rejected_mirror) => rejected.push(rejected_mirror),
        }
    }
    roots
}

/// Parses one TOML document of `[[navigation]]` and `[[mirror]]` tables.
///
/// Other tables, such as `[engine]`, are ignored.
pub fn parse_definition_toml(raw: &str) -> Result<DefinitionSet> {
    Ok(toml::from_str::<DefinitionSet>(raw)?)
}

/// Reads every `*.toml` file under `dir`, in path order.
pub fn load_definition_dir(dir: impl AsRef<Path>) -> Result<DefinitionSet> {
    let dir = dir.as_ref();
    let mut files = Vec::<PathBuf>::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry.map_err(|err| NavError::Validation(err.to_string()))?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut set = DefinitionSet::default();
    for file in files {
        let raw = std::fs::read_to_string(&file)?;
        let parsed = parse_definition_toml(&raw).map_err(|err| {
            NavError::InvalidConfig(format!("{}: {err}", file.display()))
        })?;
        set.extend(parsed);
    }
    Ok(set)
}
