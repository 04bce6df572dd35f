use std::path::Path;

use crate::error::{NavError, Result};
use crate::navigation::{FacetNavigationDefinition, MirrorDefinition};
use crate::registry::{DefinitionSet, LoadReport, load_definition_dir};
use crate::state::SqliteStateStore;

use super::FacetNav;

impl FacetNav {
    /// Installs `set` as the complete definition set.
    ///
    /// With a state store the definitions are upserted into it instead, and the registry is
    /// reloaded from everything the store holds.
    pub fn load_definitions(&self, set: DefinitionSet) -> Result<LoadReport> {
        let Some(state) = self.state.as_ref() else {
            return self.registry.load(set);
        };
        for navigation in &set.navigations {
            state.save_navigation(navigation)?;
        }
        for mirror in &set.mirrors {
            state.save_mirror(mirror)?;
        }
        self.reload_or_report(state)
    }

    /// Loads every `*.toml` definition file under `dir`.
    pub fn import_definitions(&self, dir: impl AsRef<Path>) -> Result<LoadReport> {
        let set = load_definition_dir(dir)?;
        self.load_definitions(set)
    }

    pub fn save_navigation(&self, definition: &FacetNavigationDefinition) -> Result<LoadReport> {
        let state = self.require_state()?;
        state.save_navigation(definition)?;
        self.reload_or_report(state)
    }

    pub fn save_mirror(&self, definition: &MirrorDefinition) -> Result<LoadReport> {
        let state = self.require_state()?;
        state.save_mirror(definition)?;
        self.reload_or_report(state)
    }

    pub fn delete_definition(&self, name: &str) -> Result<LoadReport> {
        let state = self.require_state()?;
        if !state.delete_definition(name)? {
            return Err(NavError::NotFound(format!("definition `{name}`")));
        }
        self.reload_or_report(state)
    }

    /// Picks up definitions written to the state store by other processes.
    pub fn reload(&self) -> Result<Option<LoadReport>> {
        match self.state.as_ref() {
            Some(state) => self.registry.reload_from_state(state),
            None => Ok(None),
        }
    }

    fn require_state(&self) -> Result<&SqliteStateStore> {
        self.state
            .as_ref()
            .ok_or_else(|| NavError::Validation("no state store configured".to_string()))
    }

    fn reload_or_report(&self, state: &SqliteStateStore) -> Result<LoadReport> {
        match self.registry.reload_from_state(state)? {
            Some(report) => Ok(report),
            None => self.registry.report(),
        }
    }
}
