use std::path::Path;
use std::sync::Arc;

use crate::config::{Clock, EngineConfig};
use crate::error::Result;
use crate::oracle::CountOracle;
use crate::registry::NavigationRegistry;
use crate::request_log::RequestLog;
use crate::session::NavigationSession;
use crate::state::SqliteStateStore;

mod definition_service;
mod navigation_service;

/// Entry point wiring the oracle, the definition registry, persistence and the request log.
#[derive(Clone)]
pub struct FacetNav {
    oracle: Arc<dyn CountOracle>,
    registry: Arc<NavigationRegistry>,
    state: Option<SqliteStateStore>,
    config: EngineConfig,
    clock: Clock,
    request_log: Arc<RequestLog>,
}

impl std::fmt::Debug for FacetNav {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacetNav")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl FacetNav {
    /// Engine without persistence; definitions come from [`FacetNav::load_definitions`].
    #[must_use]
    pub fn new(oracle: Arc<dyn CountOracle>, config: EngineConfig) -> Self {
        let request_log = Arc::new(RequestLog::new(config.request_log_path.clone()));
        Self {
            oracle,
            registry: Arc::new(NavigationRegistry::new()),
            state: None,
            config,
            clock: Clock::System,
            request_log,
        }
    }

    /// Engine configured from `FACETNAV_*` environment variables.
    pub fn from_env(oracle: Arc<dyn CountOracle>) -> Result<Self> {
        Ok(Self::new(oracle, EngineConfig::from_env()?))
    }

    /// Engine backed by a SQLite definition store; stored definitions are loaded immediately.
    pub fn open(
        oracle: Arc<dyn CountOracle>,
        config: EngineConfig,
        state_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let state = SqliteStateStore::open(state_path)?;
        let mut app = Self::new(oracle, config);
        app.registry.reload_from_state(&state)?;
        app.state = Some(state);
        Ok(app)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &NavigationRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn state(&self) -> Option<&SqliteStateStore> {
        self.state.as_ref()
    }

    #[must_use]
    pub fn request_log(&self) -> &RequestLog {
        &self.request_log
    }

    /// Opens a session pinned to the latest committed snapshot.
    pub fn session(&self) -> Result<NavigationSession> {
        NavigationSession::open(Arc::clone(&self.oracle), &self.config, self.clock)
    }
}

#[cfg(test)]
mod tests;
