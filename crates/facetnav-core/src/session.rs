use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::bucket::BucketContext;
use crate::cache::{CacheStats, NavigationCache};
use crate::config::{Clock, EngineConfig};
use crate::error::Result;
use crate::models::{IndexGeneration, VirtualNode};
use crate::navigation::builder::Resolver;
use crate::navigation::{NavigationRoot, PathSegment, ResolveOptions, parse_path};
use crate::oracle::{CountOracle, IndexSnapshot};

/// Read-consistent navigation view.
///
/// A session pins one oracle snapshot and one clock reading. Every resolve answers from that
/// pin, whatever other sessions commit meanwhile, until [`NavigationSession::refresh`].
/// The memo table belongs to the session alone.
pub struct NavigationSession {
    session_id: String,
    oracle: Arc<dyn CountOracle>,
    snapshot: Arc<dyn IndexSnapshot>,
    clock: Clock,
    now: DateTime<Utc>,
    time_zone: FixedOffset,
    default_result_limit: usize,
    cache: NavigationCache,
}

impl std::fmt::Debug for NavigationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationSession")
            .field("session_id", &self.session_id)
            .field("generation", &self.snapshot.generation())
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

impl NavigationSession {
    pub fn open(oracle: Arc<dyn CountOracle>, config: &EngineConfig, clock: Clock) -> Result<Self> {
        let snapshot = oracle.snapshot()?;
        let session = Self {
            session_id: Uuid::new_v4().to_string(),
            oracle,
            snapshot,
            clock,
            now: clock.now(),
            time_zone: config.time_zone,
            default_result_limit: config.default_result_limit,
            cache: NavigationCache::new(config.session_cache_capacity),
        };
        debug!(
            session_id = %session.session_id,
            generation = %session.generation(),
            "navigation session opened"
        );
        Ok(session)
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn generation(&self) -> IndexGeneration {
        self.snapshot.generation()
    }

    /// Clock reading relative date ranges are evaluated against.
    #[must_use]
    pub const fn now(&self) -> DateTime<Utc> {
        self.now
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn resolve(
        &mut self,
        root: &NavigationRoot,
        segments: &[PathSegment],
    ) -> Result<VirtualNode> {
        self.resolve_with(root, segments, ResolveOptions::default())
    }

    pub fn resolve_with(
        &mut self,
        root: &NavigationRoot,
        segments: &[PathSegment],
        options: ResolveOptions,
    ) -> Result<VirtualNode> {
        let mut resolver = Resolver {
            root,
            snapshot: self.snapshot.as_ref(),
            buckets: BucketContext::new(self.now, self.time_zone),
            cache: &mut self.cache,
            default_result_limit: self.default_result_limit,
        };
        resolver.resolve(segments, options)
    }

    /// Parses `path` (`brand/peugeot/[{red}]/resultset`) and resolves it.
    pub fn resolve_path(&mut self, root: &NavigationRoot, path: &str) -> Result<VirtualNode> {
        let segments = parse_path(path)?;
        self.resolve(root, &segments)
    }

    /// Discards virtual state and pins the latest committed snapshot and a new clock reading.
    pub fn refresh(&mut self) -> Result<IndexGeneration> {
        let snapshot = self.oracle.snapshot()?;
        let previous = self.snapshot.generation();
        self.snapshot = snapshot;
        self.now = self.clock.now();
        self.cache.clear();
        debug!(
            session_id = %self.session_id,
            %previous,
            current = %self.snapshot.generation(),
            "navigation session refreshed"
        );
        Ok(self.snapshot.generation())
    }
}
