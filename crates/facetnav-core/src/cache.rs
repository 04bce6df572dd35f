//! Session-owned memo table for oracle answers.
//!
//! Keys carry the index generation, so entries computed against an older snapshot can never
//! answer for a newer one. The session clears the table when it refreshes.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::models::{DocumentRef, IndexGeneration};
use crate::rules::ValueBranch;

/// What was asked of the oracle at one position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Probe {
    Count,
    /// Unordered value branches of one facet.
    Branches { facet: String },
    Results { offset: usize, limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Navigation definition fingerprint.
    pub navigation: String,
    pub scope: String,
    pub path: String,
    pub inherited_filter: String,
    pub free_text: String,
    pub generation: IndexGeneration,
    pub probe: Probe,
}

impl CacheKey {
    /// Stable hash of filter text used for the key's filter components.
    #[must_use]
    pub fn digest(text: &str) -> String {
        blake3::hash(text.as_bytes()).to_hex().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedAnswer {
    Count(u64),
    Branches(Vec<ValueBranch>),
    Documents(Vec<DocumentRef>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
pub struct NavigationCache {
    entries: LruCache<CacheKey, CachedAnswer>,
    generation: Option<IndexGeneration>,
    hits: u64,
    misses: u64,
}

impl NavigationCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            generation: None,
            hits: 0,
            misses: 0,
        }
    }

    /// Read-through lookup; `compute` runs only on a miss and its error is not cached.
    pub fn get_or_compute(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<CachedAnswer>,
    ) -> Result<CachedAnswer> {
        self.observe(key.generation);
        if let Some(answer) = self.entries.get(&key) {
            self.hits += 1;
            debug!(probe = ?key.probe, path = %key.path, "navigation cache hit");
            return Ok(answer.clone());
        }
        self.misses += 1;
        debug!(probe = ?key.probe, path = %key.path, "navigation cache miss");
        let answer = compute()?;
        self.entries.put(key, answer.clone());
        Ok(answer)
    }

    /// Drops every entry once a newer generation shows up.
    fn observe(&mut self, generation: IndexGeneration) {
        if self.generation.is_some_and(|current| current != generation) {
            self.entries.clear();
        }
        self.generation = Some(generation);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.generation = None;
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(generation: u64, path: &str) -> CacheKey {
        CacheKey {
            navigation: "cars".to_string(),
            scope: "/content".to_string(),
            path: path.to_string(),
            inherited_filter: CacheKey::digest(""),
            free_text: CacheKey::digest(""),
            generation: IndexGeneration(generation),
            probe: Probe::Count,
        }
    }

    #[test]
    fn read_through_computes_once_per_key() {
        let mut cache = NavigationCache::new(8);
        let mut calls = 0;
        for _ in 0..3 {
            let answer = cache
                .get_or_compute(key(1, "/a"), || {
                    calls += 1;
                    Ok(CachedAnswer::Count(7))
                })
                .expect("answer");
            assert_eq!(answer, CachedAnswer::Count(7));
        }
        assert_eq!(calls, 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn new_generation_evicts_older_entries() {
        let mut cache = NavigationCache::new(8);
        cache
            .get_or_compute(key(1, "/a"), || Ok(CachedAnswer::Count(1)))
            .expect("answer");
        cache
            .get_or_compute(key(1, "/b"), || Ok(CachedAnswer::Count(2)))
            .expect("answer");
        assert_eq!(cache.stats().entries, 2);

        let fresh = cache
            .get_or_compute(key(2, "/a"), || Ok(CachedAnswer::Count(5)))
            .expect("answer");
        assert_eq!(fresh, CachedAnswer::Count(5));
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn errors_are_not_cached_and_capacity_is_bounded() {
        let mut cache = NavigationCache::new(0);
        let err = cache
            .get_or_compute(key(1, "/a"), || {
                Err(crate::error::NavError::Unavailable("offline".to_string()))
            })
            .expect_err("error");
        assert_eq!(err.code(), "UNAVAILABLE");
        assert_eq!(cache.stats().entries, 0);

        cache
            .get_or_compute(key(1, "/a"), || Ok(CachedAnswer::Count(1)))
            .expect("answer");
        cache
            .get_or_compute(key(1, "/b"), || Ok(CachedAnswer::Count(2)))
            .expect("answer");
        assert_eq!(cache.stats().entries, 1);
    }
}
