//! Memoization of rankings.
//!
//! Rankings are recomputed for every filter combination, so callers that
//! serve many filters over the same dataset can keep results in a
//! [`RankingCache`]. The cache is an explicit collaborator: pass
//! [`NoCache`] to disable it, or inspect [`InMemoryRankingCache::stats`] in
//! tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use junction_danger_analytics_models::{DangerousJunctions, RankingFilter, SeverityWeights};
use junction_danger_collision_models::MatchedCollision;
use junction_danger_network_models::JunctionTable;
use serde::Serialize;

use crate::{AnalyticsError, dangerous_junctions};

/// Identity of a ranking: the dataset it was computed from plus every
/// parameter that changes the result.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankingKey(String);

#[derive(Serialize)]
struct KeyParts<'a> {
    dataset: &'a str,
    filter: &'a RankingFilter,
    weights: &'a SeverityWeights,
    n: usize,
}

impl RankingKey {
    /// Builds a key from a dataset fingerprint and the ranking parameters.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Json`] if the parameters cannot be
    /// serialized.
    pub fn new(
        dataset_fingerprint: &str,
        filter: &RankingFilter,
        weights: &SeverityWeights,
        n: usize,
    ) -> Result<Self, AnalyticsError> {
        Ok(Self(serde_json::to_string(&KeyParts {
            dataset: dataset_fingerprint,
            filter,
            weights,
            n,
        })?))
    }

    /// The key as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A store of computed rankings.
pub trait RankingCache: Send + Sync {
    /// Returns the cached ranking for `key`, if present and fresh.
    fn get(&self, key: &RankingKey) -> Option<Arc<DangerousJunctions>>;

    /// Stores a ranking under `key`.
    fn insert(&self, key: RankingKey, ranking: Arc<DangerousJunctions>);

    /// Drops the entry for `key`.
    fn invalidate(&self, key: &RankingKey);

    /// Drops every entry.
    fn clear(&self);
}

/// A cache that never stores anything.
pub struct NoCache;

impl RankingCache for NoCache {
    fn get(&self, _key: &RankingKey) -> Option<Arc<DangerousJunctions>> {
        None
    }
    fn insert(&self, _key: RankingKey, _ranking: Arc<DangerousJunctions>) {}
    fn invalidate(&self, _key: &RankingKey) {}
    fn clear(&self) {}
}

/// Hit and miss counters of an [`InMemoryRankingCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing fresh.
    pub misses: u64,
    /// Entries currently held (including expired ones not yet evicted).
    pub entries: usize,
}

type Entries = BTreeMap<RankingKey, (Instant, Arc<DangerousJunctions>)>;

/// Process-local cache with an optional time-to-live.
pub struct InMemoryRankingCache {
    ttl: Option<Duration>,
    entries: Mutex<Entries>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryRankingCache {
    /// A cache whose entries never expire.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: None,
            entries: Mutex::new(BTreeMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache whose entries expire `ttl` after insertion.
    #[must_use]
    pub const fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            entries: Mutex::new(BTreeMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.lock().len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn is_fresh(&self, inserted: Instant) -> bool {
        self.ttl.is_none_or(|ttl| inserted.elapsed() < ttl)
    }
}

impl Default for InMemoryRankingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RankingCache for InMemoryRankingCache {
    fn get(&self, key: &RankingKey) -> Option<Arc<DangerousJunctions>> {
        let mut entries = self.lock();
        let found = match entries.get(key) {
            Some((inserted, ranking)) if self.is_fresh(*inserted) => Some(Arc::clone(ranking)),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        };
        drop(entries);

        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn insert(&self, key: RankingKey, ranking: Arc<DangerousJunctions>) {
        self.lock().insert(key, (Instant::now(), ranking));
    }

    fn invalidate(&self, key: &RankingKey) {
        self.lock().remove(key);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

/// [`dangerous_junctions`] memoized through `cache`.
///
/// `dataset_fingerprint` must change whenever `matched` or `junctions`
/// change; the cache cannot detect stale inputs on its own.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the key cannot be built or ranking fails.
pub fn cached_dangerous_junctions(
    cache: &dyn RankingCache,
    dataset_fingerprint: &str,
    matched: &[MatchedCollision],
    junctions: &JunctionTable,
    filter: &RankingFilter,
    weights: &SeverityWeights,
    n: usize,
) -> Result<Arc<DangerousJunctions>, AnalyticsError> {
    let key = RankingKey::new(dataset_fingerprint, filter, weights, n)?;
    if let Some(ranking) = cache.get(&key) {
        log::debug!("Ranking cache hit for {}", key.as_str());
        return Ok(ranking);
    }

    let ranking = Arc::new(dangerous_junctions(matched, junctions, filter, weights, n)?);
    cache.insert(key, Arc::clone(&ranking));
    Ok(ranking)
}

#[cfg(test)]
mod tests {
    use junction_danger_collision_models::CasualtyType;

    use super::*;
    use crate::score::tests::{counts, junctions, matched};

    fn inputs() -> Vec<MatchedCollision> {
        vec![
            matched("a", 2020, 0, CasualtyType::Cyclist, counts(1, 0, 0)),
            matched("b", 2021, 2, CasualtyType::Cyclist, counts(0, 0, 1)),
        ]
    }

    #[test]
    fn second_lookup_is_a_hit() {
        let cache = InMemoryRankingCache::new();
        let filter = RankingFilter::new(CasualtyType::Cyclist);
        let weights = SeverityWeights::default();

        let first = cached_dangerous_junctions(
            &cache, "v1", &inputs(), &junctions(), &filter, &weights, 10,
        )
        .unwrap();
        let second = cached_dangerous_junctions(
            &cache, "v1", &inputs(), &junctions(), &filter, &weights, 10,
        )
        .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1,
            }
        );
    }

    #[test]
    fn different_filters_and_datasets_do_not_share_entries() {
        let weights = SeverityWeights::default();
        let cyclist = RankingFilter::new(CasualtyType::Cyclist);
        let pedestrian = RankingFilter::new(CasualtyType::Pedestrian);

        let a = RankingKey::new("v1", &cyclist, &weights, 10).unwrap();
        let b = RankingKey::new("v1", &pedestrian, &weights, 10).unwrap();
        let c = RankingKey::new("v2", &cyclist, &weights, 10).unwrap();
        let d = RankingKey::new("v1", &cyclist, &weights, 5).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert_eq!(a, RankingKey::new("v1", &cyclist, &weights, 10).unwrap());
    }

    #[test]
    fn invalidate_and_clear_drop_entries() {
        let cache = InMemoryRankingCache::new();
        let weights = SeverityWeights::default();
        let key = RankingKey::new("v1", &RankingFilter::new(CasualtyType::Cyclist), &weights, 10)
            .unwrap();
        let other = RankingKey::new(
            "v1",
            &RankingFilter::new(CasualtyType::Pedestrian),
            &weights,
            10,
        )
        .unwrap();

        cache.insert(key.clone(), Arc::new(DangerousJunctions::default()));
        cache.insert(other.clone(), Arc::new(DangerousJunctions::default()));
        cache.invalidate(&key);
        assert!(cache.get(&key).is_none());
        assert!(cache.get(&other).is_some());

        cache.clear();
        assert!(cache.get(&other).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = InMemoryRankingCache::with_ttl(Duration::ZERO);
        let key = RankingKey::new(
            "v1",
            &RankingFilter::new(CasualtyType::Cyclist),
            &SeverityWeights::default(),
            10,
        )
        .unwrap();

        cache.insert(key.clone(), Arc::new(DangerousJunctions::default()));
        assert!(cache.get(&key).is_none());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn no_cache_always_recomputes() {
        let filter = RankingFilter::new(CasualtyType::Cyclist);
        let weights = SeverityWeights::default();

        let first =
            cached_dangerous_junctions(&NoCache, "v1", &inputs(), &junctions(), &filter, &weights, 10)
                .unwrap();
        let second =
            cached_dangerous_junctions(&NoCache, "v1", &inputs(), &junctions(), &filter, &weights, 10)
                .unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first, second);
    }
}
