//! Keyed read cache for registry reads.
//!
//! Reads are cached under a [`CacheKey`] and dropped by the gateway through
//! [`ReadCache::invalidate`] after each successful mutation. The default
//! implementation, [`SieveReadCache`], bounds memory with SIEVE eviction and
//! is shared process-wide through `Arc`, so an invalidation made by one
//! session is observed by every other session's next read.
//!
//! # Epochs
//!
//! Every invalidation bumps a cache-wide epoch. A reader captures the epoch
//! before it fetches and hands it back on insert; if any invalidation ran in
//! between, the insert is dropped. A fetch that started before a mutation can
//! therefore never repopulate the cache with pre-mutation data.
//!
//! # SIEVE
//!
//! - On access (hit): set the entry's `visited` bit.
//! - On insert (miss + full): scan from the `hand` position. A visited entry
//!   has its bit cleared and the hand advances; the first unvisited entry is
//!   evicted and replaced.

use std::collections::HashMap;
use std::fmt::{self, Display};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use warden_abac::{PolicyId, PolicySetId, StoredPolicy, StoredPolicySet};

use crate::gateway::{ListFilter, Scope};

// ============================================================================
// Cache keys
// ============================================================================

/// Identifies one cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// `policy-sets`, optionally narrowed by a filter.
    PolicySets { scope: Scope, filter: ListFilter },
    /// `policy-sets/{id}`
    PolicySet { scope: Scope, id: PolicySetId },
    /// `policy-set/{id}/policy/{id}`
    Policy {
        scope: Scope,
        policy_set_id: PolicySetId,
        policy_id: PolicyId,
    },
}

impl CacheKey {
    /// The unfiltered list key. Invalidating it drops every filtered list of
    /// the same scope as well.
    pub fn policy_sets(scope: Scope) -> Self {
        Self::PolicySets {
            scope,
            filter: ListFilter::default(),
        }
    }

    pub fn policy_set(scope: Scope, id: &PolicySetId) -> Self {
        Self::PolicySet {
            scope,
            id: id.clone(),
        }
    }

    pub fn policy(scope: Scope, policy_set_id: &PolicySetId, policy_id: &PolicyId) -> Self {
        Self::Policy {
            scope,
            policy_set_id: policy_set_id.clone(),
            policy_id: policy_id.clone(),
        }
    }

    pub fn scope(&self) -> Scope {
        match self {
            Self::PolicySets { scope, .. }
            | Self::PolicySet { scope, .. }
            | Self::Policy { scope, .. } => *scope,
        }
    }

    /// Returns true if invalidating `self` must also drop `other`.
    pub fn covers(&self, other: &CacheKey) -> bool {
        match (self, other) {
            (
                Self::PolicySets {
                    scope: a,
                    filter: fa,
                },
                Self::PolicySets { scope: b, .. },
            ) if fa.is_empty() => a == b,
            _ => self == other,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicySets { scope, filter } => {
                write!(f, "{scope}/policy-sets")?;
                if !filter.is_empty() {
                    let query: Vec<String> = filter
                        .query()
                        .into_iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect();
                    write!(f, "?{}", query.join("&"))?;
                }
                Ok(())
            }
            Self::PolicySet { scope, id } => write!(f, "{scope}/policy-sets/{id}"),
            Self::Policy {
                scope,
                policy_set_id,
                policy_id,
            } => write!(f, "{scope}/policy-set/{policy_set_id}/policy/{policy_id}"),
        }
    }
}

/// A cached read result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedRead {
    PolicySets(Vec<StoredPolicySet>),
    PolicySet(StoredPolicySet),
    Policy(StoredPolicy),
}

// ============================================================================
// ReadCache
// ============================================================================

/// The caching collaborator used by the gateway.
pub trait ReadCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<CachedRead>;

    /// The current invalidation epoch.
    fn epoch(&self) -> u64;

    /// Stores `value` if no invalidation happened since `epoch` was read.
    /// Returns whether the value was stored.
    fn insert(&self, key: CacheKey, value: CachedRead, epoch: u64) -> bool;

    /// Drops `key` and every key it covers, and advances the epoch. Returns
    /// the number of entries removed.
    fn invalidate(&self, key: &CacheKey) -> usize;
}

impl<C: ReadCache> ReadCache for Arc<C> {
    fn get(&self, key: &CacheKey) -> Option<CachedRead> {
        (**self).get(key)
    }

    fn epoch(&self) -> u64 {
        (**self).epoch()
    }

    fn insert(&self, key: CacheKey, value: CachedRead, epoch: u64) -> bool {
        (**self).insert(key, value, epoch)
    }

    fn invalidate(&self, key: &CacheKey) -> usize {
        (**self).invalidate(key)
    }
}

/// Bounded [`ReadCache`] with SIEVE eviction.
#[derive(Debug)]
pub struct SieveReadCache {
    inner: Mutex<Guarded>,
}

/// Entries and epoch move together under one lock.
#[derive(Debug)]
struct Guarded {
    entries: SieveCache<CacheKey, CachedRead>,
    epoch: u64,
}

impl SieveReadCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Guarded {
                entries: SieveCache::new(capacity.get()),
                epoch: 0,
            }),
        }
    }

    /// Creates a cache ready to be shared between gateways.
    pub fn shared(capacity: NonZeroUsize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A poisoned lock only means another reader panicked mid-access; the
    // entries themselves are whole values.
    fn lock(&self) -> std::sync::MutexGuard<'_, Guarded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ReadCache for SieveReadCache {
    fn get(&self, key: &CacheKey) -> Option<CachedRead> {
        self.lock().entries.get(key).cloned()
    }

    fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    fn insert(&self, key: CacheKey, value: CachedRead, epoch: u64) -> bool {
        let mut guarded = self.lock();
        if guarded.epoch != epoch {
            return false;
        }
        guarded.entries.insert(key, value);
        true
    }

    fn invalidate(&self, key: &CacheKey) -> usize {
        let mut guarded = self.lock();
        guarded.epoch += 1;
        guarded.entries.remove_where(|k| key.covers(k))
    }
}

// ============================================================================
// SieveCache
// ============================================================================

/// A bounded cache using the SIEVE eviction algorithm.
///
/// Slots form a circular buffer; a `HashMap` maps keys to slot indices.
#[derive(Debug)]
pub(crate) struct SieveCache<K, V> {
    entries: Vec<Option<Entry<K, V>>>,
    index: HashMap<K, usize>,
    hand: usize,
    capacity: usize,
    len: usize,
}

#[derive(Debug, Clone)]
struct Entry<K, V> {
    key: K,
    value: V,
    visited: bool,
}

impl<K, V> SieveCache<K, V>
where
    K: Eq + Hash + Clone,
{
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub(crate) fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SIEVE cache capacity must be > 0");

        Self {
            entries: (0..capacity).map(|_| None).collect(),
            index: HashMap::with_capacity(capacity),
            hand: 0,
            capacity,
            len: 0,
        }
    }

    /// Returns the value for `key`, marking it as recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let &idx = self.index.get(key)?;
        let entry = self.entries[idx].as_mut()?;
        entry.visited = true;
        Some(&entry.value)
    }

    /// Inserts a key-value pair, evicting if at capacity.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        if let Some(&idx) = self.index.get(&key) {
            if let Some(entry) = &mut self.entries[idx] {
                entry.value = value;
                entry.visited = true;
                return;
            }
        }

        let slot = if self.len < self.capacity {
            // Invalidation leaves holes anywhere in the buffer.
            self.entries.iter().position(Option::is_none)
        } else {
            None
        };

        let idx = match slot {
            Some(idx) => {
                self.len += 1;
                idx
            }
            None => {
                let idx = self.find_eviction_target();
                if let Some(old) = &self.entries[idx] {
                    self.index.remove(&old.key);
                } else {
                    self.len += 1;
                }
                idx
            }
        };

        self.entries[idx] = Some(Entry {
            key: key.clone(),
            value,
            visited: false,
        });
        self.index.insert(key, idx);
    }

    #[cfg(test)]
    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let idx = self.index.remove(key)?;
        let entry = self.entries[idx].take()?;
        self.len -= 1;
        Some(entry.value)
    }

    /// Removes every entry whose key satisfies `predicate`.
    pub(crate) fn remove_where(&mut self, mut predicate: impl FnMut(&K) -> bool) -> usize {
        let mut removed = 0;
        for slot in &mut self.entries {
            if slot.as_ref().is_some_and(|e| predicate(&e.key)) {
                if let Some(entry) = slot.take() {
                    self.index.remove(&entry.key);
                    removed += 1;
                }
            }
        }
        self.len -= removed;
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Scans from `hand` for an entry with `visited == false`, clearing
    /// visited bits along the way. Bounded to two full passes.
    fn find_eviction_target(&mut self) -> usize {
        let max_iterations = self.capacity * 2;

        for _ in 0..max_iterations {
            let current = self.hand;
            self.hand = (self.hand + 1) % self.capacity;

            match &mut self.entries[current] {
                Some(entry) if entry.visited => entry.visited = false,
                _ => return current,
            }
        }

        let target = self.hand;
        self.hand = (self.hand + 1) % self.capacity;
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_key(id: &str) -> CacheKey {
        CacheKey::policy_set(Scope::Member, &PolicySetId::new(id))
    }

    fn empty_set(id: &str) -> CachedRead {
        CachedRead::PolicySet(StoredPolicySet {
            id: PolicySetId::new(id),
            policy_issuer: "did:issuer".into(),
            access_subject: "did:subject".into(),
            policies: Vec::new(),
        })
    }

    #[test]
    fn basic_insert_and_get() {
        let mut cache = SieveCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn eviction_prefers_unvisited() {
        let mut cache = SieveCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        cache.get(&"a");
        cache.get(&"c");

        cache.insert("d", 4);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.get(&"d"), Some(&4));
    }

    #[test]
    fn remove_entry() {
        let mut cache = SieveCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);

        assert_eq!(cache.remove(&"a"), Some(1));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn holes_left_by_removal_are_reused() {
        let mut cache = SieveCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.remove(&"a");

        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn remove_where_counts_and_frees_slots() {
        let mut cache = SieveCache::new(4);
        cache.insert("a1", 1);
        cache.insert("a2", 2);
        cache.insert("b1", 3);

        assert_eq!(cache.remove_where(|k| k.starts_with('a')), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a1"), None);
        assert_eq!(cache.get(&"b1"), Some(&3));
    }

    #[test]
    #[should_panic(expected = "capacity must be > 0")]
    fn zero_capacity_panics() {
        let _cache: SieveCache<&str, i32> = SieveCache::new(0);
    }

    #[test]
    fn list_key_covers_filtered_lists_of_its_scope() {
        let list = CacheKey::policy_sets(Scope::Member);
        let filtered = CacheKey::PolicySets {
            scope: Scope::Member,
            filter: ListFilter {
                access_subject: Some("did:subject".into()),
                policy_issuer: None,
            },
        };
        let admin_list = CacheKey::policy_sets(Scope::Admin);

        assert!(list.covers(&filtered));
        assert!(!filtered.covers(&list));
        assert!(!list.covers(&admin_list));
        assert!(!list.covers(&set_key("a")));
    }

    #[test]
    fn key_display_mirrors_endpoint_shape() {
        let policy = CacheKey::policy(Scope::Admin, &PolicySetId::new("s"), &PolicyId::new("p"));
        assert_eq!(policy.to_string(), "admin/policy-set/s/policy/p");
        assert_eq!(set_key("s").to_string(), "member/policy-sets/s");
    }

    #[test]
    fn shared_cache_sees_invalidation_from_any_handle() {
        let cache = SieveReadCache::shared(NonZeroUsize::new(8).unwrap());
        let other = Arc::clone(&cache);

        assert!(cache.insert(set_key("a"), empty_set("a"), cache.epoch()));
        assert_eq!(other.get(&set_key("a")), Some(empty_set("a")));

        assert_eq!(other.invalidate(&set_key("a")), 1);
        assert!(cache.get(&set_key("a")).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_after_invalidation_is_dropped() {
        let cache = SieveReadCache::new(NonZeroUsize::new(8).unwrap());
        let observed = cache.epoch();

        // Nothing cached yet; the epoch still moves.
        assert_eq!(cache.invalidate(&CacheKey::policy_sets(Scope::Member)), 0);

        assert!(!cache.insert(set_key("a"), empty_set("a"), observed));
        assert!(cache.is_empty());

        assert!(cache.insert(set_key("a"), empty_set("a"), cache.epoch()));
        assert_eq!(cache.len(), 1);
    }
}
