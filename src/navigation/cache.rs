use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::node::RouteKey;
use super::sync::LiveNavigationEntry;

/// ViewHost
///
/// The tab/view layer hosting rendered views. `reload_active_view` resolves once the
/// hosting view has been rebuilt.
#[async_trait]
pub trait ViewHost: Send + Sync {
    /// Called once authorized routes are live, with the home route key.
    fn init_home_tab(&self, home: &RouteKey);

    async fn reload_active_view(&self);
}

#[derive(Debug, Default)]
struct CacheState {
    allowed: BTreeSet<RouteKey>,
    /// Allow-set as last computed from the live entries.
    baseline: BTreeSet<RouteKey>,
    /// Keys currently holding cached view state. Always a subset of `allowed`.
    active: BTreeSet<RouteKey>,
    /// Bumped on every recomputation.
    generation: u64,
}

/// CacheKeyTracker
///
/// Tracks which views may keep their state across navigations (the allow-set) and which
/// currently do (the active set).
///
/// All reads and writes of the sets happen under a short synchronous lock that is never held
/// across an await. Reloads are serialized through `reload_gate` since they share one page
/// context.
#[derive(Debug, Default)]
pub struct CacheKeyTracker {
    state: Mutex<CacheState>,
    reload_gate: tokio::sync::Mutex<()>,
}

impl CacheKeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// compute_allow_set
    ///
    /// Rebuilds the allow-set from the live entries: a key is allowed iff its entry is a
    /// leaf marked `keep_alive`. Active keys no longer allowed are dropped.
    pub fn compute_allow_set<'a, I>(&self, entries: I) -> BTreeSet<RouteKey>
    where
        I: IntoIterator<Item = &'a LiveNavigationEntry>,
    {
        let computed: BTreeSet<RouteKey> = entries
            .into_iter()
            .filter(|entry| entry.is_leaf() && entry.meta.keep_alive)
            .map(|entry| entry.key.clone())
            .collect();

        let mut state = self.state();
        state.generation += 1;
        state.baseline = computed.clone();
        state.allowed = computed.clone();
        let CacheState { active, allowed, .. } = &mut *state;
        active.retain(|key| allowed.contains(key));
        computed
    }

    pub fn is_allowed(&self, key: &RouteKey) -> bool {
        self.state().allowed.contains(key)
    }

    pub fn allowed_keys(&self) -> Vec<RouteKey> {
        self.state().allowed.iter().cloned().collect()
    }

    /// Idempotent insert into the allow-set.
    pub fn add(&self, key: &RouteKey) {
        self.state().allowed.insert(key.clone());
    }

    /// Idempotent removal from the allow-set. Drops any live cached state for the key.
    pub fn remove(&self, key: &RouteKey) {
        let mut state = self.state();
        state.allowed.remove(key);
        state.active.remove(key);
    }

    /// Marks `key` as holding cached state. Refused (returns false) when not allowed.
    pub fn activate(&self, key: &RouteKey) -> bool {
        let mut state = self.state();
        if !state.allowed.contains(key) {
            return false;
        }
        state.active.insert(key.clone());
        true
    }

    pub fn deactivate(&self, key: &RouteKey) {
        self.state().active.remove(key);
    }

    pub fn active_keys(&self) -> Vec<RouteKey> {
        self.state().active.iter().cloned().collect()
    }

    /// Forgets every key. Used on session reset.
    pub fn clear(&self) {
        let mut state = self.state();
        state.generation += 1;
        state.allowed.clear();
        state.baseline.clear();
        state.active.clear();
    }

    /// re_cache
    ///
    /// Forces the view of `key` to rebuild from scratch: the key is evicted, the hosting view
    /// reloaded, then the key re-added. Returns false without reloading when `key` is not
    /// allowed.
    ///
    /// Calls are serialized, so concurrent re-caches of the same key each reload once and the
    /// key ends up allowed. If the allow-set was recomputed during the reload, the key is only
    /// re-added when the new computation still allows it.
    pub async fn re_cache(&self, key: &RouteKey, host: &dyn ViewHost) -> bool {
        let _gate = self.reload_gate.lock().await;

        let generation = {
            let mut state = self.state();
            if !state.allowed.contains(key) {
                return false;
            }
            state.allowed.remove(key);
            state.active.remove(key);
            state.generation
        };

        host.reload_active_view().await;

        let mut state = self.state();
        if state.generation == generation || state.baseline.contains(key) {
            state.allowed.insert(key.clone());
        } else {
            tracing::debug!(%key, "route dropped from cache allow-set during reload");
        }
        true
    }

    /// re_cache_many
    ///
    /// Re-caches `keys` strictly in order. Each reload completes before the next key is
    /// touched; reloads never overlap. Returns the number of views reloaded.
    pub async fn re_cache_many(&self, keys: &[RouteKey], host: &dyn ViewHost) -> usize {
        let mut reloaded = 0;
        for key in keys {
            if self.re_cache(key, host).await {
                reloaded += 1;
            }
        }
        reloaded
    }
}
