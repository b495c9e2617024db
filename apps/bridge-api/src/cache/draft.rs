//! Draft-day operational cache.
//!
//! Wraps a [`CacheStore`] with the circuit breaker, a connection-slot
//! semaphore, adaptive TTLs for active draft scopes, and a latency budget.
//! Every failure degrades to `None`/`false`; callers fall back to the
//! source of truth and never see a cache error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{Semaphore, SemaphorePermit};

use super::breaker::CircuitBreaker;
use super::store::CacheStore;

/// Connection slots shared by all cache operations.
const MAX_CONNECTIONS: usize = 20;

/// Above this share of slots in use, new operations fail fast.
const UTILIZATION_FAIL_FAST: f64 = 0.9;

/// Operations slower than this get a warning.
const LATENCY_BUDGET: Duration = Duration::from_millis(50);

/// Active draft scopes hold entries longer; idle scopes expire at the base
/// TTL so stale data clears quickly between sessions.
const ACTIVE_TTL_MULTIPLIER: u64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Players,
    Analytics,
    Teams,
    Availability,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Players => "players",
            Namespace::Analytics => "analytics",
            Namespace::Teams => "teams",
            Namespace::Availability => "availability",
        }
    }

    /// Base TTL in seconds for idle scopes.
    fn base_ttl_secs(self) -> u64 {
        match self {
            Namespace::Players => 300,
            Namespace::Analytics => 180,
            Namespace::Teams => 600,
            Namespace::Availability => 120,
        }
    }
}

pub struct DraftCache<S: CacheStore> {
    store: S,
    breaker: Arc<CircuitBreaker>,
    slots: Semaphore,
    active_scopes: Mutex<HashSet<String>>,
}

impl<S: CacheStore> DraftCache<S> {
    pub fn new(store: S, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            store,
            breaker,
            slots: Semaphore::new(MAX_CONNECTIONS),
            active_scopes: Mutex::new(HashSet::new()),
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Mark a scope (league/draft session) as actively drafting, which
    /// extends TTLs for its entries.
    pub fn mark_scope_active(&self, scope: &str) {
        self.active_scopes.lock().insert(scope.to_string());
    }

    pub fn clear_scope_active(&self, scope: &str) {
        self.active_scopes.lock().remove(scope);
    }

    pub fn is_scope_active(&self, scope: &str) -> bool {
        self.active_scopes.lock().contains(scope)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        namespace: Namespace,
        scope: &str,
        qualifiers: &[&str],
    ) -> Option<T> {
        let key = cache_key(namespace, scope, qualifiers);
        let _permit = self.admit()?;

        let started = Instant::now();
        let result = self.store.get(&key).await;
        self.observe(&key, started, result.is_ok());

        match result {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "discarding undeserializable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache get failed");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(
        &self,
        namespace: Namespace,
        scope: &str,
        qualifiers: &[&str],
        value: &T,
    ) -> bool {
        let key = cache_key(namespace, scope, qualifiers);
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache value not serializable");
                return false;
            }
        };
        let Some(_permit) = self.admit() else {
            return false;
        };

        let ttl = self.ttl_for(namespace, scope);
        let started = Instant::now();
        let result = self.store.set_ex(&key, &raw, ttl).await;
        self.observe(&key, started, result.is_ok());

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache set failed");
                false
            }
        }
    }

    pub async fn invalidate(
        &self,
        namespace: Namespace,
        scope: &str,
        qualifiers: &[&str],
    ) -> bool {
        let key = cache_key(namespace, scope, qualifiers);
        let Some(_permit) = self.admit() else {
            return false;
        };

        let started = Instant::now();
        let result = self.store.del(&key).await;
        self.observe(&key, started, result.is_ok());

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%key, error = %e, "cache invalidation failed");
                false
            }
        }
    }

    fn ttl_for(&self, namespace: Namespace, scope: &str) -> u64 {
        let base = namespace.base_ttl_secs();
        if self.is_scope_active(scope) {
            base * ACTIVE_TTL_MULTIPLIER
        } else {
            base
        }
    }

    /// Utilization and breaker checks shared by all operations.
    ///
    /// The slot checks run first: the breaker is consulted last so that a
    /// half-open probe is only ever claimed by an operation that will
    /// actually run and record an outcome.
    fn admit(&self) -> Option<SemaphorePermit<'_>> {
        let in_use = MAX_CONNECTIONS - self.slots.available_permits();
        if (in_use as f64) / (MAX_CONNECTIONS as f64) > UTILIZATION_FAIL_FAST {
            tracing::warn!(in_use, "cache connection slots saturated, failing fast");
            return None;
        }
        let permit = self.slots.try_acquire().ok()?;

        if !self.breaker.try_acquire() {
            tracing::debug!("cache operation refused, breaker open");
            return None;
        }

        Some(permit)
    }

    fn observe(&self, key: &str, started: Instant, ok: bool) {
        let elapsed = started.elapsed();
        if elapsed > LATENCY_BUDGET {
            tracing::warn!(%key, elapsed_ms = elapsed.as_millis() as u64, "slow cache operation");
        }
        if ok {
            self.breaker.record_success();
        } else {
            self.breaker.record_failure();
        }
    }
}

/// `draft:{namespace}:{scope}` with an 8-hex-char qualifier hash appended
/// when qualifiers are present, keeping key length bounded.
pub fn cache_key(namespace: Namespace, scope: &str, qualifiers: &[&str]) -> String {
    let mut key = format!("draft:{}:{}", namespace.as_str(), scope);
    if !qualifiers.is_empty() {
        let mut hasher = Sha256::new();
        hasher.update(qualifiers.join(":").as_bytes());
        let digest = hasher.finalize();
        let hash8: String = digest
            .iter()
            .take(4)
            .map(|b| format!("{b:02x}"))
            .collect();
        key.push(':');
        key.push_str(&hash8);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::breaker::{BreakerConfig, BreakerState};
    use crate::cache::store::{CacheError, MemoryStore};
    use async_trait::async_trait;

    fn cache(store: MemoryStore) -> DraftCache<MemoryStore> {
        DraftCache::new(store, Arc::new(CircuitBreaker::default()))
    }

    #[test]
    fn key_format_with_and_without_qualifiers() {
        let bare = cache_key(Namespace::Teams, "classic", &[]);
        assert_eq!(bare, "draft:teams:classic");

        let qualified = cache_key(Namespace::Players, "classic", &["all", "2026"]);
        assert!(qualified.starts_with("draft:players:classic:"));
        let hash = qualified.rsplit(':').next().unwrap();
        assert_eq!(hash.len(), 8);
        // Same qualifiers hash the same.
        assert_eq!(qualified, cache_key(Namespace::Players, "classic", &["all", "2026"]));
        assert_ne!(qualified, cache_key(Namespace::Players, "classic", &["all", "2025"]));
    }

    #[tokio::test]
    async fn round_trips_json_values() {
        let cache = cache(MemoryStore::new());
        let stored = vec!["alice".to_string(), "bob".to_string()];
        assert!(cache.set_json(Namespace::Players, "classic", &[], &stored).await);

        let loaded: Option<Vec<String>> = cache.get_json(Namespace::Players, "classic", &[]).await;
        assert_eq!(loaded.as_deref(), Some(stored.as_slice()));

        assert!(cache.invalidate(Namespace::Players, "classic", &[]).await);
        let gone: Option<Vec<String>> = cache.get_json(Namespace::Players, "classic", &[]).await;
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn garbage_entries_degrade_to_none() {
        let store = MemoryStore::new();
        store
            .set_ex("draft:analytics:classic", "not json {", 60)
            .await
            .ok();
        let cache = cache(store);

        let loaded: Option<Vec<String>> = cache.get_json(Namespace::Analytics, "classic", &[]).await;
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn active_scope_doubles_ttl() {
        let cache = cache(MemoryStore::new());
        assert_eq!(cache.ttl_for(Namespace::Availability, "classic"), 120);

        cache.mark_scope_active("classic");
        assert_eq!(cache.ttl_for(Namespace::Availability, "classic"), 240);
        // Other scopes stay at the base TTL.
        assert_eq!(cache.ttl_for(Namespace::Availability, "premier"), 120);

        cache.clear_scope_active("classic");
        assert_eq!(cache.ttl_for(Namespace::Availability, "classic"), 120);
    }

    struct FailingStore;

    #[async_trait]
    impl CacheStore for FailingStore {
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }

        async fn del(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    struct FlakyStore {
        failing: std::sync::atomic::AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                failing: std::sync::atomic::AtomicBool::new(true),
            }
        }

        fn recover(&self) {
            self.failing
                .store(false, std::sync::atomic::Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), CacheError> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                Err(CacheError::Unavailable("down".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl CacheStore for FlakyStore {
        async fn set_ex(&self, _key: &str, _value: &str, _ttl: u64) -> Result<(), CacheError> {
            self.check()
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            self.check().map(|_| None)
        }

        async fn del(&self, _key: &str) -> Result<(), CacheError> {
            self.check()
        }
    }

    #[tokio::test]
    async fn saturated_slots_never_claim_the_half_open_probe() {
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_millis(10),
        }));
        let cache = DraftCache::new(FlakyStore::new(), breaker.clone());

        for _ in 0..3 {
            let miss: Option<String> = cache.get_json(Namespace::Teams, "classic", &[]).await;
            assert!(miss.is_none());
        }
        assert_eq!(breaker.state(), BreakerState::Open);
        tokio::time::sleep(Duration::from_millis(15)).await;

        // Saturate the connection slots past the fail-fast threshold. The
        // refused operation must not claim the single half-open probe.
        let held: Vec<_> = (0..19).map(|_| cache.slots.try_acquire().unwrap()).collect();
        let refused: Option<String> = cache.get_json(Namespace::Teams, "classic", &[]).await;
        assert!(refused.is_none());
        assert_eq!(breaker.state(), BreakerState::Open);
        drop(held);

        // With slots free again the probe is admitted and a healthy store
        // closes the breaker.
        cache.store.recover();
        let miss: Option<String> = cache.get_json(Namespace::Teams, "classic", &[]).await;
        assert!(miss.is_none());
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(cache.set_json(Namespace::Teams, "classic", &[], &"x").await);
    }

    #[tokio::test]
    async fn repeated_failures_open_the_breaker_and_short_circuit() {
        let breaker = Arc::new(CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }));
        let cache = DraftCache::new(FailingStore, breaker.clone());

        for _ in 0..3 {
            let miss: Option<String> = cache.get_json(Namespace::Teams, "classic", &[]).await;
            assert!(miss.is_none());
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        // Open breaker refuses before touching the store.
        assert!(!cache.set_json(Namespace::Teams, "classic", &[], &"x").await);
        assert_eq!(breaker.consecutive_failures(), 3);
    }
}
