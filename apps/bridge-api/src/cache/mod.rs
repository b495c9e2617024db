//! Operational draft cache: a Redis-backed key-value layer guarded by a
//! circuit breaker so cache trouble never takes down draft day.

pub mod breaker;
pub mod draft;
pub mod store;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use draft::{DraftCache, Namespace};
pub use store::{CacheError, CacheStore, MemoryStore, RedisStore};
