//! quorum/crates/storage-adapters/src/lib.rs
//!
//! Adapter implementations of the `domains` ports. The in-memory
//! adapters are always compiled: they back the test suites and any
//! deployment that wants a single-process setup. Postgres and Redis
//! adapters are feature-gated the way the rest of the workspace gates
//! heavyweight backends.

pub mod memory;
pub mod memory_cache;

#[cfg(feature = "db-postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis_cache;

pub use memory::MemoryStore;
pub use memory_cache::MemoryTagCache;

#[cfg(feature = "db-postgres")]
pub use postgres::PgStore;

#[cfg(feature = "redis")]
pub use redis_cache::RedisTagCache;
