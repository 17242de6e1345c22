//! Shared state store access for the coordination service.
//!
//! `KvStore` is the seam between coordination logic and the store: the
//! production implementation is [`RedisStore`], and tests substitute
//! [`MemoryStore`]. [`LockCache`] is the bounded short-TTL cache that
//! absorbs read-heavy conflict-checking traffic in front of lock lookups.

pub mod cache;
pub mod memory;
pub mod redis;
pub mod store;

pub use cache::LockCache;
pub use memory::MemoryStore;
pub use redis::RedisStore;
pub use store::{KvStore, KvStoreExt};
