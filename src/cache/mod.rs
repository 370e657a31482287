//! In-memory collection caching.
//!
//! This module provides a data-source-agnostic cache that:
//! - Holds one resolved value per collection until invalidated
//! - Lets concurrent readers join a single in-flight fetch
//! - Never stores a failed fetch; the slot resets so the next read retries

mod layer;
mod traits;

pub use layer::CollectionCache;
pub use traits::{find_by_key, CacheStatus, Cacheable};
