//! Core traits and types for the caching system.

/// Trait for entities that live in a cached collection.
pub trait Cacheable: Clone + Send + Sync + 'static {
  /// Unique identifier of this entity within its collection
  fn cache_key(&self) -> &str;
}

/// Observable state of one collection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
  /// No value held and nothing in flight
  Empty,
  /// A fetch is running; readers join it
  Fetching,
  /// A resolved value is held in memory
  Cached,
}

/// Linear lookup by exact key equality.
pub fn find_by_key<'a, T: Cacheable>(entities: &'a [T], key: &str) -> Option<&'a T> {
  entities.iter().find(|e| e.cache_key() == key)
}
