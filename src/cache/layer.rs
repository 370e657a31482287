//! Per-collection cache with in-flight request de-duplication.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::error::DataError;

use super::traits::CacheStatus;

type SharedFetch<T> = Shared<BoxFuture<'static, Result<Arc<Vec<T>>, DataError>>>;

enum Slot<T> {
  Empty,
  Fetching {
    generation: u64,
    fetch: SharedFetch<T>,
  },
  Cached(Arc<Vec<T>>),
}

struct Inner<T> {
  slot: Slot<T>,
  /// Bumped for every fetch started, so a fetch that outlived an
  /// invalidation can tell it no longer owns the slot.
  generation: u64,
}

/// Cache slot for one collection.
///
/// State machine: `Empty -> Fetching -> Cached`, and back to `Empty` on
/// invalidation or on a failed fetch. While `Fetching`, every reader awaits
/// the same shared future, so at most one fetch per collection is in flight.
pub struct CollectionCache<T> {
  name: &'static str,
  inner: Mutex<Inner<T>>,
}

impl<T: Send + Sync + 'static> CollectionCache<T> {
  pub fn new(name: &'static str) -> Self {
    Self {
      name,
      inner: Mutex::new(Inner {
        slot: Slot::Empty,
        generation: 0,
      }),
    }
  }

  fn lock(&self) -> MutexGuard<'_, Inner<T>> {
    // The guard is never held across an await or a user callback that can
    // panic mid-update, so a poisoned lock still holds a consistent slot.
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Return the cached collection, joining or starting a fetch as needed.
  ///
  /// `fetcher` is only called when the slot is `Empty`. A failure is handed
  /// to every joined caller and leaves the slot `Empty`, so the next call
  /// fetches again.
  pub async fn get<F, Fut>(&self, fetcher: F) -> Result<Arc<Vec<T>>, DataError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>, DataError>> + Send + 'static,
  {
    let (generation, fetch) = {
      let mut inner = self.lock();

      let joined = match &inner.slot {
        Slot::Cached(data) => {
          debug!(collection = self.name, "cache hit");
          return Ok(Arc::clone(data));
        }
        Slot::Fetching { generation, fetch } => {
          debug!(collection = self.name, "joining in-flight fetch");
          Some((*generation, fetch.clone()))
        }
        Slot::Empty => None,
      };

      match joined {
        Some(joined) => joined,
        None => {
          debug!(collection = self.name, "starting fetch");
          inner.generation += 1;
          let generation = inner.generation;
          let fetch = fetcher().map(|r| r.map(Arc::new)).boxed().shared();
          inner.slot = Slot::Fetching {
            generation,
            fetch: fetch.clone(),
          };
          (generation, fetch)
        }
      }
    };

    let result = fetch.await;

    let mut inner = self.lock();
    let still_owner =
      matches!(&inner.slot, Slot::Fetching { generation: g, .. } if *g == generation);
    if still_owner {
      inner.slot = match &result {
        Ok(data) => Slot::Cached(Arc::clone(data)),
        Err(e) => {
          debug!(collection = self.name, error = %e, "fetch failed, slot reset");
          Slot::Empty
        }
      };
    }

    result
  }

  /// Drop the held value and forget any in-flight fetch.
  pub fn invalidate(&self) {
    let mut inner = self.lock();
    if !matches!(inner.slot, Slot::Empty) {
      debug!(collection = self.name, "invalidated");
    }
    inner.slot = Slot::Empty;
  }

  pub fn status(&self) -> CacheStatus {
    match self.lock().slot {
      Slot::Empty => CacheStatus::Empty,
      Slot::Fetching { .. } => CacheStatus::Fetching,
      Slot::Cached(_) => CacheStatus::Cached,
    }
  }

  /// The held value, without fetching.
  pub fn peek(&self) -> Option<Arc<Vec<T>>> {
    match &self.lock().slot {
      Slot::Cached(data) => Some(Arc::clone(data)),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tokio::sync::oneshot;

  fn counting_fetch(
    calls: &Arc<AtomicUsize>,
    result: Result<Vec<u32>, DataError>,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<Vec<u32>, DataError>> {
    let calls = Arc::clone(calls);
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async move {
        tokio::task::yield_now().await;
        result
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_fetch() {
    let cache = CollectionCache::new("test");
    let calls = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
      cache.get(counting_fetch(&calls, Ok(vec![1, 2]))),
      cache.get(counting_fetch(&calls, Ok(vec![3]))),
    );

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(*a, vec![1, 2]);
    assert_eq!(cache.status(), CacheStatus::Cached);
  }

  #[tokio::test]
  async fn test_cached_value_served_without_fetch() {
    let cache = CollectionCache::new("test");
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .get(counting_fetch(&calls, Ok(vec![1])))
      .await
      .unwrap();
    let again = cache
      .get(counting_fetch(&calls, Ok(vec![2])))
      .await
      .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(*again, vec![1]);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let cache = CollectionCache::new("test");
    let calls = Arc::new(AtomicUsize::new(0));

    cache
      .get(counting_fetch(&calls, Ok(vec![1])))
      .await
      .unwrap();
    cache.invalidate();
    assert_eq!(cache.status(), CacheStatus::Empty);

    let fresh = cache
      .get(counting_fetch(&calls, Ok(vec![2])))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*fresh, vec![2]);
  }

  #[tokio::test]
  async fn test_failure_shared_and_not_cached() {
    let cache = CollectionCache::new("test");
    let calls = Arc::new(AtomicUsize::new(0));
    let failure = DataError::Transport("connection refused".to_string());

    let (a, b) = tokio::join!(
      cache.get(counting_fetch(&calls, Err(failure.clone()))),
      cache.get(counting_fetch(&calls, Ok(vec![9]))),
    );
    assert_eq!(a.unwrap_err(), failure);
    assert_eq!(b.unwrap_err(), failure);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.status(), CacheStatus::Empty);

    let retried = cache
      .get(counting_fetch(&calls, Ok(vec![7])))
      .await
      .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*retried, vec![7]);
  }

  #[tokio::test]
  async fn test_invalidate_during_fetch_discards_result() {
    let cache = Arc::new(CollectionCache::new("test"));
    let (tx, rx) = oneshot::channel::<()>();

    let reader = Arc::clone(&cache);
    let handle = tokio::spawn(async move {
      reader
        .get(move || async move {
          rx.await
            .map_err(|e| DataError::Transport(e.to_string()))?;
          Ok::<_, DataError>(vec![1u32])
        })
        .await
    });

    while cache.status() != CacheStatus::Fetching {
      tokio::task::yield_now().await;
    }
    cache.invalidate();
    tx.send(()).unwrap();

    let result = handle.await.unwrap().unwrap();
    assert_eq!(*result, vec![1]);
    assert_eq!(cache.status(), CacheStatus::Empty);
    assert!(cache.peek().is_none());
  }
}
