//! Cache layer that orchestrates caching logic with network fetching.

use chrono::Duration;
use tracing::debug;

use super::storage::CacheStorage;
use super::traits::CacheResult;
use crate::crude::Result;

/// How long cached content is trusted before it must be refetched.
pub const DEFAULT_STALE_TIME: Duration = Duration::minutes(10);

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the API components and the network client.
/// The cache is a best-effort mirror: the server stays the authority and
/// nothing here coordinates with other processes sharing the directory.
pub struct CacheLayer<S: CacheStorage> {
  storage: S,
  /// How long before cached data is considered stale
  stale_time: Duration,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage,
      stale_time: DEFAULT_STALE_TIME,
    }
  }

  /// Set the stale time for cached data.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.stale_time = stale_time;
    self
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  /// Fetch raw content with cache-first strategy.
  ///
  /// 1. Check cache - if fresh and accepted by `usable`, return it
  /// 2. Otherwise fetch from network
  /// 3. Replace the cache with the new content
  ///
  /// Failing to write the cache is an error; the fetched content is not
  /// returned in that case.
  pub fn fetch<U, F>(&self, key: &str, usable: U, fetcher: F) -> Result<CacheResult<String>>
  where
    U: FnOnce(&str) -> bool,
    F: FnOnce() -> Result<String>,
  {
    if let Some(cached) = self.storage.load_if_recent(key, self.stale_time) {
      if usable(&cached.content) {
        debug!(key, cached_at = %cached.cached_at, "serving from cache");
        return Ok(CacheResult::from_cache(cached.content, cached.cached_at));
      }
      debug!(key, "cached content unusable, refetching");
    }

    let data = fetcher()?;
    self.storage.save(key, &data)?;
    Ok(CacheResult::from_network(data))
  }
}
