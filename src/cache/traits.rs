//! Core types for the caching system.

use chrono::{DateTime, Duration, Utc};

/// Content read back from the cache together with its last write time.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  pub content: String,
  pub cached_at: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::CacheFresh,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where cached data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still inside the freshness window
  CacheFresh,
}

/// Whether something written at `cached_at` may still be trusted at `now`.
///
/// The window is inclusive: content exactly `freshness` old is still fresh.
pub fn is_fresh(cached_at: DateTime<Utc>, now: DateTime<Utc>, freshness: Duration) -> bool {
  now - cached_at <= freshness
}
