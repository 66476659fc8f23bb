//! Cache storage trait and file-backed implementation.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::form_urlencoded;

use super::traits::{is_fresh, CachedEntry};
use crate::crude::{CompoundId, CrudeError, Result};

/// Directory under the cache root holding one file per compound id.
const ETAG_DIR: &str = "etag_cache";

/// Trait for cache storage backends.
///
/// Reads never fail: an unreadable or missing entry is a cache miss.
/// Writes report failures, since callers decide whether a lost write is fatal.
pub trait CacheStorage {
  /// Get cached content for a key, regardless of age.
  fn load(&self, key: &str) -> Option<CachedEntry>;

  /// Store content under a key, replacing whatever was there.
  fn save(&self, key: &str, content: &str) -> Result<()>;

  /// Get the last known ETag of an entry.
  fn load_etag(&self, id: &CompoundId) -> Option<String>;

  /// Record the ETag of an entry, overwriting any previous one.
  fn save_etag(&self, id: &CompoundId, etag: &str) -> Result<()>;

  /// Forget the ETag of an entry.
  fn remove_etag(&self, id: &CompoundId) -> Result<()>;

  /// Get cached content only if it was written within `freshness` of now.
  fn load_if_recent(&self, key: &str, freshness: Duration) -> Option<CachedEntry> {
    self
      .load(key)
      .filter(|entry| is_fresh(entry.cached_at, Utc::now(), freshness))
  }
}

/// File-based cache storage.
///
/// Layout under the root:
///
/// ```text
/// model_cache.json
/// etag_cache/<model>/<entry id>
/// ```
pub struct FileStorage {
  root: PathBuf,
}

impl FileStorage {
  /// Storage rooted directly at `root`.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Storage for one API endpoint inside a shared cache directory.
  ///
  /// Each endpoint gets its own subdirectory so that schemas and ETags of
  /// different servers never mix.
  pub fn for_endpoint(cache_dir: &Path, endpoint: &str) -> Self {
    Self::new(cache_dir.join(endpoint_key(endpoint)))
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  fn etag_path(&self, id: &CompoundId) -> Option<PathBuf> {
    let entry = id.entry_id()?;
    Some(
      self
        .root
        .join(ETAG_DIR)
        .join(file_safe(id.model_name()))
        .join(file_safe(entry)),
    )
  }
}

impl CacheStorage for FileStorage {
  fn load(&self, key: &str) -> Option<CachedEntry> {
    let path = self.root.join(key);
    let read = || -> std::io::Result<CachedEntry> {
      let mut file = File::open(&path)?;
      let modified = file.metadata()?.modified()?;
      let mut content = String::new();
      file.read_to_string(&mut content)?;
      Ok(CachedEntry {
        content,
        cached_at: DateTime::<Utc>::from(modified),
      })
    };

    match read() {
      Ok(entry) => Some(entry),
      Err(e) => {
        debug!(path = %path.display(), error = %e, "cache miss");
        None
      }
    }
  }

  fn save(&self, key: &str, content: &str) -> Result<()> {
    write_atomic(&self.root.join(key), content)
  }

  fn load_etag(&self, id: &CompoundId) -> Option<String> {
    let path = self.etag_path(id)?;
    let etag = std::fs::read_to_string(&path).ok()?;
    let etag = etag.trim();
    debug!(%id, etag, "loaded cached etag");
    (!etag.is_empty()).then(|| etag.to_string())
  }

  fn save_etag(&self, id: &CompoundId, etag: &str) -> Result<()> {
    let Some(path) = self.etag_path(id) else {
      debug!(%id, "not an entry, etag not recorded");
      return Ok(());
    };
    write_atomic(&path, etag)?;
    info!(%id, etag, path = %path.display(), "recorded etag");
    Ok(())
  }

  fn remove_etag(&self, id: &CompoundId) -> Result<()> {
    let Some(path) = self.etag_path(id) else {
      return Ok(());
    };
    match std::fs::remove_file(&path) {
      Ok(()) => {
        debug!(%id, "removed cached etag");
        Ok(())
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(source) => Err(CrudeError::CacheIo { path, source }),
    }
  }
}

/// Write through a temp file in the target directory and rename it into
/// place, so readers see either the old or the new content.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
  let io_err = |source| CrudeError::CacheIo {
    path: path.to_path_buf(),
    source,
  };

  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  std::fs::create_dir_all(dir).map_err(io_err)?;

  let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
  file.write_all(content.as_bytes()).map_err(io_err)?;
  file.persist(path).map_err(|e| io_err(e.error))?;
  Ok(())
}

/// Stable, fixed-length directory name for an endpoint.
fn endpoint_key(endpoint: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(endpoint.trim_end_matches('/').as_bytes());
  let digest = hex::encode(hasher.finalize());
  digest[..16].to_string()
}

/// Encode an id component so it is a single, harmless file name.
fn file_safe(component: &str) -> String {
  form_urlencoded::byte_serialize(component.as_bytes()).collect()
}
