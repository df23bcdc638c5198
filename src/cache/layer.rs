//! Generation-level view over a storage backend.

use std::sync::Arc;

use color_eyre::Result;
use tracing::info;
use url::Url;

use crate::net::{cache_key, Request, Response};

use super::storage::{CacheStorage, StoredEntry};

/// The set of cache generations of one origin.
///
/// Cheap to clone; all clones share the same backend.
pub struct CacheStore<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheStore<S> {
  /// Create a new cache store with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// Open a generation, creating it if absent.
  pub fn open(&self, name: &str) -> Result<CacheHandle<S>> {
    self.storage.create_generation(name)?;
    Ok(self.handle(name))
  }

  /// Handle on a generation without creating it.
  ///
  /// Reads from a missing generation miss and writes into it are dropped.
  pub fn handle(&self, name: &str) -> CacheHandle<S> {
    CacheHandle {
      storage: Arc::clone(&self.storage),
      name: name.to_string(),
    }
  }

  pub fn has(&self, name: &str) -> Result<bool> {
    self.storage.has_generation(name)
  }

  pub fn mark_installed(&self, name: &str) -> Result<()> {
    self.storage.mark_installed(name)
  }

  /// Whether a generation exists and its precache finished.
  pub fn is_installed(&self, name: &str) -> Result<bool> {
    self.storage.is_installed(name)
  }

  /// Names of all generations.
  pub fn keys(&self) -> Result<Vec<String>> {
    self.storage.generation_names()
  }

  pub fn delete(&self, name: &str) -> Result<bool> {
    self.storage.delete_generation(name)
  }

  /// Entry count of a generation.
  pub fn len(&self, name: &str) -> Result<usize> {
    self.storage.count_entries(name)
  }

  /// Delete every generation starting with `prefix` except `current`.
  ///
  /// Generations of other applications (different prefix) are left alone.
  /// Returns the names that were deleted.
  pub fn purge_stale(&self, prefix: &str, current: &str) -> Result<Vec<String>> {
    let mut purged = Vec::new();
    for name in self.keys()? {
      if name.starts_with(prefix) && name != current && self.delete(&name)? {
        info!(generation = %name, "deleted stale cache generation");
        purged.push(name);
      }
    }
    Ok(purged)
  }
}

impl<S: CacheStorage> Clone for CacheStore<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

/// An open generation.
pub struct CacheHandle<S: CacheStorage> {
  storage: Arc<S>,
  name: String,
}

impl<S: CacheStorage> CacheHandle<S> {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn match_request(&self, request: &Request) -> Result<Option<Response>> {
    self.match_url(&request.url)
  }

  pub fn match_url(&self, url: &Url) -> Result<Option<Response>> {
    Ok(
      self
        .storage
        .get_entry(&self.name, &cache_key(url))?
        .map(|entry| entry.response),
    )
  }

  pub fn put(&self, url: &Url, response: &Response) -> Result<()> {
    self.storage.put_entry(&self.name, &cache_key(url), response)
  }

  pub fn entries(&self) -> Result<Vec<StoredEntry>> {
    self.storage.list_entries(&self.name)
  }
}

impl<S: CacheStorage> Clone for CacheHandle<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      name: self.name.clone(),
    }
  }
}
