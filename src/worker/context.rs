//! Explicitly initialized worker state shared by the router and the strategies.

use color_eyre::{eyre::eyre, Result};
use url::{Origin, Url};

use crate::cache::{CacheHandle, CacheStorage, CacheStore, Generation};
use crate::net::Network;

/// Inputs needed to build a [`WorkerContext`].
#[derive(Debug, Clone)]
pub struct WorkerSettings {
  /// Registration URL of the worker script, carrying `v=<version>`
  pub script_url: String,
  pub cache_prefix: String,
  /// Root document served to offline navigations, relative to the script
  pub shell_document: String,
  /// Relative URLs fetched at install time
  pub precache: Vec<String>,
}

/// What the router needs to classify a request.
#[derive(Debug, Clone)]
pub struct Scope {
  pub origin: Origin,
  /// Last path segment of the worker script URL (e.g. `sw.js`)
  pub script_name: String,
}

pub struct WorkerContext<S: CacheStorage, N: Network> {
  pub scope: Scope,
  pub generation: Generation,
  pub shell_url: Url,
  pub manifest: Vec<Url>,
  pub store: CacheStore<S>,
  pub network: N,
}

impl<S: CacheStorage, N: Network> WorkerContext<S, N> {
  pub fn new(settings: &WorkerSettings, store: CacheStore<S>, network: N) -> Result<Self> {
    let script_url = Url::parse(&settings.script_url)
      .map_err(|e| eyre!("Invalid worker script URL '{}': {}", settings.script_url, e))?;

    let script_name = script_url
      .path_segments()
      .and_then(|mut segments| segments.next_back())
      .filter(|name| !name.is_empty())
      .ok_or_else(|| eyre!("Worker script URL '{}' has no file name", script_url))?
      .to_string();

    let shell_url = resolve(&script_url, &settings.shell_document)?;
    let manifest = settings
      .precache
      .iter()
      .map(|path| resolve(&script_url, path))
      .collect::<Result<Vec<_>>>()?;

    Ok(Self {
      scope: Scope {
        origin: script_url.origin(),
        script_name,
      },
      generation: Generation::current(&settings.cache_prefix, &settings.script_url),
      shell_url,
      manifest,
      store,
      network,
    })
  }

  /// Open the current generation, creating it if absent. Install only.
  pub fn open_current(&self) -> Result<CacheHandle<S>> {
    self.store.open(&self.generation.name())
  }

  /// Handle on the current generation for serving fetches.
  ///
  /// Never recreates a generation that a newer worker already purged.
  pub fn current(&self) -> CacheHandle<S> {
    self.store.handle(&self.generation.name())
  }
}

/// Resolve a manifest path against the worker script location.
fn resolve(script_url: &Url, path: &str) -> Result<Url> {
  script_url
    .join(path)
    .map_err(|e| eyre!("Invalid path '{}' relative to {}: {}", path, script_url, e))
}

#[cfg(test)]
pub(crate) mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::cache::SqliteStorage;
  use crate::net::mock::ScriptedNetwork;

  pub const ORIGIN: &str = "https://ledger.example";

  pub type TestContext = WorkerContext<SqliteStorage, Arc<ScriptedNetwork>>;

  pub fn settings(version: &str, precache: &[&str]) -> WorkerSettings {
    WorkerSettings {
      script_url: format!("{}/sw.js?v={}", ORIGIN, version),
      cache_prefix: "ledger-cache-v".to_string(),
      shell_document: "index.html".to_string(),
      precache: precache.iter().map(|p| p.to_string()).collect(),
    }
  }

  pub fn memory_store() -> CacheStore<SqliteStorage> {
    CacheStore::new(SqliteStorage::open_in_memory().unwrap())
  }

  pub fn context(
    version: &str,
    store: CacheStore<SqliteStorage>,
    network: Arc<ScriptedNetwork>,
  ) -> TestContext {
    WorkerContext::new(&settings(version, &["index.html", "app.js"]), store, network).unwrap()
  }

  pub fn url(path: &str) -> Url {
    Url::parse(ORIGIN).unwrap().join(path).unwrap()
  }

  #[test]
  fn test_context_resolution() {
    let ctx = context("2.0.1", memory_store(), ScriptedNetwork::new());
    assert_eq!(ctx.scope.script_name, "sw.js");
    assert_eq!(ctx.scope.origin, url("/").origin());
    assert_eq!(ctx.generation.name(), "ledger-cache-v2.0.1");
    assert_eq!(ctx.shell_url.as_str(), "https://ledger.example/index.html");
    assert_eq!(ctx.manifest, vec![url("index.html"), url("app.js")]);
  }

  #[test]
  fn test_paths_resolve_against_script_directory() {
    let mut settings = settings("1.0.0", &["css/styles.css", "../root.js"]);
    settings.script_url = format!("{}/app/sw.js", ORIGIN);
    let ctx = WorkerContext::new(&settings, memory_store(), ScriptedNetwork::new()).unwrap();

    assert_eq!(ctx.shell_url, url("/app/index.html"));
    assert_eq!(ctx.manifest, vec![url("/app/css/styles.css"), url("/root.js")]);
    assert_eq!(ctx.generation.version(), "1.0.0");
  }

  #[test]
  fn test_script_url_without_file_name() {
    let mut settings = settings("1.0.0", &[]);
    settings.script_url = format!("{}/", ORIGIN);
    assert!(WorkerContext::new(&settings, memory_store(), ScriptedNetwork::new()).is_err());
  }

  #[test]
  fn test_invalid_script_url() {
    let mut settings = settings("1.0.0", &[]);
    settings.script_url = "sw.js?v=1".to_string();
    assert!(WorkerContext::new(&settings, memory_store(), ScriptedNetwork::new()).is_err());
  }
}
