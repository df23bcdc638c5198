//! Install-time population of the current generation.

use futures::future::join_all;
use tracing::{info, warn};
use url::Url;

use crate::cache::{CacheHandle, CacheStorage};
use crate::net::{FetchMode, Network, Request};

/// A manifest URL that could not be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrecacheFailure {
  pub url: String,
  pub reason: String,
}

/// Outcome of [`precache_all`]. Failures are informational only.
#[derive(Debug, Clone, Default)]
pub struct PrecacheReport {
  pub cached: Vec<String>,
  pub failed: Vec<PrecacheFailure>,
}

impl PrecacheReport {
  pub fn is_complete(&self) -> bool {
    self.failed.is_empty()
  }
}

/// Fetch and store every manifest URL concurrently.
///
/// A failure on one URL (network error, non-2xx status, storage error) is
/// logged and recorded in the report; it never aborts the others. Resolves
/// once every attempt has settled. Report order follows the manifest.
pub async fn precache_all<S, N>(
  handle: &CacheHandle<S>,
  network: &N,
  manifest: &[Url],
) -> PrecacheReport
where
  S: CacheStorage,
  N: Network,
{
  let attempts = manifest.iter().map(|url| precache_one(handle, network, url));
  let outcomes = join_all(attempts).await;

  let mut report = PrecacheReport::default();
  for (url, outcome) in manifest.iter().zip(outcomes) {
    match outcome {
      Ok(()) => report.cached.push(url.to_string()),
      Err(reason) => {
        warn!(url = %url, %reason, "skipping precache entry");
        report.failed.push(PrecacheFailure {
          url: url.to_string(),
          reason,
        });
      }
    }
  }

  info!(
    generation = handle.name(),
    cached = report.cached.len(),
    failed = report.failed.len(),
    "precache finished"
  );
  report
}

async fn precache_one<S, N>(handle: &CacheHandle<S>, network: &N, url: &Url) -> Result<(), String>
where
  S: CacheStorage,
  N: Network,
{
  let request = Request::get(url.clone());
  let response = network
    .fetch(&request, FetchMode::Default)
    .await
    .map_err(|e| e.to_string())?;

  if !response.ok() {
    return Err(format!("HTTP {} {}", response.status, response.status_text));
  }

  handle
    .put(url, &response)
    .map_err(|e| format!("failed to store: {:#}", e))
}
