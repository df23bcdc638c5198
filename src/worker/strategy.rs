//! Strategy executors.

use tracing::{debug, warn};

use crate::cache::{CacheHandle, CacheStorage, Served};
use crate::error::FetchError;
use crate::net::{FetchMode, Network, Request, Response};

use super::context::WorkerContext;

/// How a routed request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Always go to the network, bypassing caches; used for the worker script
  NetworkOnly,
  /// Network, falling back to the cache (and the shell for navigations)
  NetworkFirst,
  /// Cache, populating it from the network on a miss
  CacheFirst,
}

impl Strategy {
  pub fn label(&self) -> &'static str {
    match self {
      Self::NetworkOnly => "network-only",
      Self::NetworkFirst => "network-first",
      Self::CacheFirst => "cache-first",
    }
  }

  pub async fn execute<S, N>(
    self,
    ctx: &WorkerContext<S, N>,
    request: &Request,
  ) -> Result<Served, FetchError>
  where
    S: CacheStorage,
    N: Network,
  {
    debug!(url = %request.url, strategy = self.label(), "handling request");
    match self {
      Self::NetworkOnly => network_only(ctx, request).await,
      Self::NetworkFirst => network_first(ctx, request).await,
      Self::CacheFirst => cache_first(ctx, request).await,
    }
  }
}

async fn network_only<S, N>(ctx: &WorkerContext<S, N>, request: &Request) -> Result<Served, FetchError>
where
  S: CacheStorage,
  N: Network,
{
  let response = ctx.network.fetch(request, FetchMode::Reload).await?;
  Ok(Served::from_network(response))
}

async fn network_first<S, N>(ctx: &WorkerContext<S, N>, request: &Request) -> Result<Served, FetchError>
where
  S: CacheStorage,
  N: Network,
{
  let handle = ctx.current();

  let error = match ctx.network.fetch(request, FetchMode::Default).await {
    Ok(response) => {
      store_copy(&handle, request, &response);
      return Ok(Served::from_network(response));
    }
    Err(error) => error,
  };

  debug!(url = %request.url, %error, "network failed, trying cache");

  if let Some(cached) = handle.match_request(request).map_err(FetchError::storage)? {
    return Ok(Served::from_cache(cached));
  }

  if request.is_navigation() {
    if let Some(shell) = handle.match_url(&ctx.shell_url).map_err(FetchError::storage)? {
      debug!(url = %request.url, shell = %ctx.shell_url, "serving shell document");
      return Ok(Served::shell(shell));
    }
  }

  Err(error)
}

async fn cache_first<S, N>(ctx: &WorkerContext<S, N>, request: &Request) -> Result<Served, FetchError>
where
  S: CacheStorage,
  N: Network,
{
  let handle = ctx.current();

  if let Some(cached) = handle.match_request(request).map_err(FetchError::storage)? {
    return Ok(Served::from_cache(cached));
  }

  let response = ctx.network.fetch(request, FetchMode::Default).await?;
  store_copy(&handle, request, &response);
  Ok(Served::from_network(response))
}

/// Write a copy of a successful response into the generation.
///
/// Error responses are never stored. A failed write does not fail the request.
fn store_copy<S: CacheStorage>(handle: &CacheHandle<S>, request: &Request, response: &Response) {
  if !response.ok() {
    debug!(url = %request.url, status = response.status, "not caching error response");
    return;
  }

  if let Err(e) = handle.put(&request.url, response) {
    warn!(url = %request.url, generation = handle.name(), "failed to cache response: {:#}", e);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::ResponseSource;
  use crate::net::mock::ScriptedNetwork;
  use crate::net::Destination;
  use crate::worker::context::tests::{context, memory_store, url, TestContext};

  fn setup() -> (TestContext, std::sync::Arc<ScriptedNetwork>) {
    let network = ScriptedNetwork::new();
    let ctx = context("1.0.0", memory_store(), network.clone());
    ctx.open_current().unwrap();
    (ctx, network)
  }

  fn seed(ctx: &TestContext, path: &str, body: &str) {
    ctx
      .current()
      .put(&url(path), &Response::new(200, body))
      .unwrap();
  }

  fn cached(ctx: &TestContext, path: &str) -> Option<Response> {
    ctx.current().match_url(&url(path)).unwrap()
  }

  #[tokio::test]
  async fn test_network_only_ignores_cache() {
    let (ctx, network) = setup();
    seed(&ctx, "sw.js", "old worker");
    network.respond("https://ledger.example/sw.js", 200, "new worker");

    let request = Request::get(url("sw.js"));
    let served = Strategy::NetworkOnly.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(served.response.body, b"new worker");
    assert_eq!(network.calls()[0].1, FetchMode::Reload);
  }

  #[tokio::test]
  async fn test_network_only_failure_propagates() {
    let (ctx, _network) = setup();
    seed(&ctx, "sw.js", "old worker");

    let request = Request::get(url("sw.js"));
    let error = Strategy::NetworkOnly.execute(&ctx, &request).await.unwrap_err();
    assert!(error.is_network());
  }

  #[tokio::test]
  async fn test_network_only_does_not_store() {
    let (ctx, network) = setup();
    network.respond("https://ledger.example/sw.js", 200, "worker");

    let request = Request::get(url("sw.js"));
    Strategy::NetworkOnly.execute(&ctx, &request).await.unwrap();
    assert!(cached(&ctx, "sw.js").is_none());
  }

  #[tokio::test]
  async fn test_network_first_writes_through() {
    let (ctx, network) = setup();
    network.respond("https://ledger.example/js/app.js", 200, "console.log(1)");

    let request = Request::get(url("js/app.js")).with_destination(Destination::Script);
    let served = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(cached(&ctx, "js/app.js").unwrap(), served.response);
  }

  #[tokio::test]
  async fn test_network_first_prefers_network_over_cache() {
    let (ctx, network) = setup();
    seed(&ctx, "style.css", "body { color: red }");
    network.respond("https://ledger.example/style.css", 200, "body { color: blue }");

    let request = Request::get(url("style.css")).with_destination(Destination::Style);
    let served = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.response.body, b"body { color: blue }");
    assert_eq!(cached(&ctx, "style.css").unwrap().body, b"body { color: blue }");
  }

  #[tokio::test]
  async fn test_network_first_falls_back_to_cache() {
    let (ctx, _network) = setup();
    seed(&ctx, "style.css", "body { color: red }");

    let request = Request::get(url("style.css")).with_destination(Destination::Style);
    let served = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response, cached(&ctx, "style.css").unwrap());
  }

  #[tokio::test]
  async fn test_offline_navigation_serves_shell() {
    let (ctx, _network) = setup();
    seed(&ctx, "index.html", "<html>shell</html>");

    let request = Request::navigate(url("movements.html"));
    let served = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Shell);
    assert_eq!(served.response.body, b"<html>shell</html>");
  }

  #[tokio::test]
  async fn test_offline_navigation_prefers_own_entry() {
    let (ctx, _network) = setup();
    seed(&ctx, "index.html", "<html>shell</html>");
    seed(&ctx, "movements.html", "<html>movements</html>");

    let request = Request::navigate(url("movements.html"));
    let served = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.body, b"<html>movements</html>");
  }

  #[tokio::test]
  async fn test_offline_subresource_gets_no_shell() {
    let (ctx, _network) = setup();
    seed(&ctx, "index.html", "<html>shell</html>");

    let request = Request::get(url("js/inventory.js")).with_destination(Destination::Script);
    let error = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap_err();
    assert!(error.is_network());
  }

  #[tokio::test]
  async fn test_offline_navigation_without_shell_fails() {
    let (ctx, _network) = setup();

    let request = Request::navigate(url("index.html"));
    let error = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap_err();
    assert!(error.is_network());
  }

  #[tokio::test]
  async fn test_network_first_does_not_store_errors() {
    let (ctx, network) = setup();
    seed(&ctx, "reports.html", "<html>old</html>");
    network.respond("https://ledger.example/reports.html", 500, "oops");

    let request = Request::navigate(url("reports.html"));
    let served = Strategy::NetworkFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(served.response.status, 500);
    assert_eq!(cached(&ctx, "reports.html").unwrap().body, b"<html>old</html>");
  }

  #[tokio::test]
  async fn test_cache_first_hit_skips_network() {
    let (ctx, network) = setup();
    seed(&ctx, "img/logo.png", "png");
    network.respond("https://ledger.example/img/logo.png", 200, "newer png");

    let request = Request::get(url("img/logo.png")).with_destination(Destination::Image);
    let served = Strategy::CacheFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.body, b"png");
    assert_eq!(network.call_count(), 0);
  }

  #[tokio::test]
  async fn test_cache_first_miss_populates() {
    let (ctx, network) = setup();
    network.respond("https://ledger.example/fonts/inter.woff2", 200, "font");

    let request = Request::get(url("fonts/inter.woff2")).with_destination(Destination::Font);
    let served = Strategy::CacheFirst.execute(&ctx, &request).await.unwrap();

    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(cached(&ctx, "fonts/inter.woff2").unwrap(), served.response);

    let again = Strategy::CacheFirst.execute(&ctx, &request).await.unwrap();
    assert_eq!(again.source, ResponseSource::Cache);
    assert_eq!(network.call_count(), 1);
  }

  #[tokio::test]
  async fn test_cache_first_miss_offline_fails() {
    let (ctx, _network) = setup();

    let request = Request::get(url("img/missing.png")).with_destination(Destination::Image);
    let error = Strategy::CacheFirst.execute(&ctx, &request).await.unwrap_err();
    assert!(error.is_network());
    assert!(cached(&ctx, "img/missing.png").is_none());
  }
}
