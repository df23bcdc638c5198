use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use tracing::debug;

use crate::config::NetworkConfig;
use crate::error::FetchError;

use super::types::{Request, Response};

/// How a fetch treats intermediate HTTP caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
  Default,
  /// Force revalidation with the origin server
  Reload,
}

/// The network as seen by the worker.
///
/// `Err` means the request never produced a response (DNS, connection reset,
/// timeout). Any HTTP status, including 4xx and 5xx, is a response.
pub trait Network: Send + Sync + 'static {
  fn fetch(
    &self,
    request: &Request,
    mode: FetchMode,
  ) -> impl Future<Output = Result<Response, FetchError>> + Send;
}

impl<N: Network> Network for Arc<N> {
  async fn fetch(&self, request: &Request, mode: FetchMode) -> Result<Response, FetchError> {
    self.as_ref().fetch(request, mode).await
  }
}

/// HTTP client wrapper
#[derive(Clone)]
pub struct HttpNetwork {
  client: reqwest::Client,
}

impl HttpNetwork {
  pub fn new(config: &NetworkConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .user_agent(config.user_agent.as_str())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request, mode: FetchMode) -> Result<Response, FetchError> {
    let mut builder = self
      .client
      .request(request.method.clone(), request.url.clone());
    if mode == FetchMode::Reload {
      builder = builder
        .header(CACHE_CONTROL, "no-cache")
        .header(PRAGMA, "no-cache");
    }

    let response = builder
      .send()
      .await
      .map_err(|e| FetchError::network(&request.url, e))?;

    let status = response.status().as_u16();
    let url = response.url().to_string();
    let headers: Vec<(String, String)> = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();

    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::network(&request.url, e))?
      .to_vec();

    debug!(url = %request.url, status, bytes = body.len(), "network response");

    let mut out = Response::new(status, body).with_url(url);
    out.headers = headers;
    Ok(out)
  }
}
