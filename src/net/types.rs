//! Request and response values exchanged between the host, the worker and the network.

use reqwest::{Method, StatusCode};
use sha2::{Digest, Sha256};
use url::Url;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level page navigation
  Navigate,
  Cors,
}

/// What the requested resource will be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Destination {
  /// No destination (fetch() calls, XHR)
  #[default]
  Empty,
  Document,
  Script,
  #[value(alias = "stylesheet")]
  Style,
  Image,
  Font,
  Manifest,
  Worker,
}

/// An intercepted request.
#[derive(Debug, Clone)]
pub struct Request {
  pub url: Url,
  pub method: Method,
  pub mode: RequestMode,
  pub destination: Destination,
}

impl Request {
  /// A plain `GET` subresource request.
  pub fn get(url: Url) -> Self {
    Self {
      url,
      method: Method::GET,
      mode: RequestMode::Cors,
      destination: Destination::Empty,
    }
  }

  /// A page navigation.
  pub fn navigate(url: Url) -> Self {
    Self {
      url,
      method: Method::GET,
      mode: RequestMode::Navigate,
      destination: Destination::Document,
    }
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  #[cfg(test)]
  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }
}

/// Key under which a URL is stored. Fragments never reach the server, so they
/// are not part of the key.
pub fn cache_key(url: &Url) -> String {
  let mut url = url.clone();
  url.set_fragment(None);
  url.into()
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  /// Final URL after redirects
  pub url: String,
  pub status: u16,
  pub status_text: String,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      url: String::new(),
      status,
      status_text: status_text(status).to_string(),
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = url.into();
    self
  }

  /// Check if the response is OK (status 200-299)
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Hex encoded SHA-256 of the body.
  pub fn digest(&self) -> String {
    body_digest(&self.body)
  }
}

fn body_digest(body: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(body);
  hex::encode(hasher.finalize())
}

fn status_text(status: u16) -> &'static str {
  StatusCode::from_u16(status)
    .ok()
    .and_then(|s| s.canonical_reason())
    .unwrap_or("")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_key_drops_fragment() {
    let url = Url::parse("https://ledger.example/products.html#row-4").unwrap();
    assert_eq!(cache_key(&url), "https://ledger.example/products.html");
  }

  #[test]
  fn test_cache_key_keeps_query() {
    let url = Url::parse("https://ledger.example/js/app.js?v=2").unwrap();
    assert_eq!(cache_key(&url), "https://ledger.example/js/app.js?v=2");
  }

  #[test]
  fn test_navigation_request() {
    let url = Url::parse("https://ledger.example/inventory.html").unwrap();
    let request = Request::navigate(url);
    assert!(request.is_navigation());
    assert_eq!(request.destination, Destination::Document);
  }

  #[test]
  fn test_response_ok_range() {
    assert!(Response::new(200, "x").ok());
    assert!(Response::new(204, "").ok());
    assert!(!Response::new(304, "").ok());
    assert!(!Response::new(404, "missing").ok());
  }

  #[test]
  fn test_status_text() {
    assert_eq!(Response::new(404, "").status_text, "Not Found");
    assert_eq!(status_text(799), "");
  }

  #[test]
  fn test_digest_depends_on_body_only() {
    let mut a = Response::new(200, "body");
    a.headers.push(("etag".to_string(), "1".to_string()));
    let b = Response::new(200, "body");
    assert_eq!(a.digest(), b.digest());
    assert_ne!(a.digest(), Response::new(200, "other").digest());
    assert_eq!(a.digest().len(), 64);
  }
}
