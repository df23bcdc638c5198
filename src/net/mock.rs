//! Scripted in-process network for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use crate::error::FetchError;

use super::client::{FetchMode, Network};
use super::types::{cache_key, Request, Response};

enum Scripted {
  Respond(Response),
  Held(Response, Arc<Notify>),
}

/// Answers from a fixed table; unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct ScriptedNetwork {
  routes: Mutex<HashMap<String, Scripted>>,
  calls: Mutex<Vec<(String, FetchMode)>>,
}

impl ScriptedNetwork {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn respond(&self, url: &str, status: u16, body: &str) {
    let response = Response::new(status, body).with_url(url);
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), Scripted::Respond(response));
  }

  /// Respond only after `release` is notified.
  pub fn respond_after(&self, url: &str, body: &str, release: Arc<Notify>) {
    let response = Response::new(200, body).with_url(url);
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), Scripted::Held(response, release));
  }

  /// Make `url` unreachable again.
  pub fn fail(&self, url: &str) {
    self.routes.lock().unwrap().remove(url);
  }

  pub fn calls(&self) -> Vec<(String, FetchMode)> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl Network for ScriptedNetwork {
  async fn fetch(&self, request: &Request, mode: FetchMode) -> Result<Response, FetchError> {
    let key = cache_key(&request.url);
    self.calls.lock().unwrap().push((key.clone(), mode));

    let scripted = match self.routes.lock().unwrap().get(&key) {
      Some(Scripted::Respond(response)) => Some((response.clone(), None)),
      Some(Scripted::Held(response, release)) => Some((response.clone(), Some(release.clone()))),
      None => None,
    };

    match scripted {
      Some((response, None)) => Ok(response),
      Some((response, Some(release))) => {
        release.notified().await;
        Ok(response)
      }
      None => Err(FetchError::network(&request.url, "connection refused")),
    }
  }
}
